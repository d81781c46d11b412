quantity!(Percent, f64, "%");

impl Percent {
    pub const FULL: Self = Self(100.0);

    /// Convert the percentage into `0.0..=1.0`.
    pub const fn to_ratio(self) -> f64 {
        0.01 * self.0
    }

    #[must_use]
    pub fn is_valid_state_of_charge(self) -> bool {
        (Self::ZERO..=Self::FULL).contains(&self)
    }
}
