use std::ops::Div;

use chrono::TimeDelta;

use crate::quantity::power::Watts;

quantity!(WattHours, f64, "Wh");

impl WattHours {
    pub const fn from_kilowatt_hours(kilowatt_hours: f64) -> Self {
        Self(kilowatt_hours * 1000.0)
    }

    /// Difference between the two readings of a cumulative counter.
    ///
    /// A counter that went backwards has been reset, so everything it shows now
    /// was accumulated after the reset.
    pub fn counter_delta(self, previous: Self) -> Self {
        if self >= previous { self - previous } else { self }
    }
}

impl Div<TimeDelta> for WattHours {
    type Output = Watts;

    fn div(self, rhs: TimeDelta) -> Self::Output {
        let hours = rhs.as_seconds_f64() / 3600.0;
        Watts(self.0 / hours)
    }
}
