use chrono::{DateTime, Local, TimeDelta};

use crate::{
    charger::VehicleId,
    quantity::energy::WattHours,
    schedule::{demand::Demand, window::TimeWindow},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, derive_more::Display)]
#[display("#{_0}")]
pub struct IntervalId(pub u64);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IntervalState {
    Queued,
    Active { since: DateTime<Local> },
    Expired,
}

/// Where the demand came from.
///
/// Variants are ordered by precedence, the last one wins.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, derive_more::Display)]
pub enum Origin {
    /// Opportunistic demand synthesized when a vehicle connects.
    #[display("optional")]
    Optional,

    #[display("schedule")]
    Schedule,

    /// Explicit request, for example from the energy manager or the user.
    #[display("manual")]
    Manual,
}

/// Scheduled unit of work: a time window with a demand and its progress.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeframeInterval {
    pub id: IntervalId,
    pub window: TimeWindow,
    pub demand: Demand,
    pub origin: Origin,
    pub state: IntervalState,

    /// Vehicle the demand is meant for, if any.
    pub target: Option<VehicleId>,

    /// Resolved energy requirement, [`None`] for runtime demands.
    pub required_energy: Option<WattHours>,

    pub consumed_energy: WattHours,
    pub consumed_runtime: TimeDelta,

    /// Session meter total that has already been booked to this interval.
    pub(crate) metered_until: Option<WattHours>,
}

impl TimeframeInterval {
    /// Remaining energy below this counts as delivered.
    const ENERGY_RESOLUTION: WattHours = WattHours(1e-6);

    pub(crate) fn new(
        id: IntervalId,
        window: TimeWindow,
        demand: Demand,
        origin: Origin,
        target: Option<VehicleId>,
    ) -> Self {
        Self {
            id,
            window,
            demand,
            origin,
            target,
            state: IntervalState::Queued,
            required_energy: None,
            consumed_energy: WattHours::ZERO,
            consumed_runtime: TimeDelta::zero(),
            metered_until: None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, IntervalState::Active { .. })
    }

    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self.state, IntervalState::Queued)
    }

    #[must_use]
    pub fn remaining_energy(&self) -> Option<WattHours> {
        self.required_energy.map(|required| (required - self.consumed_energy).max(WattHours::ZERO))
    }

    #[must_use]
    pub fn remaining_runtime(&self) -> Option<TimeDelta> {
        self.demand
            .runtime_target()
            .map(|target| (target - self.consumed_runtime).max(TimeDelta::zero()))
    }

    /// Whether the demand has been delivered.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        match self.demand {
            Demand::Runtime { .. } => self.remaining_runtime() == Some(TimeDelta::zero()),
            Demand::Energy { .. } | Demand::StateOfCharge { .. } => self
                .remaining_energy()
                .is_some_and(|remaining| remaining < Self::ENERGY_RESOLUTION),
        }
    }

    /// Queue precedence: higher origin first, then earlier start.
    pub(crate) fn takes_precedence_over(&self, other: &Self) -> bool {
        (self.origin > other.origin)
            || (self.origin == other.origin && self.window.start() < other.window.start())
    }

    pub(crate) fn activate(&mut self, now: DateTime<Local>, metered_energy: WattHours) {
        self.state = IntervalState::Active { since: now };
        self.metered_until = Some(metered_energy);
    }

    /// Put the interval back into the queue from `now` on.
    ///
    /// State-of-charge progress lives in the vehicle estimate, so the counter restarts.
    pub(crate) fn deactivate(&mut self, now: DateTime<Local>) {
        self.state = IntervalState::Queued;
        self.window = self.window.postpone_start(now);
        self.metered_until = None;
        if matches!(self.demand, Demand::StateOfCharge { .. }) {
            self.consumed_energy = WattHours::ZERO;
        }
    }

    /// Book the energy metered since the last call.
    pub(crate) fn book_energy(&mut self, metered_energy: WattHours) {
        let previous = self.metered_until.unwrap_or(metered_energy);
        self.consumed_energy += metered_energy.counter_delta(previous);
        self.metered_until = Some(metered_energy);
    }
}
