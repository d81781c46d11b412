use chrono::{DateTime, Local, NaiveTime};

use crate::quantity::{energy::WattHours, percent::Percent, power::Watts};

/// Invalid appliance setup, rejected before anything is queued.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("time window ends at {end} which is not after its start at {start}")]
    EmptyWindow { start: DateTime<Local>, end: DateTime<Local> },

    #[error("daily timeframe starts and ends at {0}")]
    EmptyTimeframe(NaiveTime),

    #[error("minimum running time exceeds the maximum running time")]
    RunningTimeRange,

    #[error("battery capacity must be positive, got {0}")]
    BatteryCapacity(WattHours),

    #[error("state of charge must be within 0..=100 %, got {0}")]
    StateOfCharge(Percent),

    #[error("charge loss must not be negative, got {0}")]
    ChargeLoss(Percent),

    #[error("energy demand must not be negative, got {0}")]
    NegativeEnergy(WattHours),

    #[error("power threshold must not be negative, got {0}")]
    PowerThreshold(Watts),

    #[error("duration must not be negative: {0}")]
    NegativeDuration(&'static str),

    #[error("consideration horizon must span at least one day")]
    Horizon,
}
