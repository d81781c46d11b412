mod demand;
mod handler;
mod interval;
mod resolver;
mod window;

pub use self::{
    demand::{Demand, energy_to_charge},
    handler::{DemandRequest, QueueUpdate, TimeframeIntervalHandler},
    interval::{IntervalId, IntervalState, Origin, TimeframeInterval},
    resolver::{DemandContext, EnergyDemandResolver, VehicleSnapshot},
    window::{DayTimeframe, TimeWindow, Timeframe},
};
use crate::charger::VehicleId;

/// Recurring or one-off demand configured for an appliance.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Schedule {
    pub timeframe: Timeframe,
    pub demand: Demand,

    /// Restrict the demand to a single vehicle.
    pub target: Option<VehicleId>,
}
