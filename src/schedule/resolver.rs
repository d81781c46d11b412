use chrono::{DateTime, Local};

use crate::{
    charger::VehicleId,
    quantity::{energy::WattHours, percent::Percent},
    schedule::interval::TimeframeInterval,
};

/// Readings of the current tick that demand resolution depends on.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DemandContext {
    /// Energy the session meter has accumulated so far.
    pub metered_energy: WattHours,

    /// Whether the appliance is running right now.
    pub running: bool,

    /// Last time `running` flipped.
    pub status_changed_at: Option<DateTime<Local>>,

    pub vehicle: Option<VehicleSnapshot>,
}

impl Default for DemandContext {
    fn default() -> Self {
        Self { metered_energy: WattHours::ZERO, running: false, status_changed_at: None, vehicle: None }
    }
}

/// Battery estimate of the vehicle the charger is serving.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub state_of_charge: Percent,
    pub charge_loss: Percent,
}

/// Turns demand descriptors into energy figures.
///
/// Holds no state of its own: the progress lives in the interval it is given.
#[derive(Copy, Clone, Debug, Default)]
pub struct EnergyDemandResolver;

impl EnergyDemandResolver {
    /// Energy the interval requires given the current vehicle estimate.
    #[must_use]
    pub fn required_energy(
        self,
        interval: &TimeframeInterval,
        context: &DemandContext,
    ) -> Option<WattHours> {
        let vehicle = context
            .vehicle
            .filter(|vehicle| interval.target.is_none_or(|target| target == vehicle.id));
        interval.demand.required_energy(
            vehicle.map_or(Percent::ZERO, |vehicle| vehicle.state_of_charge),
            vehicle.map_or(Percent::ZERO, |vehicle| vehicle.charge_loss),
        )
    }

    /// Book the meter progress into the interval.
    pub fn update_consumed(self, interval: &mut TimeframeInterval, context: &DemandContext) {
        interval.book_energy(context.metered_energy);
    }
}
