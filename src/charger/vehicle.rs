use bon::bon;
use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigurationError,
    quantity::{energy::WattHours, percent::Percent},
};

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, derive_more::Display,
)]
#[display("vehicle #{_0}")]
pub struct VehicleId(pub u32);

/// Fallbacks for vehicle settings left unconfigured.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChargerDefaults {
    pub charge_loss: Percent,
    pub initial_state_of_charge: Percent,
    pub optional_energy_target: Percent,
}

impl Default for ChargerDefaults {
    fn default() -> Self {
        Self {
            charge_loss: Percent(10.0),
            initial_state_of_charge: Percent::ZERO,
            optional_energy_target: Percent::FULL,
        }
    }
}

#[must_use]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ElectricVehicle {
    pub id: VehicleId,
    pub battery_capacity: WattHours,

    /// Share of the stored energy lost while charging.
    pub charge_loss: Percent,

    /// Assumed state of charge until the vehicle reports one.
    pub initial_state_of_charge: Percent,

    /// Charge target of the optional-energy interval.
    pub optional_energy_target: Percent,
}

#[bon]
impl ElectricVehicle {
    #[builder]
    pub fn new(
        id: VehicleId,
        battery_capacity: WattHours,
        charge_loss: Option<Percent>,
        initial_state_of_charge: Option<Percent>,
        optional_energy_target: Option<Percent>,
        #[builder(default)] defaults: ChargerDefaults,
    ) -> Result<Self, ConfigurationError> {
        if battery_capacity <= WattHours::ZERO {
            return Err(ConfigurationError::BatteryCapacity(battery_capacity));
        }
        let charge_loss = charge_loss.unwrap_or(defaults.charge_loss);
        if charge_loss < Percent::ZERO {
            return Err(ConfigurationError::ChargeLoss(charge_loss));
        }
        let initial_state_of_charge =
            initial_state_of_charge.unwrap_or(defaults.initial_state_of_charge);
        let optional_energy_target =
            optional_energy_target.unwrap_or(defaults.optional_energy_target);
        for state_of_charge in [initial_state_of_charge, optional_energy_target] {
            if !state_of_charge.is_valid_state_of_charge() {
                return Err(ConfigurationError::StateOfCharge(state_of_charge));
            }
        }
        Ok(Self {
            id,
            battery_capacity,
            charge_loss,
            initial_state_of_charge,
            optional_energy_target,
        })
    }
}

/// Outcome of polling the vehicle for its state of charge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SocReading {
    /// The vehicle does not report it.
    #[default]
    Unavailable,

    Failed,
    Value(Percent),
}

/// State of charge extrapolated from the last reading and the energy charged since.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SocEstimate {
    pub reading: Percent,

    /// Session meter total at the time of the reading.
    pub metered_at_reading: WattHours,
}

impl SocEstimate {
    pub const fn new(reading: Percent, metered_at_reading: WattHours) -> Self {
        Self { reading, metered_at_reading }
    }

    #[must_use]
    pub fn estimate(&self, vehicle: &ElectricVehicle, metered_energy: WattHours) -> Percent {
        let charged = metered_energy.counter_delta(self.metered_at_reading);
        let gross_capacity = vehicle.battery_capacity * (1.0 + vehicle.charge_loss.to_ratio());
        (self.reading + Percent(100.0 * (charged / gross_capacity))).min(Percent::FULL)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn vehicle() -> ElectricVehicle {
        ElectricVehicle::builder().id(VehicleId(1)).battery_capacity(WattHours(40000.0)).build().unwrap()
    }

    #[test]
    fn defaults_apply() {
        let vehicle = vehicle();
        assert_eq!(vehicle.charge_loss, Percent(10.0));
        assert_eq!(vehicle.initial_state_of_charge, Percent::ZERO);
        assert_eq!(vehicle.optional_energy_target, Percent::FULL);
    }

    #[test]
    fn invalid_vehicle() {
        let result =
            ElectricVehicle::builder().id(VehicleId(1)).battery_capacity(WattHours(-1.0)).build();
        assert_eq!(result, Err(ConfigurationError::BatteryCapacity(WattHours(-1.0))));
        let result = ElectricVehicle::builder()
            .id(VehicleId(1))
            .battery_capacity(WattHours(40000.0))
            .optional_energy_target(Percent(120.0))
            .build();
        assert_eq!(result, Err(ConfigurationError::StateOfCharge(Percent(120.0))));
    }

    #[test]
    fn estimate_includes_charge_loss() {
        let estimate = SocEstimate::new(Percent(50.0), WattHours::ZERO);
        assert_relative_eq!(estimate.estimate(&vehicle(), WattHours(4400.0)).0, 60.0, epsilon = 1e-9);
    }

    #[test]
    fn estimate_never_exceeds_full() {
        let estimate = SocEstimate::new(Percent(90.0), WattHours(1000.0));
        assert_eq!(estimate.estimate(&vehicle(), WattHours(100_000.0)), Percent::FULL);
    }
}
