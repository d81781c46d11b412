use chrono::TimeDelta;

use crate::{
    error::ConfigurationError,
    quantity::{energy::WattHours, percent::Percent},
};

/// What an interval asks the appliance to deliver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Demand {
    /// Run for at least `min` (when set) and at most `max`.
    Runtime { min: Option<TimeDelta>, max: TimeDelta },

    /// Fixed amount of energy to deliver.
    Energy { required: WattHours },

    /// Charge a vehicle battery to the target state of charge.
    StateOfCharge { target: Percent, battery_capacity: WattHours },
}

impl Demand {
    pub fn runtime(min: Option<TimeDelta>, max: TimeDelta) -> Result<Self, ConfigurationError> {
        if max < TimeDelta::zero() {
            return Err(ConfigurationError::NegativeDuration("maximum running time"));
        }
        match min {
            Some(min) if min < TimeDelta::zero() => {
                Err(ConfigurationError::NegativeDuration("minimum running time"))
            }
            Some(min) if min > max => Err(ConfigurationError::RunningTimeRange),
            _ => Ok(Self::Runtime { min, max }),
        }
    }

    pub fn energy(required: WattHours) -> Result<Self, ConfigurationError> {
        if required < WattHours::ZERO {
            return Err(ConfigurationError::NegativeEnergy(required));
        }
        Ok(Self::Energy { required })
    }

    pub fn state_of_charge(
        target: Percent,
        battery_capacity: WattHours,
    ) -> Result<Self, ConfigurationError> {
        if !target.is_valid_state_of_charge() {
            return Err(ConfigurationError::StateOfCharge(target));
        }
        if battery_capacity <= WattHours::ZERO {
            return Err(ConfigurationError::BatteryCapacity(battery_capacity));
        }
        Ok(Self::StateOfCharge { target, battery_capacity })
    }

    #[must_use]
    pub const fn is_energy(&self) -> bool {
        matches!(self, Self::Energy { .. } | Self::StateOfCharge { .. })
    }

    /// Runtime after which the demand counts as satisfied.
    #[must_use]
    pub fn runtime_target(&self) -> Option<TimeDelta> {
        match self {
            Self::Runtime { min, max } => Some(min.unwrap_or(*max)),
            Self::Energy { .. } | Self::StateOfCharge { .. } => None,
        }
    }

    /// Energy needed to satisfy the demand given the current battery estimate.
    ///
    /// Runtime demands have no energy requirement.
    #[must_use]
    pub fn required_energy(&self, state_of_charge: Percent, charge_loss: Percent) -> Option<WattHours> {
        match *self {
            Self::Runtime { .. } => None,
            Self::Energy { required } => Some(required),
            Self::StateOfCharge { target, battery_capacity } => Some(energy_to_charge(
                battery_capacity,
                state_of_charge,
                target,
                charge_loss,
            )),
        }
    }
}

/// Energy drawn from the grid to charge a battery from one level to another.
#[must_use]
pub fn energy_to_charge(
    battery_capacity: WattHours,
    from: Percent,
    to: Percent,
    charge_loss: Percent,
) -> WattHours {
    let stored = battery_capacity * (to - from).to_ratio();
    (stored * (1.0 + charge_loss.to_ratio())).max(WattHours::ZERO)
}
