mod meter_reporting;
mod starting_current;

use chrono::{DateTime, Local};

pub use self::{
    meter_reporting::{MeterReportingDefaults, MeterReportingSwitch},
    starting_current::StartingCurrentDetector,
};
use crate::{prelude::*, quantity::power::Watts};

/// How the appliance gets switched.
#[derive(Clone, Debug)]
pub enum Control {
    Switch { on: bool },

    /// Permanently powered, not controllable.
    AlwaysOn,

    /// Switch that stays physically on while logically off, so that the appliance can be
    /// started by hand. The starting current then switches it off until the demand gets its turn.
    StartingCurrent { on: bool, appliance_on: bool, detector: StartingCurrentDetector },
}

impl Control {
    pub const fn switch() -> Self {
        Self::Switch { on: false }
    }

    pub const fn starting_current(detector: StartingCurrentDetector) -> Self {
        Self::StartingCurrent { on: false, appliance_on: true, detector }
    }

    /// Logical state.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        match self {
            Self::Switch { on } | Self::StartingCurrent { on, .. } => *on,
            Self::AlwaysOn => true,
        }
    }

    /// Whether the appliance is physically powered.
    #[must_use]
    pub const fn is_appliance_on(&self) -> bool {
        match self {
            Self::Switch { on } => *on,
            Self::StartingCurrent { appliance_on, .. } => *appliance_on,
            Self::AlwaysOn => true,
        }
    }

    #[must_use]
    pub const fn is_controllable(&self) -> bool {
        !matches!(self, Self::AlwaysOn)
    }

    /// Switch and return the resulting logical state.
    pub fn on(&mut self, switch_on: bool) -> bool {
        match self {
            Self::Switch { on } => {
                *on = switch_on;
            }
            Self::StartingCurrent { on, appliance_on, .. } => {
                *on = switch_on;
                if switch_on {
                    *appliance_on = true;
                }
            }
            Self::AlwaysOn => {}
        }
        debug!(switch_on, on = self.is_on(), appliance_on = self.is_appliance_on(), "switched");
        self.is_on()
    }

    /// Feed the average power, returns `true` when a starting current switched the appliance off.
    pub fn sample(&mut self, now: DateTime<Local>, average_power: Watts) -> bool {
        let Self::StartingCurrent { on, appliance_on, detector } = self else {
            return false;
        };
        let detected = detector.sample(now, average_power, !*on && *appliance_on);
        if detected {
            *appliance_on = false;
        }
        detected
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};

    use super::*;

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 10, 0, second).unwrap()
    }

    #[test]
    fn always_on() {
        let mut control = Control::AlwaysOn;
        assert!(control.on(false));
        assert!(control.is_on());
        assert!(!control.is_controllable());
    }

    #[test]
    fn starting_current_switches_off() {
        let detector = StartingCurrentDetector::builder()
            .power_threshold(Watts(20.0))
            .detection_duration(TimeDelta::seconds(10))
            .build()
            .unwrap();
        let mut control = Control::starting_current(detector);
        assert!(!control.is_on());
        assert!(control.is_appliance_on());

        assert!(!control.sample(at(0), Watts(800.0)));
        assert!(control.sample(at(10), Watts(800.0)));
        assert!(!control.is_appliance_on());

        assert!(control.on(true));
        assert!(control.is_appliance_on());

        // Switching off keeps the appliance powered.
        assert!(!control.on(false));
        assert!(control.is_appliance_on());
    }

    #[test]
    fn no_detection_while_on() {
        let detector = StartingCurrentDetector::builder()
            .power_threshold(Watts(20.0))
            .detection_duration(TimeDelta::zero())
            .build()
            .unwrap();
        let mut control = Control::starting_current(detector);
        control.on(true);
        assert!(!control.sample(at(0), Watts(800.0)));
        assert!(!control.sample(at(1), Watts(800.0)));
        assert!(control.is_appliance_on());
    }
}
