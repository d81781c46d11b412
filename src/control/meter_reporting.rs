use bon::bon;
use chrono::{DateTime, Local, TimeDelta};

use crate::{error::ConfigurationError, prelude::*, quantity::power::Watts};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeterReportingDefaults {
    pub power_threshold: Watts,

    /// How long the power must stay below the threshold before the appliance counts as off.
    pub off_detection_delay: TimeDelta,
}

impl Default for MeterReportingDefaults {
    fn default() -> Self {
        Self { power_threshold: Watts(10.0), off_detection_delay: TimeDelta::zero() }
    }
}

/// Derives the running state of an appliance from its metered power.
#[derive(Clone, Debug)]
pub struct MeterReportingSwitch {
    power_threshold: Watts,
    off_detection_delay: TimeDelta,
    running: bool,
    below_threshold_since: Option<DateTime<Local>>,
}

#[bon]
impl MeterReportingSwitch {
    #[builder]
    pub fn new(
        power_threshold: Option<Watts>,
        off_detection_delay: Option<TimeDelta>,
        #[builder(default)] defaults: MeterReportingDefaults,
    ) -> Result<Self, ConfigurationError> {
        let power_threshold = power_threshold.unwrap_or(defaults.power_threshold);
        if power_threshold < Watts::ZERO {
            return Err(ConfigurationError::PowerThreshold(power_threshold));
        }
        let off_detection_delay = off_detection_delay.unwrap_or(defaults.off_detection_delay);
        if off_detection_delay < TimeDelta::zero() {
            return Err(ConfigurationError::NegativeDuration("off detection delay"));
        }
        Ok(Self { power_threshold, off_detection_delay, running: false, below_threshold_since: None })
    }
}

impl MeterReportingSwitch {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Feed the current average power and return whether the appliance is running.
    pub fn update(&mut self, now: DateTime<Local>, average_power: Watts) -> bool {
        if average_power > self.power_threshold {
            self.below_threshold_since = None;
            if !self.running {
                debug!(%average_power, "running");
            }
            self.running = true;
        } else if self.running {
            let since = *self.below_threshold_since.get_or_insert(now);
            if now - since >= self.off_detection_delay {
                debug!(%average_power, "stopped running");
                self.running = false;
                self.below_threshold_since = None;
            }
        }
        self.running
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 10, minute, 0).unwrap()
    }

    #[test]
    fn default_threshold() {
        let mut switch = MeterReportingSwitch::builder().build().unwrap();
        assert!(!switch.update(at(0), Watts(10.0)));
        assert!(switch.update(at(1), Watts(10.5)));
        assert!(!switch.update(at(2), Watts(3.0)));
    }

    #[test]
    fn off_detection_is_delayed() {
        let mut switch = MeterReportingSwitch::builder()
            .power_threshold(Watts(50.0))
            .off_detection_delay(TimeDelta::minutes(5))
            .build()
            .unwrap();
        assert!(switch.update(at(0), Watts(2000.0)));
        assert!(switch.update(at(1), Watts(0.0)));
        assert!(switch.update(at(4), Watts(0.0)));
        assert!(!switch.update(at(6), Watts(0.0)));
    }

    #[test]
    fn power_spike_restarts_the_delay() {
        let mut switch = MeterReportingSwitch::builder()
            .off_detection_delay(TimeDelta::minutes(5))
            .build()
            .unwrap();
        assert!(switch.update(at(0), Watts(500.0)));
        assert!(switch.update(at(3), Watts(0.0)));
        assert!(switch.update(at(4), Watts(500.0)));
        assert!(switch.update(at(8), Watts(0.0)));
        assert!(!switch.update(at(13), Watts(0.0)));
    }

    #[test]
    fn negative_threshold_is_rejected() {
        assert!(matches!(
            MeterReportingSwitch::builder().power_threshold(Watts(-1.0)).build(),
            Err(ConfigurationError::PowerThreshold(_))
        ));
    }
}
