use bon::bon;
use chrono::{DateTime, Local, TimeDelta};

use crate::{error::ConfigurationError, prelude::*, quantity::power::Watts};

/// Detects an appliance being started by hand while the control is off.
#[derive(Clone, Debug)]
pub struct StartingCurrentDetector {
    power_threshold: Watts,
    detection_duration: TimeDelta,
    last_average_power: Option<Watts>,
    sampled_at: Option<DateTime<Local>>,
}

#[bon]
impl StartingCurrentDetector {
    #[builder]
    pub fn new(
        power_threshold: Watts,
        detection_duration: TimeDelta,
    ) -> Result<Self, ConfigurationError> {
        if power_threshold < Watts::ZERO {
            return Err(ConfigurationError::PowerThreshold(power_threshold));
        }
        if detection_duration < TimeDelta::zero() {
            return Err(ConfigurationError::NegativeDuration("detection duration"));
        }
        Ok(Self { power_threshold, detection_duration, last_average_power: None, sampled_at: None })
    }
}

impl StartingCurrentDetector {
    /// Sample once per detection duration.
    ///
    /// Only samples taken while `armed` are compared, two consecutive ones above the threshold
    /// are a starting current.
    pub fn sample(&mut self, now: DateTime<Local>, average_power: Watts, armed: bool) -> bool {
        if self.sampled_at.is_some_and(|sampled_at| now - sampled_at < self.detection_duration) {
            return false;
        }
        self.sampled_at = Some(now);
        if !armed {
            return false;
        }
        let detected = self.last_average_power.is_some_and(|last| last > self.power_threshold)
            && average_power > self.power_threshold;
        if detected {
            info!(%average_power, last_average_power = ?self.last_average_power, "starting current detected");
        }
        self.last_average_power = Some(average_power);
        detected
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, 10, 0, second).unwrap()
    }

    fn detector() -> StartingCurrentDetector {
        StartingCurrentDetector::builder()
            .power_threshold(Watts(20.0))
            .detection_duration(TimeDelta::seconds(10))
            .build()
            .unwrap()
    }

    #[test]
    fn two_samples_above_threshold() {
        let mut detector = detector();
        assert!(!detector.sample(at(0), Watts(500.0), true));
        assert!(detector.sample(at(10), Watts(600.0), true));
    }

    #[test]
    fn single_spike_is_ignored() {
        let mut detector = detector();
        assert!(!detector.sample(at(0), Watts(500.0), true));
        assert!(!detector.sample(at(10), Watts(5.0), true));
        assert!(!detector.sample(at(20), Watts(500.0), true));
    }

    #[test]
    fn sampled_once_per_duration() {
        let mut detector = detector();
        assert!(!detector.sample(at(0), Watts(500.0), true));
        assert!(!detector.sample(at(5), Watts(500.0), true));
        assert!(detector.sample(at(10), Watts(500.0), true));
    }

    #[test]
    fn not_armed() {
        let mut detector = detector();
        assert!(!detector.sample(at(0), Watts(500.0), false));
        assert!(!detector.sample(at(10), Watts(500.0), false));
        assert!(!detector.sample(at(20), Watts(500.0), true));
    }
}
