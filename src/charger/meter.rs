use chrono::{DateTime, Local};

use crate::{
    prelude::*,
    quantity::{energy::WattHours, power::Watts},
};

/// Session energy meter of an appliance.
pub trait Meter {
    /// Energy accumulated while the meter was started, since the last reset.
    fn current_energy(&self) -> WattHours;

    fn average_power(&self) -> Watts;

    /// Start or resume accumulation.
    fn start_energy_meter(&mut self);

    /// Freeze accumulation, the total stays queryable.
    fn stop_energy_meter(&mut self);

    fn reset_energy_meter(&mut self);
}

/// Meter fed with samples of a cumulative energy counter.
#[derive(Clone, Debug, Default)]
pub struct PollingEnergyMeter {
    counter: Option<WattHours>,
    sampled_at: Option<DateTime<Local>>,
    average_power: Watts,

    /// Total of the previous runs since the last reset.
    accumulated: WattHours,

    /// Counter value when the current run started, [`None`] while stopped.
    baseline: Option<WattHours>,

    started: bool,
}

impl PollingEnergyMeter {
    /// Feed a sample.
    ///
    /// Without an explicit power reading, the average power is derived from the counter.
    pub fn record(&mut self, at: DateTime<Local>, counter: WattHours, power: Option<Watts>) {
        self.average_power = match (power, self.counter, self.sampled_at) {
            (Some(power), _, _) => power,
            (None, Some(previous), Some(sampled_at)) if at > sampled_at => {
                counter.counter_delta(previous) / (at - sampled_at)
            }
            (None, _, _) => self.average_power,
        };
        if self.started && self.baseline.is_none() {
            self.baseline = Some(counter);
        }
        trace!(%at, %counter, average_power = %self.average_power, "recorded");
        self.counter = Some(counter);
        self.sampled_at = Some(at);
    }

    /// Power-only sample, for appliances without an energy counter.
    pub const fn record_power(&mut self, power: Watts) {
        self.average_power = power;
    }

    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    fn current_run(&self) -> WattHours {
        match (self.counter, self.baseline) {
            (Some(counter), Some(baseline)) => counter.counter_delta(baseline),
            _ => WattHours::ZERO,
        }
    }
}

impl Meter for PollingEnergyMeter {
    fn current_energy(&self) -> WattHours {
        self.accumulated + self.current_run()
    }

    fn average_power(&self) -> Watts {
        self.average_power
    }

    fn start_energy_meter(&mut self) {
        if !self.started {
            debug!(counter = ?self.counter, "starting the energy meter…");
            self.started = true;
            self.baseline = self.counter;
        }
    }

    fn stop_energy_meter(&mut self) {
        if self.started {
            self.accumulated += self.current_run();
            debug!(total = %self.accumulated, "stopped the energy meter");
            self.started = false;
            self.baseline = None;
        }
    }

    fn reset_energy_meter(&mut self) {
        debug!("resetting the energy meter…");
        self.accumulated = WattHours::ZERO;
        self.baseline = if self.started { self.counter } else { None };
    }
}
