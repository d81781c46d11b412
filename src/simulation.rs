//! Replays recorded or hand-written sensor readings through an appliance.

use std::{fs, path::Path};

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use serde::Deserialize;
use tokio::sync::broadcast::Receiver;

use crate::{
    appliance::{Appliance, Readings},
    charger::{ChargerStatus, ElectricVehicle, Meter, SocReading},
    clock::{Clock, FixedClock},
    config::{ApplianceConfig, RequestConfig, to_local},
    event::{Event, EventBus, drain},
    prelude::*,
    quantity::{energy::WattHours, percent::Percent, power::Watts},
    schedule::QueueUpdate,
};

#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default, rename = "tick")]
    pub ticks: Vec<Tick>,
}

impl Scenario {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path) -> Result<Self> {
        info!("reading the scenario…");
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to load `{}`", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(content).context("failed to parse the scenario")?;
        ensure!(
            scenario.ticks.is_sorted_by_key(|tick| tick.at),
            "ticks must be in chronological order"
        );
        Ok(scenario)
    }
}

/// Sensor values at a single moment.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tick {
    pub at: NaiveDateTime,

    pub energy_counter: Option<WattHours>,
    pub power: Option<Watts>,

    #[serde(default)]
    pub connected: bool,

    #[serde(default)]
    pub charging: bool,

    pub state_of_charge: Option<Percent>,

    /// The vehicle was polled, but did not answer.
    #[serde(default)]
    pub state_of_charge_failed: bool,

    /// Override the switching decision.
    pub switch: Option<bool>,

    /// Manual demand issued right before the tick.
    pub request: Option<RequestConfig>,
}

impl Tick {
    #[must_use]
    pub fn readings(&self) -> Readings {
        Readings {
            energy_counter: self.energy_counter,
            power: self.power,
            charger: ChargerStatus { connected: self.connected, charging: self.charging },
            state_of_charge: match (self.state_of_charge, self.state_of_charge_failed) {
                (_, true) => SocReading::Failed,
                (Some(state_of_charge), false) => SocReading::Value(state_of_charge),
                (None, false) => SocReading::Unavailable,
            },
        }
    }
}

/// Outcome of a single replayed tick.
#[derive(Clone, Debug)]
pub struct Step {
    pub at: DateTime<Local>,
    pub update: QueueUpdate,
    pub on: bool,
    pub metered_energy: WattHours,
    pub remaining_min_running_time: TimeDelta,
    pub events: Vec<Event>,
}

pub struct Simulation {
    clock: Option<FixedClock>,
    appliance: Appliance,
    vehicle: Option<ElectricVehicle>,
    receiver: Receiver<Event>,
}

impl Simulation {
    pub fn new(config: &ApplianceConfig) -> Result<Self> {
        let events = EventBus::default();
        let receiver = events.subscribe();
        Ok(Self {
            clock: None,
            appliance: config.build(events)?,
            vehicle: config.electric_vehicle()?,
            receiver,
        })
    }

    #[must_use]
    pub const fn appliance(&self) -> &Appliance {
        &self.appliance
    }

    #[instrument(skip_all, fields(at = %tick.at))]
    pub fn step(&mut self, tick: &Tick) -> Result<Step> {
        let at = to_local(tick.at)?;
        let clock = self.clock.get_or_insert_with(|| FixedClock::new(at));
        ensure!(at >= clock.now(), "time went backwards at `{}`", tick.at);
        clock.set(at);
        if let Some(request) = tick.request {
            let request = request.build(self.vehicle.as_ref()).context("invalid request")?;
            info!(demand = ?request.demand, "signaling…");
            self.appliance.signal_demand(request);
        }
        let update = self.appliance.tick(at, &tick.readings());
        let on = match tick.switch {
            Some(on) => self.appliance.switch(at, on),
            None => self.appliance.apply(at),
        };
        Ok(Step {
            at,
            update,
            on,
            metered_energy: self.appliance.meter().current_energy(),
            remaining_min_running_time: self.appliance.remaining_min_running_time(at),
            events: drain(&mut self.receiver),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{charger::ChargingState, schedule::Origin};

    const CONFIG: &str = r#"
        id = "F-00000001-000000000001-00"
        horizon_days = 1

        [vehicle]
        id = 1
        battery_capacity = 40000

        [[schedule]]
        daily = { start = "10:00:00", end = "16:00:00" }
        demand = { kind = "state_of_charge", target = 60 }
    "#;

    const SCENARIO: &str = r#"
        [[tick]]
        at = "2026-03-02T09:50:00"
        energy_counter = 0

        [[tick]]
        at = "2026-03-02T09:55:00"
        energy_counter = 0
        connected = true
        state_of_charge = 50

        [[tick]]
        at = "2026-03-02T09:56:00"
        energy_counter = 0
        connected = true
        charging = true

        [[tick]]
        at = "2026-03-02T10:00:00"
        energy_counter = 0
        connected = true
        charging = true

        [[tick]]
        at = "2026-03-02T11:00:00"
        energy_counter = 4400
        connected = true
        charging = true
    "#;

    #[test]
    fn replay_ev_charger() {
        let config = ApplianceConfig::parse(CONFIG).unwrap();
        let scenario = Scenario::parse(SCENARIO).unwrap();
        let mut simulation = Simulation::new(&config).unwrap();
        let steps: Vec<Step> =
            scenario.ticks.iter().map(|tick| simulation.step(tick).unwrap()).collect();

        assert!(!steps[0].on);
        assert!(steps[1].on);
        assert!(
            steps[1].events.contains(&Event::ControlStateChanged { on: true, at: steps[1].at })
        );
        assert!(matches!(
            simulation.appliance().charging_state(),
            Some(ChargingState::Charging { .. })
        ));
        assert_eq!(steps[4].update.completed.len(), 1);

        let active = simulation.appliance().handler().active_interval().unwrap();
        assert_eq!(active.origin, Origin::Optional);
        assert_relative_eq!(active.required_energy.unwrap().0, 17600.0, epsilon = 1e-6);
    }

    #[test]
    fn manual_request_and_override() {
        let config = ApplianceConfig::parse(r#"id = "F-00000001-000000000002-00""#).unwrap();
        let scenario = Scenario::parse(
            r#"
            [[tick]]
            at = "2026-03-02T10:00:00"
            energy_counter = 1000
            request = { demand = { kind = "energy", required = 500 } }

            [[tick]]
            at = "2026-03-02T10:30:00"
            energy_counter = 1200
            switch = false

            [[tick]]
            at = "2026-03-02T11:00:00"
            energy_counter = 1500
            "#,
        )
        .unwrap();
        let mut simulation = Simulation::new(&config).unwrap();
        let steps: Vec<Step> =
            scenario.ticks.iter().map(|tick| simulation.step(tick).unwrap()).collect();
        assert!(steps[0].on);
        assert!(!steps[1].on);
        assert_eq!(steps[2].update.completed.len(), 1);
        assert!(!steps[2].on);
    }

    #[test]
    fn failed_reading_takes_priority() {
        let tick = Tick {
            at: NaiveDateTime::default(),
            energy_counter: None,
            power: None,
            connected: true,
            charging: false,
            state_of_charge: Some(Percent(40.0)),
            state_of_charge_failed: true,
            switch: None,
            request: None,
        };
        assert_eq!(tick.readings().state_of_charge, SocReading::Failed);
    }

    #[test]
    fn unordered_ticks_are_rejected() {
        let scenario = Scenario::parse(
            r#"
            [[tick]]
            at = "2026-03-02T10:00:00"

            [[tick]]
            at = "2026-03-02T09:00:00"
            "#,
        );
        assert!(scenario.is_err());
    }
}
