use bon::bon;
use chrono::{DateTime, Local, TimeDelta};

use crate::{
    charger::{ChargerStatus, ChargingState, ElectricVehicle, EvCharger, Meter, PollingEnergyMeter, SocReading},
    control::{Control, MeterReportingSwitch},
    error::ConfigurationError,
    event::{Event, EventBus},
    prelude::*,
    quantity::{energy::WattHours, power::Watts},
    running_time::RunningTimeMonitor,
    schedule::{
        Demand,
        DemandContext,
        DemandRequest,
        QueueUpdate,
        Schedule,
        TimeWindow,
        TimeframeInterval,
        TimeframeIntervalHandler,
    },
};

/// Sensor values of a single evaluation tick.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Readings {
    /// Cumulative energy counter.
    pub energy_counter: Option<WattHours>,

    pub power: Option<Watts>,
    pub charger: ChargerStatus,
    pub state_of_charge: SocReading,
}

/// Scheduling engine of a single appliance.
pub struct Appliance {
    id: String,
    control: Control,
    handler: TimeframeIntervalHandler,
    monitor: RunningTimeMonitor,
    meter: PollingEnergyMeter,
    running_detector: Option<MeterReportingSwitch>,
    charger: Option<EvCharger>,
    events: EventBus,
}

#[bon]
impl Appliance {
    #[builder]
    pub fn new(
        #[builder(into)] id: String,
        #[builder(default = Control::switch())] control: Control,
        #[builder(default)] schedules: Vec<Schedule>,
        #[builder(default = TimeframeIntervalHandler::DEFAULT_HORIZON_DAYS)] horizon_days: u32,
        running_detector: Option<MeterReportingSwitch>,
        vehicle: Option<ElectricVehicle>,
        #[builder(default)] events: EventBus,
    ) -> Result<Self, ConfigurationError> {
        let handler = TimeframeIntervalHandler::builder()
            .schedules(schedules)
            .horizon_days(horizon_days)
            .events(events.clone())
            .build()?;
        let mut meter = PollingEnergyMeter::default();
        if vehicle.is_none() {
            // Only a charger session controls the meter.
            meter.start_energy_meter();
        }
        Ok(Self {
            id,
            control,
            handler,
            monitor: RunningTimeMonitor::default(),
            meter,
            running_detector,
            charger: vehicle.map(|vehicle| EvCharger::new(vehicle, events.clone())),
            events,
        })
    }
}

impl Appliance {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn control(&self) -> &Control {
        &self.control
    }

    #[must_use]
    pub const fn handler(&self) -> &TimeframeIntervalHandler {
        &self.handler
    }

    #[must_use]
    pub const fn meter(&self) -> &PollingEnergyMeter {
        &self.meter
    }

    #[must_use]
    pub fn charging_state(&self) -> Option<ChargingState> {
        self.charger.as_ref().map(EvCharger::state)
    }

    #[must_use]
    pub fn is_charging_completed(&self) -> bool {
        self.charger.as_ref().is_some_and(EvCharger::is_charging_completed)
    }

    #[must_use]
    pub fn queue_snapshot(&self) -> &[TimeframeInterval] {
        self.handler.queue_snapshot()
    }

    pub fn signal_demand(&mut self, request: DemandRequest) {
        self.handler.signal_demand(request);
    }

    /// Evaluate the appliance at `now`.
    #[instrument(skip_all, fields(appliance = %self.id, now = %now))]
    pub fn tick(&mut self, now: DateTime<Local>, readings: &Readings) -> QueueUpdate {
        match (readings.energy_counter, readings.power) {
            (Some(counter), power) => self.meter.record(now, counter, power),
            (None, Some(power)) => self.meter.record_power(power),
            (None, None) => {}
        }
        let running = self.update_running(now, readings);
        if self.control.sample(now, self.meter.average_power()) {
            self.events.publish(Event::StartingCurrentDetected { at: now });
        }

        if let Some(charger) = &mut self.charger {
            charger.update_state(
                now,
                readings.charger,
                readings.state_of_charge,
                self.control.is_on(),
                &mut self.meter,
                &mut self.handler,
            );
        }
        let metered_energy = self.meter.current_energy();
        let context = DemandContext {
            metered_energy,
            running,
            status_changed_at: self.monitor.snapshot().status_changed_at,
            vehicle: self.charger.as_ref().map(|charger| charger.snapshot(metered_energy)),
        };
        let update = self.handler.update_queue(now, &context);
        if let Some(charger) = &mut self.charger {
            charger.on_queue_updated(now, &update, &mut self.handler, &mut self.meter);
        }

        self.monitor.set_time_windows(self.running_time_windows(now));
        self.monitor.update(now);
        update
    }

    fn update_running(&mut self, now: DateTime<Local>, readings: &Readings) -> bool {
        let running = match (&mut self.running_detector, &self.charger) {
            (Some(detector), _) => detector.update(now, self.meter.average_power()),
            (None, Some(_)) => readings.charger.charging,
            (None, None) => self.control.is_appliance_on(),
        };
        self.monitor.set_running(running, now);
        running
    }

    /// Windows covering `now` that require a minimum running time.
    fn running_time_windows(&self, now: DateTime<Local>) -> Vec<TimeWindow> {
        self.handler
            .schedules()
            .iter()
            .filter(|schedule| matches!(schedule.demand, Demand::Runtime { .. }))
            .filter_map(|schedule| schedule.timeframe.window_at(now))
            .filter(|window| window.min_running_time().is_some())
            .collect()
    }

    /// Whether the appliance should be powered.
    ///
    /// Without an active demand it stays off.
    #[must_use]
    pub fn should_be_on(&self) -> bool {
        if !self.control.is_controllable() {
            return true;
        }
        if let Some(charger) = &self.charger
            && matches!(charger.state(), ChargingState::Disconnected | ChargingState::Completed { .. })
        {
            return false;
        }
        self.handler.active_interval().is_some()
    }

    pub fn remaining_min_running_time(&mut self, now: DateTime<Local>) -> TimeDelta {
        self.monitor.remaining_min_running_time(now)
    }

    /// Switch the control, returns the resulting state.
    pub fn switch(&mut self, now: DateTime<Local>, on: bool) -> bool {
        if self.control.is_on() == on {
            return on;
        }
        let on = self.control.on(on);
        info!(appliance = %self.id, on, "switched");
        if self.running_detector.is_none() && self.charger.is_none() {
            self.monitor.set_running(self.control.is_appliance_on(), now);
        }
        self.events.publish(Event::ControlStateChanged { on, at: now });
        on
    }

    /// Follow [`Appliance::should_be_on`].
    pub fn apply(&mut self, now: DateTime<Local>) -> bool {
        let on = self.should_be_on();
        self.switch(now, on)
    }
}
