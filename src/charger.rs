//! Charging session of an electric vehicle.

mod meter;
mod vehicle;

use chrono::{DateTime, Local};

pub use self::{
    meter::{Meter, PollingEnergyMeter},
    vehicle::{ChargerDefaults, ElectricVehicle, SocEstimate, SocReading, VehicleId},
};
use crate::{
    event::{Event, EventBus},
    prelude::*,
    quantity::energy::WattHours,
    schedule::{
        Demand,
        DemandRequest,
        IntervalId,
        Origin,
        QueueUpdate,
        TimeframeIntervalHandler,
        VehicleSnapshot,
    },
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum ChargingState {
    #[display("disconnected")]
    Disconnected,

    #[display("connected")]
    Connected,

    #[display("charging")]
    Charging { since: DateTime<Local> },

    /// The vehicle refused energy, or no energy demand was left.
    #[display("completed")]
    Completed {
        at: DateTime<Local>,

        /// Interval that was active at the completion.
        interval: Option<IntervalId>,
    },
}

/// Status reported by the charger hardware.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChargerStatus {
    pub connected: bool,
    pub charging: bool,
}

pub struct EvCharger {
    vehicle: ElectricVehicle,
    state: ChargingState,
    estimate: SocEstimate,
    events: EventBus,
}

impl EvCharger {
    pub fn new(vehicle: ElectricVehicle, events: EventBus) -> Self {
        Self {
            vehicle,
            state: ChargingState::Disconnected,
            estimate: SocEstimate::new(vehicle.initial_state_of_charge, WattHours::ZERO),
            events,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ChargingState {
        self.state
    }

    #[must_use]
    pub const fn is_charging_completed(&self) -> bool {
        matches!(self.state, ChargingState::Completed { .. })
    }

    /// Battery estimate for demand resolution.
    #[must_use]
    pub fn snapshot(&self, metered_energy: WattHours) -> VehicleSnapshot {
        VehicleSnapshot {
            id: self.vehicle.id,
            state_of_charge: self.estimate.estimate(&self.vehicle, metered_energy),
            charge_loss: self.vehicle.charge_loss,
        }
    }

    /// Follow the charger status, to be called before the queue update.
    #[instrument(skip_all, fields(now = %now, state = %self.state))]
    pub fn update_state(
        &mut self,
        now: DateTime<Local>,
        status: ChargerStatus,
        state_of_charge: SocReading,
        switched_on: bool,
        meter: &mut dyn Meter,
        handler: &mut TimeframeIntervalHandler,
    ) {
        if status.connected {
            self.read_state_of_charge(state_of_charge, meter.current_energy());
        }
        let next = match (self.state, status.connected, status.charging) {
            (ChargingState::Disconnected, false, _) => return,
            (_, false, _) => ChargingState::Disconnected,
            (ChargingState::Disconnected, true, false) => ChargingState::Connected,
            (
                ChargingState::Disconnected
                | ChargingState::Connected
                | ChargingState::Completed { .. },
                true,
                true,
            ) => ChargingState::Charging { since: now },
            (ChargingState::Charging { .. }, true, false) if switched_on => {
                info!("the vehicle stopped charging while switched on");
                ChargingState::Completed {
                    at: now,
                    interval: handler.active_interval().map(|interval| interval.id),
                }
            }
            (ChargingState::Charging { .. }, true, false) => ChargingState::Connected,
            (state, true, _) => state,
        };
        if self.state == ChargingState::Disconnected {
            self.on_connected(now, handler);
        }
        self.transition(next, meter, handler);
    }

    /// React to the queue update of the same tick.
    pub fn on_queue_updated(
        &mut self,
        now: DateTime<Local>,
        update: &QueueUpdate,
        handler: &mut TimeframeIntervalHandler,
        meter: &mut dyn Meter,
    ) {
        let active = handler
            .active_interval()
            .filter(|interval| interval.demand.is_energy())
            .map(|interval| interval.id);
        match self.state {
            ChargingState::Charging { .. } if !update.completed.is_empty() && active.is_none() => {
                info!("no energy demand left");
                self.transition(ChargingState::Completed { at: now, interval: None }, meter, handler);
            }
            ChargingState::Completed { interval, .. } if active.is_some() && active != interval => {
                info!(active = ?active, "new energy demand");
                self.transition(ChargingState::Connected, meter, handler);
            }
            _ => {}
        }
    }

    fn read_state_of_charge(&mut self, reading: SocReading, metered_energy: WattHours) {
        match reading {
            SocReading::Value(state_of_charge) if state_of_charge.is_valid_state_of_charge() => {
                debug!(%state_of_charge, "read the state of charge");
                self.estimate = SocEstimate::new(state_of_charge, metered_energy);
            }
            SocReading::Value(state_of_charge) => {
                warn!(%state_of_charge, "state of charge out of range, keeping the estimate");
            }
            SocReading::Failed => {
                warn!(
                    estimate = %self.estimate.estimate(&self.vehicle, metered_energy),
                    "failed to read the state of charge, keeping the estimate",
                );
            }
            SocReading::Unavailable => {}
        }
    }

    fn on_connected(&self, now: DateTime<Local>, handler: &mut TimeframeIntervalHandler) {
        info!(vehicle = %self.vehicle.id, "vehicle connected");
        if handler.has_scheduled_demand_at(now, self.vehicle.id) {
            debug!("scheduled demand covers now, no optional energy");
            return;
        }
        let demand = Demand::StateOfCharge {
            target: self.vehicle.optional_energy_target,
            battery_capacity: self.vehicle.battery_capacity,
        };
        handler.signal_demand(
            DemandRequest::builder()
                .demand(demand)
                .origin(Origin::Optional)
                .target(self.vehicle.id)
                .build(),
        );
    }

    fn transition(
        &mut self,
        next: ChargingState,
        meter: &mut dyn Meter,
        handler: &mut TimeframeIntervalHandler,
    ) {
        if next == self.state {
            return;
        }
        match (self.state, next) {
            (_, ChargingState::Disconnected) => {
                meter.stop_energy_meter();
                meter.reset_energy_meter();
                handler.discard_unscheduled();
                self.estimate = SocEstimate::new(self.vehicle.initial_state_of_charge, WattHours::ZERO);
            }
            (
                ChargingState::Charging { .. },
                ChargingState::Connected | ChargingState::Completed { .. },
            ) => {
                meter.stop_energy_meter();
            }
            (_, ChargingState::Charging { .. }) => {
                meter.start_energy_meter();
            }
            _ => {}
        }
        if let ChargingState::Completed { at, .. } = next {
            self.events.publish(Event::ChargingCompleted { at });
        }
        info!(from = %self.state, to = %next, total = %meter.current_energy(), "charging state changed");
        self.events.publish(Event::ChargingStateChanged { from: self.state, to: next });
        self.state = next;
    }
}
