//! Observable state changes of an appliance.
//!
//! Subscribers take a [`Receiver`] from [`EventBus::subscribe`] and unsubscribe by dropping it.
//! Publishing never blocks: when nobody listens the event is discarded, and a lagging receiver
//! loses the oldest events.

use chrono::{DateTime, Local};
use tokio::sync::broadcast::{self, Receiver, Sender, error::TryRecvError};

use crate::{
    charger::ChargingState,
    prelude::*,
    schedule::{IntervalId, TimeWindow},
};

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    IntervalQueued { id: IntervalId, window: TimeWindow },
    IntervalActivated { id: IntervalId, at: DateTime<Local> },

    /// A higher-precedence demand took over, the interval went back to the queue.
    IntervalDeactivated { id: IntervalId, at: DateTime<Local> },

    IntervalExpired { id: IntervalId, at: DateTime<Local> },
    IntervalCompleted { id: IntervalId, at: DateTime<Local> },
    ChargingStateChanged { from: ChargingState, to: ChargingState },
    ChargingCompleted { at: DateTime<Local> },
    ControlStateChanged { on: bool, at: DateTime<Local> },
    StartingCurrentDetected { at: DateTime<Local> },
}

#[derive(Clone, Debug)]
pub struct EventBus(Sender<Event>);

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl EventBus {
    const DEFAULT_CAPACITY: usize = 64;

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self(sender)
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<Event> {
        self.0.subscribe()
    }

    #[must_use]
    pub fn n_subscribers(&self) -> usize {
        self.0.receiver_count()
    }

    pub fn publish(&self, event: Event) {
        trace!(?event, "publishing…");
        if self.0.send(event).is_err() {
            trace!("no subscribers");
        }
    }
}

/// Take every pending event without waiting.
pub fn drain(receiver: &mut Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(n_lost)) => warn!(n_lost, "receiver lagged behind"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break events,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(Event::ChargingCompleted { at: Local::now() });
        assert_eq!(bus.n_subscribers(), 0);
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        let at = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        bus.publish(Event::ControlStateChanged { on: true, at });
        assert_eq!(drain(&mut receiver), vec![Event::ControlStateChanged { on: true, at }]);

        drop(receiver);
        assert_eq!(bus.n_subscribers(), 0);
    }

    #[test]
    fn lagging_receiver_loses_oldest() {
        let bus = EventBus::with_capacity(2);
        let mut receiver = bus.subscribe();
        let at = Local.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        for on in [true, false, true] {
            bus.publish(Event::ControlStateChanged { on, at });
        }
        assert_eq!(
            drain(&mut receiver),
            vec![
                Event::ControlStateChanged { on: false, at },
                Event::ControlStateChanged { on: true, at },
            ]
        );
    }
}
