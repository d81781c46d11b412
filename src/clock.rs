use std::cell::Cell;

use chrono::{DateTime, Local, TimeDelta, Timelike};

/// Source of the current timestamp.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock truncated to whole seconds.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        let now = Local::now();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// Manually driven clock for replays and tests.
#[derive(Clone, Debug)]
pub struct FixedClock(Cell<DateTime<Local>>);

impl FixedClock {
    pub const fn new(now: DateTime<Local>) -> Self {
        Self(Cell::new(now))
    }

    pub fn set(&self, now: DateTime<Local>) {
        self.0.set(now);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.0.set(self.0.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0.get()
    }
}
