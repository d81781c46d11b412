//! Mandatory running time left in the window covering "now".

use chrono::{DateTime, Local, TimeDelta};

use crate::{prelude::*, schedule::TimeWindow};

#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunningTimeSnapshot {
    /// Window covering the last update.
    pub window: Option<TimeWindow>,

    /// Whole seconds of mandatory running time left in the window.
    pub remaining_min_running_time: Option<TimeDelta>,

    pub running: bool,
    pub status_changed_at: Option<DateTime<Local>>,

    /// Start of the running period not yet subtracted.
    pub interval_start: Option<DateTime<Local>>,
}

#[derive(Clone, Debug, Default)]
pub struct RunningTimeMonitor {
    windows: Vec<TimeWindow>,
    snapshot: RunningTimeSnapshot,
}

impl RunningTimeMonitor {
    pub fn new(windows: Vec<TimeWindow>) -> Self {
        Self { windows, snapshot: RunningTimeSnapshot::default() }
    }

    pub fn set_time_windows(&mut self, windows: Vec<TimeWindow>) {
        self.windows = windows;
    }

    pub const fn snapshot(&self) -> &RunningTimeSnapshot {
        &self.snapshot
    }

    /// Record a transition, the time gets accounted on the next update.
    pub fn set_running(&mut self, running: bool, at: DateTime<Local>) {
        if running == self.snapshot.running {
            return;
        }
        debug!(running, %at, "running state changed");
        self.snapshot = RunningTimeSnapshot {
            running,
            status_changed_at: Some(at),
            ..self.snapshot.clone()
        };
    }

    pub fn update(&mut self, now: DateTime<Local>) {
        let window = self.windows.iter().find(|window| window.contains(now)).copied();
        self.snapshot = match window {
            Some(window) => self.next_snapshot(window, now),
            None => {
                if let Some(window) = self.snapshot.window {
                    debug!(end = %window.end(), "window lapsed");
                }
                RunningTimeSnapshot {
                    running: self.snapshot.running,
                    status_changed_at: self.snapshot.status_changed_at,
                    ..RunningTimeSnapshot::default()
                }
            }
        };
    }

    fn next_snapshot(&self, window: TimeWindow, now: DateTime<Local>) -> RunningTimeSnapshot {
        let previous = &self.snapshot;
        let (mut remaining, mut interval_start) = if previous.window == Some(window) {
            (previous.remaining_min_running_time, previous.interval_start)
        } else {
            debug!(start = %window.start(), end = %window.end(), "tracking new window");
            (window.min_running_time(), None)
        };

        if let Some(remaining) = remaining.as_mut() {
            if previous.running {
                let since = previous
                    .status_changed_at
                    .into_iter()
                    .chain(interval_start)
                    .max()
                    .map_or(window.start(), |since| since.max(window.start()));
                *remaining -= whole_seconds(now - since);
                interval_start = Some(now);
            } else if let Some(start) = interval_start.take() {
                let end = previous.status_changed_at.unwrap_or(now).min(now);
                *remaining -= whole_seconds(end - start.max(window.start()));
            }
            *remaining = (*remaining).min(whole_seconds(window.end() - now)).max(TimeDelta::zero());
        } else {
            interval_start = None;
        }

        RunningTimeSnapshot {
            window: Some(window),
            remaining_min_running_time: remaining,
            running: previous.running,
            status_changed_at: previous.status_changed_at,
            interval_start,
        }
    }

    /// Mandatory running time still needed in the current window, zero outside any window.
    pub fn remaining_min_running_time(&mut self, now: DateTime<Local>) -> TimeDelta {
        self.update(now);
        self.snapshot.remaining_min_running_time.unwrap_or_default()
    }
}

/// Truncate to whole seconds, negative spans count as zero.
fn whole_seconds(delta: TimeDelta) -> TimeDelta {
    TimeDelta::seconds(delta.num_seconds().max(0))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn monitor() -> RunningTimeMonitor {
        let window = TimeWindow::builder()
            .start(at(10, 0))
            .end(at(12, 0))
            .min_running_time(TimeDelta::seconds(3600))
            .build()
            .unwrap();
        RunningTimeMonitor::new(vec![window])
    }

    #[test]
    fn nothing_outside_window() {
        let mut monitor = monitor();
        assert_eq!(monitor.remaining_min_running_time(at(9, 0)), TimeDelta::zero());
        assert_eq!(monitor.snapshot().window, None);
    }

    #[test]
    fn initial_remaining_is_window_minimum() {
        let mut monitor = monitor();
        assert_eq!(monitor.remaining_min_running_time(at(10, 0)), TimeDelta::seconds(3600));
    }

    #[test]
    fn running_reduces_remaining() {
        let mut monitor = monitor();
        monitor.update(at(10, 0));
        monitor.set_running(true, at(10, 0));
        assert_eq!(monitor.remaining_min_running_time(at(10, 30)), TimeDelta::seconds(1800));
        assert_eq!(monitor.remaining_min_running_time(at(10, 40)), TimeDelta::seconds(1200));
    }

    #[test]
    fn stopping_books_the_open_interval() {
        let mut monitor = monitor();
        monitor.update(at(10, 0));
        monitor.set_running(true, at(10, 0));
        monitor.update(at(10, 10));
        monitor.set_running(false, at(10, 20));
        assert_eq!(monitor.remaining_min_running_time(at(10, 30)), TimeDelta::seconds(2400));
        assert_eq!(monitor.snapshot().interval_start, None);

        // Idle time does not count.
        assert_eq!(monitor.remaining_min_running_time(at(10, 50)), TimeDelta::seconds(2400));
    }

    #[test]
    fn running_before_window_counts_from_window_start() {
        let mut monitor = monitor();
        monitor.set_running(true, at(9, 0));
        assert_eq!(monitor.remaining_min_running_time(at(10, 15)), TimeDelta::seconds(2700));
    }

    #[test]
    fn clamped_to_time_left_in_window() {
        let mut monitor = monitor();
        assert_eq!(monitor.remaining_min_running_time(at(11, 45)), TimeDelta::seconds(900));
        for now in [at(11, 50), at(11, 55), at(11, 59)] {
            let remaining = monitor.remaining_min_running_time(now);
            assert!(remaining >= TimeDelta::zero());
            assert!(remaining <= at(12, 0) - now);
        }
    }

    #[test]
    fn seconds_are_truncated() {
        let mut monitor = monitor();
        monitor.update(at(10, 0));
        monitor.set_running(true, at(10, 0));
        let now = at(10, 0) + TimeDelta::milliseconds(1900);
        assert_eq!(monitor.remaining_min_running_time(now), TimeDelta::seconds(3599));
    }

    #[test]
    fn cleared_when_window_lapses() {
        let mut monitor = monitor();
        monitor.set_running(true, at(10, 0));
        monitor.update(at(11, 0));
        monitor.update(at(12, 30));
        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.window, None);
        assert_eq!(snapshot.remaining_min_running_time, None);
        assert!(snapshot.running);
    }

    #[test]
    fn new_window_resets() {
        let second = TimeWindow::builder()
            .start(at(13, 0))
            .end(at(15, 0))
            .min_running_time(TimeDelta::seconds(600))
            .build()
            .unwrap();
        let mut monitor = monitor();
        monitor.set_running(true, at(10, 0));
        monitor.update(at(11, 0));
        monitor.set_time_windows(vec![second]);
        assert_eq!(monitor.remaining_min_running_time(at(13, 0)), TimeDelta::seconds(600));
    }
}
