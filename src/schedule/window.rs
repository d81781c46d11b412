use bon::bon;
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta};

use crate::{error::ConfigurationError, ops::Interval};

/// Permitted operating window `[start, end)` with optional running-time requirements.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    interval: Interval,
    min_running_time: Option<TimeDelta>,
    max_running_time: Option<TimeDelta>,
}

#[bon]
impl TimeWindow {
    #[builder]
    pub fn new(
        start: DateTime<Local>,
        end: DateTime<Local>,
        min_running_time: Option<TimeDelta>,
        max_running_time: Option<TimeDelta>,
    ) -> Result<Self, ConfigurationError> {
        if end <= start {
            return Err(ConfigurationError::EmptyWindow { start, end });
        }
        validate_running_time(min_running_time, max_running_time)?;
        Ok(Self { interval: Interval::new(start, end), min_running_time, max_running_time })
    }
}

impl TryFrom<Interval> for TimeWindow {
    type Error = ConfigurationError;

    fn try_from(interval: Interval) -> Result<Self, Self::Error> {
        Self::builder().start(interval.start).end(interval.end).build()
    }
}

impl TimeWindow {
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    #[must_use]
    pub const fn start(&self) -> DateTime<Local> {
        self.interval.start
    }

    #[must_use]
    pub const fn end(&self) -> DateTime<Local> {
        self.interval.end
    }

    #[must_use]
    pub const fn min_running_time(&self) -> Option<TimeDelta> {
        self.min_running_time
    }

    #[must_use]
    pub const fn max_running_time(&self) -> Option<TimeDelta> {
        self.max_running_time
    }

    #[must_use]
    pub fn contains(&self, instant: DateTime<Local>) -> bool {
        self.interval.contains(instant)
    }

    /// Time left until the window closes, zero once it has.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Local>) -> TimeDelta {
        (self.end() - now).max(TimeDelta::zero())
    }

    /// Move the start keeping the end, used when a preempted interval is re-queued.
    ///
    /// The window never becomes empty: a start past the end is ignored.
    pub(crate) fn postpone_start(mut self, start: DateTime<Local>) -> Self {
        if start > self.interval.start && start < self.interval.end {
            self.interval = self.interval.with_start(start);
        }
        self
    }

    /// Move the end later, an earlier end is ignored.
    pub(crate) fn extend_to(mut self, end: DateTime<Local>) -> Self {
        if end > self.interval.end {
            self.interval = Interval::new(self.interval.start, end);
        }
        self
    }
}

fn validate_running_time(
    min: Option<TimeDelta>,
    max: Option<TimeDelta>,
) -> Result<(), ConfigurationError> {
    if min.is_some_and(|min| min < TimeDelta::zero()) {
        return Err(ConfigurationError::NegativeDuration("minimum running time"));
    }
    if max.is_some_and(|max| max < TimeDelta::zero()) {
        return Err(ConfigurationError::NegativeDuration("maximum running time"));
    }
    if let (Some(min), Some(max)) = (min, max)
        && min > max
    {
        return Err(ConfigurationError::RunningTimeRange);
    }
    Ok(())
}

/// Time-of-day range repeated every day, may cross midnight.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DayTimeframe {
    start: NaiveTime,
    end: NaiveTime,
    min_running_time: Option<TimeDelta>,
    max_running_time: Option<TimeDelta>,
}

#[bon]
impl DayTimeframe {
    #[builder]
    pub fn new(
        start: NaiveTime,
        end: NaiveTime,
        min_running_time: Option<TimeDelta>,
        max_running_time: Option<TimeDelta>,
    ) -> Result<Self, ConfigurationError> {
        if start == end {
            return Err(ConfigurationError::EmptyTimeframe(start));
        }
        validate_running_time(min_running_time, max_running_time)?;
        Ok(Self { start, end, min_running_time, max_running_time })
    }
}

impl DayTimeframe {
    fn occurrence_on(&self, date: NaiveDate) -> Option<TimeWindow> {
        let end_date = if self.end > self.start { date } else { date.checked_add_days(Days::new(1))? };
        TimeWindow::builder()
            .start(date.and_time(self.start).and_local_timezone(Local).earliest()?)
            .end(end_date.and_time(self.end).and_local_timezone(Local).earliest()?)
            .maybe_min_running_time(self.min_running_time)
            .maybe_max_running_time(self.max_running_time)
            .build()
            .ok()
    }
}

/// When a schedule applies.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeframe {
    Daily(DayTimeframe),
    Once(TimeWindow),
}

impl Timeframe {
    /// Occurrences whose end falls inside the `horizon`, ordered by start.
    #[must_use]
    pub fn windows_ending_within(&self, horizon: Interval) -> Vec<TimeWindow> {
        match self {
            Self::Once(window) => {
                if horizon.contains(window.end()) {
                    vec![*window]
                } else {
                    Vec::new()
                }
            }
            Self::Daily(timeframe) => {
                let n_days = (horizon.len().num_days() + 1).unsigned_abs();
                let Some(first_date) = horizon.start.date_naive().checked_sub_days(Days::new(1))
                else {
                    return Vec::new();
                };
                (0..=n_days)
                    .filter_map(|offset| first_date.checked_add_days(Days::new(offset)))
                    .filter_map(|date| timeframe.occurrence_on(date))
                    .filter(|window| horizon.contains(window.end()))
                    .collect()
            }
        }
    }

    /// Occurrence covering the instant, if any.
    #[must_use]
    pub fn window_at(&self, instant: DateTime<Local>) -> Option<TimeWindow> {
        match self {
            Self::Once(window) => window.contains(instant).then_some(*window),
            Self::Daily(_) => self
                .windows_ending_within(Interval::starting_at(instant, TimeDelta::days(2)))
                .into_iter()
                .find(|window| window.contains(instant)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn empty_window_is_rejected() {
        let result = TimeWindow::builder().start(at(10, 0)).end(at(10, 0)).build();
        assert_eq!(result, Err(ConfigurationError::EmptyWindow { start: at(10, 0), end: at(10, 0) }));
        assert!(TimeWindow::builder().start(at(11, 0)).end(at(10, 0)).build().is_err());
    }

    #[test]
    fn running_time_range_is_validated() {
        let result = TimeWindow::builder()
            .start(at(10, 0))
            .end(at(16, 0))
            .min_running_time(TimeDelta::hours(2))
            .max_running_time(TimeDelta::hours(1))
            .build();
        assert_eq!(result, Err(ConfigurationError::RunningTimeRange));
    }

    #[test]
    fn remaining_never_negative() {
        let window = TimeWindow::builder().start(at(10, 0)).end(at(11, 0)).build().unwrap();
        assert_eq!(window.remaining(at(10, 45)), TimeDelta::minutes(15));
        assert_eq!(window.remaining(at(12, 0)), TimeDelta::zero());
    }

    #[test]
    fn postpone_start_keeps_end() {
        let window = TimeWindow::builder().start(at(10, 0)).end(at(16, 0)).build().unwrap();
        let postponed = window.postpone_start(at(11, 0));
        assert_eq!(postponed.start(), at(11, 0));
        assert_eq!(postponed.end(), at(16, 0));
        assert_eq!(window.postpone_start(at(17, 0)), window);
    }

    #[test]
    fn extend_to_keeps_start() {
        let window = TimeWindow::builder().start(at(10, 0)).end(at(16, 0)).build().unwrap();
        let extended = window.extend_to(at(18, 0));
        assert_eq!(extended.start(), at(10, 0));
        assert_eq!(extended.end(), at(18, 0));
        assert_eq!(window.extend_to(at(12, 0)), window);
    }

    #[test]
    fn daily_occurrences_within_two_days() {
        let timeframe = Timeframe::Daily(
            DayTimeframe::builder()
                .start(NaiveTime::from_hms_opt(10, 0, 0).unwrap())
                .end(NaiveTime::from_hms_opt(16, 0, 0).unwrap())
                .build()
                .unwrap(),
        );
        let windows =
            timeframe.windows_ending_within(Interval::starting_at(at(9, 50), TimeDelta::days(2)));
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start(), at(10, 0));
        assert_eq!(windows[0].end(), at(16, 0));
        assert_eq!(windows[1].start(), Local.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap());
    }

    #[test]
    fn daily_occurrence_across_midnight() {
        let timeframe = Timeframe::Daily(
            DayTimeframe::builder()
                .start(NaiveTime::from_hms_opt(22, 0, 0).unwrap())
                .end(NaiveTime::from_hms_opt(6, 0, 0).unwrap())
                .build()
                .unwrap(),
        );
        let window = timeframe.window_at(at(2, 0)).unwrap();
        assert_eq!(window.start(), Local.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap());
        assert_eq!(window.end(), at(6, 0));
        assert!(timeframe.window_at(at(12, 0)).is_none());
    }

    #[test]
    fn once_outside_horizon() {
        let window = TimeWindow::builder()
            .start(Local.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap())
            .end(Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap())
            .build()
            .unwrap();
        let horizon = Interval::starting_at(at(9, 0), TimeDelta::days(2));
        assert!(Timeframe::Once(window).windows_ending_within(horizon).is_empty());
    }
}
