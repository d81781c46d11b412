use std::collections::BTreeMap;

use bon::{Builder, bon};
use chrono::{DateTime, Local, TimeDelta};

use crate::{
    charger::VehicleId,
    error::ConfigurationError,
    event::{Event, EventBus},
    ops::Interval,
    prelude::*,
    quantity::energy::WattHours,
    schedule::{
        Schedule,
        demand::Demand,
        interval::{IntervalId, IntervalState, Origin, TimeframeInterval},
        resolver::{DemandContext, EnergyDemandResolver},
        window::TimeWindow,
    },
};

/// Unscheduled demand signaled from outside the configured schedules.
#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct DemandRequest {
    pub demand: Demand,

    #[builder(default = Origin::Manual)]
    pub origin: Origin,

    pub target: Option<VehicleId>,

    /// End of the request window, defaults to the end of the consideration horizon.
    pub end: Option<DateTime<Local>>,
}

/// What happened to the queue during a single update.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueUpdate {
    pub completed: Vec<IntervalId>,
    pub expired: Vec<IntervalId>,
}

/// Owns the queue of intervals of a single appliance.
pub struct TimeframeIntervalHandler {
    schedules: Vec<Schedule>,
    horizon: TimeDelta,
    resolver: EnergyDemandResolver,
    events: EventBus,

    /// Ordered by window start, stable among equal starts.
    queue: Vec<TimeframeInterval>,

    requests: Vec<DemandRequest>,

    /// Schedule occurrences already admitted, keyed by schedule index and start, mapped to the end.
    admitted: BTreeMap<(usize, DateTime<Local>), DateTime<Local>>,

    next_id: u64,

    last_update: Option<DateTime<Local>>,
}

#[bon]
impl TimeframeIntervalHandler {
    #[builder]
    pub fn new(
        #[builder(default)] schedules: Vec<Schedule>,
        #[builder(default = TimeframeIntervalHandler::DEFAULT_HORIZON_DAYS)] horizon_days: u32,
        #[builder(default)] events: EventBus,
    ) -> Result<Self, ConfigurationError> {
        if horizon_days == 0 {
            return Err(ConfigurationError::Horizon);
        }
        Ok(Self {
            schedules,
            horizon: TimeDelta::days(i64::from(horizon_days)),
            resolver: EnergyDemandResolver,
            events,
            queue: Vec::new(),
            requests: Vec::new(),
            admitted: BTreeMap::new(),
            next_id: 1,
            last_update: None,
        })
    }
}

impl TimeframeIntervalHandler {
    pub const DEFAULT_HORIZON_DAYS: u32 = 2;

    #[must_use]
    pub const fn horizon(&self) -> TimeDelta {
        self.horizon
    }

    #[must_use]
    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    #[must_use]
    pub fn queue_snapshot(&self) -> &[TimeframeInterval] {
        &self.queue
    }

    #[must_use]
    pub fn active_interval(&self) -> Option<&TimeframeInterval> {
        self.queue.iter().find(|interval| interval.is_active())
    }

    /// Admit an unscheduled demand on the next update.
    pub fn signal_demand(&mut self, request: DemandRequest) {
        debug!(origin = %request.origin, demand = ?request.demand, "demand signaled");
        self.requests.push(request);
    }

    /// Drop optional and manual intervals, for example when the vehicle leaves.
    ///
    /// Scheduled intervals stay.
    pub fn discard_unscheduled(&mut self) {
        self.requests.clear();
        self.queue.retain(|interval| {
            let keep = interval.origin == Origin::Schedule;
            if !keep {
                info!(id = %interval.id, origin = %interval.origin, "discarding…");
            }
            keep
        });
    }

    /// Whether a configured schedule applying to the vehicle covers the instant.
    #[must_use]
    pub fn has_scheduled_demand_at(&self, now: DateTime<Local>, vehicle: VehicleId) -> bool {
        self.schedules.iter().any(|schedule| {
            schedule.target.is_none_or(|target| target == vehicle)
                && schedule.timeframe.window_at(now).is_some()
        })
    }

    /// Advance the queue to `now`.
    ///
    /// Expiry, admission, and promotion happen before the active interval is resolved
    /// against the meter reading in `context`. An interval promoted after a completion
    /// gets resolved with the same reading.
    #[instrument(skip_all, fields(now = %now))]
    pub fn update_queue(&mut self, now: DateTime<Local>, context: &DemandContext) -> QueueUpdate {
        let mut update = QueueUpdate::default();
        self.book_runtime(now, context);
        self.expire(now, &mut update);
        self.admit_schedules(now, context);
        self.admit_requests(now, context);
        loop {
            self.promote(now, context);
            match self.resolve_active(now, context) {
                Some(id) => update.completed.push(id),
                None => break,
            }
        }
        self.resolve_queued(context);
        self.last_update = Some(now);
        update
    }

    /// Book the whole seconds the appliance ran since the previous update to the active runtime interval.
    ///
    /// A transition after the previous update splits the span: only the running part is booked.
    fn book_runtime(&mut self, now: DateTime<Local>, context: &DemandContext) {
        let Some(last_update) = self.last_update else {
            return;
        };
        let changed_at = context.status_changed_at.filter(|at| *at > last_update);
        let (since, until) = match (context.running, changed_at) {
            (true, changed_at) => (changed_at.unwrap_or(last_update), now),
            (false, Some(changed_at)) => (last_update, changed_at.min(now)),
            (false, None) => return,
        };
        if until <= since {
            return;
        }
        let elapsed = TimeDelta::seconds((until - since).num_seconds());
        if let Some(interval) = self
            .queue
            .iter_mut()
            .find(|interval| interval.is_active() && interval.demand.runtime_target().is_some())
        {
            interval.consumed_runtime += elapsed;
            trace!(id = %interval.id, consumed_runtime = ?interval.consumed_runtime, "booked runtime");
        }
    }

    fn expire(&mut self, now: DateTime<Local>, update: &mut QueueUpdate) {
        self.admitted.retain(|_, end| *end > now);
        let (expired, queue): (Vec<_>, Vec<_>) =
            self.queue.drain(..).partition(|interval| interval.window.end() <= now);
        self.queue = queue;
        for mut interval in expired {
            interval.state = IntervalState::Expired;
            info!(id = %interval.id, origin = %interval.origin, "expired");
            self.events.publish(Event::IntervalExpired { id: interval.id, at: now });
            update.expired.push(interval.id);
        }
    }

    fn admit_schedules(&mut self, now: DateTime<Local>, context: &DemandContext) {
        let horizon = Interval::starting_at(now, self.horizon);
        let occurrences: Vec<_> = self
            .schedules
            .iter()
            .enumerate()
            .flat_map(|(index, schedule)| {
                schedule
                    .timeframe
                    .windows_ending_within(horizon)
                    .into_iter()
                    .map(move |window| (index, window, *schedule))
            })
            .filter(|(index, window, _)| {
                window.end() > now && !self.admitted.contains_key(&(*index, window.start()))
            })
            .collect();
        for (index, window, schedule) in occurrences {
            self.admitted.insert((index, window.start()), window.end());
            self.enqueue(window, schedule.demand, Origin::Schedule, schedule.target, context);
        }
    }

    fn admit_requests(&mut self, now: DateTime<Local>, context: &DemandContext) {
        for request in std::mem::take(&mut self.requests) {
            let horizon_end = now + self.horizon;
            let end = request.end.map_or(horizon_end, |end| end.min(horizon_end));
            match TimeWindow::builder().start(now).end(end).build() {
                Ok(window) => {
                    self.enqueue(window, request.demand, request.origin, request.target, context);
                }
                Err(error) => {
                    debug!(%error, "request window already over, skipping");
                }
            }
        }
    }

    fn enqueue(
        &mut self,
        window: TimeWindow,
        demand: Demand,
        origin: Origin,
        target: Option<VehicleId>,
        context: &DemandContext,
    ) {
        let id = IntervalId(self.next_id);
        self.next_id += 1;
        let mut interval = TimeframeInterval::new(id, window, demand, origin, target);
        interval.required_energy = self.resolver.required_energy(&interval, context);
        if is_target_reached(&interval) {
            debug!(%id, %origin, "state of charge target already reached, skipping");
            return;
        }
        info!(
            %id,
            %origin,
            start = %window.start(),
            end = %window.end(),
            required_energy = ?interval.required_energy,
            "queued",
        );
        self.events.publish(Event::IntervalQueued { id, window });
        self.insert(interval);
    }

    /// Insert after any interval with the same start.
    fn insert(&mut self, interval: TimeframeInterval) {
        let index =
            self.queue.partition_point(|queued| queued.window.start() <= interval.window.start());
        self.queue.insert(index, interval);
    }

    /// Queued interval that may run now and wins the tie-break.
    fn best_eligible(&self, now: DateTime<Local>) -> Option<usize> {
        self.queue
            .iter()
            .enumerate()
            .filter(|(_, interval)| interval.is_queued() && interval.window.contains(now))
            .reduce(|best, next| if next.1.takes_precedence_over(best.1) { next } else { best })
            .map(|(index, _)| index)
    }

    fn promote(&mut self, now: DateTime<Local>, context: &DemandContext) {
        while let Some(candidate) = self.best_eligible(now) {
            if let Some(active) = self.queue.iter().position(TimeframeInterval::is_active) {
                if self.queue[candidate].origin <= self.queue[active].origin {
                    return;
                }
                let by = self.queue[candidate].id;
                let mut preempted = self.queue.remove(active);
                preempted.deactivate(now);
                if preempted.origin == Origin::Optional {
                    preempted.window = preempted.window.extend_to(now + self.horizon);
                }
                info!(id = %preempted.id, %by, "preempted");
                self.events.publish(Event::IntervalDeactivated { id: preempted.id, at: now });
                self.insert(preempted);
                continue;
            }

            let resolver = self.resolver;
            let interval = &mut self.queue[candidate];
            if matches!(interval.demand, Demand::StateOfCharge { .. }) {
                interval.required_energy = resolver.required_energy(interval, context);
                interval.consumed_energy = WattHours::ZERO;
            }
            if is_target_reached(interval) {
                let interval = self.queue.remove(candidate);
                debug!(id = %interval.id, "state of charge target already reached, removing");
                continue;
            }
            let interval = &mut self.queue[candidate];
            interval.activate(now, context.metered_energy);
            info!(
                id = %interval.id,
                origin = %interval.origin,
                required_energy = ?interval.required_energy,
                "activated",
            );
            self.events.publish(Event::IntervalActivated { id: interval.id, at: now });
            return;
        }
    }

    /// Book the meter progress and complete the active interval once satisfied.
    fn resolve_active(&mut self, now: DateTime<Local>, context: &DemandContext) -> Option<IntervalId> {
        let index = self.queue.iter().position(TimeframeInterval::is_active)?;
        let resolver = self.resolver;
        let interval = &mut self.queue[index];
        if interval.demand.is_energy() {
            resolver.update_consumed(interval, context);
            debug!(
                id = %interval.id,
                consumed = %interval.consumed_energy,
                remaining = ?interval.remaining_energy(),
                "resolved",
            );
        }
        if !interval.is_satisfied() {
            return None;
        }
        let interval = self.queue.remove(index);
        info!(id = %interval.id, origin = %interval.origin, "completed");
        self.events.publish(Event::IntervalCompleted { id: interval.id, at: now });
        Some(interval.id)
    }

    /// Follow the vehicle estimate for state-of-charge intervals still waiting.
    fn resolve_queued(&mut self, context: &DemandContext) {
        let resolver = self.resolver;
        for interval in &mut self.queue {
            if interval.is_queued() && matches!(interval.demand, Demand::StateOfCharge { .. }) {
                interval.required_energy = resolver.required_energy(interval, context);
            }
        }
        self.queue.retain(|interval| {
            let keep = !(interval.is_queued() && is_target_reached(interval));
            if !keep {
                debug!(id = %interval.id, "state of charge target reached, removing");
            }
            keep
        });
    }
}

fn is_target_reached(interval: &TimeframeInterval) -> bool {
    matches!(interval.demand, Demand::StateOfCharge { .. })
        && interval.required_energy.is_none_or(|required| required <= WattHours::ZERO)
}
