use chrono::{NaiveDate, NaiveDateTime};

use crate::engine::planner::ReminderPlanner;
use crate::engine::window::{WindowEngine, WindowPolicy};
use crate::models::{PrayerDay, PrayerName, PrayerStatus, TimePoint};
use crate::sink::{AlertPayload, AlertSink};

/// Everything that can happen to the engine. The host feeds these in from
/// one place; the runtime itself never blocks, sleeps, or touches I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Periodic heartbeat, roughly once a second.
    Tick,
    /// Fresh times arrived from the provider.
    TimesLoaded(PrayerDay),
    /// The provider failed; keep the last-known-good set.
    TimesFailed,
    /// The user acknowledged a prayer.
    Acknowledged(PrayerName),
    IntervalChanged(u32),
    RemindersToggled(bool),
}

/// I/O the host must perform on the runtime's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Statuses changed; write the day snapshot to the store.
    Persist,
    /// The calendar rolled over; fetch times for `date` and feed the result
    /// back as `TimesLoaded` or `TimesFailed`.
    RequestTimes { date: NaiveDate },
}

/// Single serialized owner of the day's state.
///
/// All status transitions and alert scheduling run through [`apply`]; the
/// host calls it from one loop, so a stale alert can never fire after an
/// acknowledgment cancelled it.
///
/// [`apply`]: Runtime::apply
pub struct Runtime<S: AlertSink> {
    engine: WindowEngine,
    planner: ReminderPlanner,
    sink: S,
    day: Option<PrayerDay>,
    interval_minutes: u32,
    reminders_enabled: bool,
    load_failed: bool,
    /// Date we already emitted a `RequestTimes` for, so a slow fetch does
    /// not get re-requested every tick. The core never retries on its own.
    requested_date: Option<NaiveDate>,
}

impl<S: AlertSink> Runtime<S> {
    pub fn new(policy: WindowPolicy, interval_minutes: u32, reminders_enabled: bool, sink: S) -> Self {
        let engine = WindowEngine::new(policy);
        Self {
            engine,
            planner: ReminderPlanner::new(engine),
            sink,
            day: None,
            interval_minutes: interval_minutes.max(1),
            reminders_enabled,
            load_failed: false,
            requested_date: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn day(&self) -> Option<&PrayerDay> {
        self.day.as_ref()
    }

    pub fn engine(&self) -> &WindowEngine {
        &self.engine
    }

    pub fn next_upcoming(&self) -> Option<(&TimePoint, NaiveDateTime)> {
        self.engine.next_upcoming(self.day.as_ref()?)
    }

    pub fn active_point(&self, now: NaiveDateTime) -> Option<&TimePoint> {
        self.engine.active_point(self.day.as_ref()?, now)
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn interval_minutes(&self) -> u32 {
        self.interval_minutes
    }

    pub fn reminders_enabled(&self) -> bool {
        self.reminders_enabled
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Swap the last-window policy (the host recomputes it when tomorrow's
    /// first time becomes known) and rebuild the schedule under it.
    pub fn set_policy(&mut self, policy: WindowPolicy, now: NaiveDateTime) {
        if self.engine.policy() == policy {
            return;
        }
        self.engine = WindowEngine::new(policy);
        self.planner = ReminderPlanner::new(self.engine);
        self.replan_all(now);
    }

    // ── Transition ───────────────────────────────────────────────────

    pub fn apply(&mut self, now: NaiveDateTime, event: EngineEvent) -> Vec<Effect> {
        match event {
            EngineEvent::Tick => self.on_tick(now),
            EngineEvent::TimesLoaded(fresh) => self.on_times_loaded(now, fresh),
            EngineEvent::TimesFailed => {
                self.load_failed = true;
                log::warn!("time provider failed; keeping last known set");
                Vec::new()
            }
            EngineEvent::Acknowledged(name) => self.on_acknowledged(now, name),
            EngineEvent::IntervalChanged(minutes) => {
                self.interval_minutes = minutes.max(1);
                self.replan_all(now);
                Vec::new()
            }
            EngineEvent::RemindersToggled(enabled) => {
                self.reminders_enabled = enabled;
                self.replan_all(now);
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self, now: NaiveDateTime) -> Vec<Effect> {
        let mut effects = Vec::new();

        // Day rollover: request fresh data once, keep serving yesterday's
        // set until it arrives.
        let today = now.date();
        let rolled_over = self
            .day
            .as_ref()
            .is_some_and(|d| today > d.date && self.requested_date != Some(today));
        if rolled_over {
            self.requested_date = Some(today);
            effects.push(Effect::RequestTimes { date: today });
            self.replan_all(now);
        }

        // Sweep: windows that closed while still Upcoming go Missed, and
        // their outstanding alerts are revoked before the status commits.
        if let Some(day) = &mut self.day {
            let mut changed = false;
            let names: Vec<PrayerName> = day.points.iter().map(|p| p.name).collect();
            for name in names {
                let stored = day.point(name).map(|p| p.status);
                if stored == Some(PrayerStatus::Upcoming)
                    && self.engine.has_window_ended(day, name, now)
                {
                    self.sink.cancel_owner(name.as_str());
                    if let Some(point) = day.point_mut(name) {
                        point.status = PrayerStatus::Missed;
                        changed = true;
                        log::info!("{} window ended unacknowledged, marked missed", name);
                    }
                }
            }
            if changed {
                effects.push(Effect::Persist);
            }
        }

        effects
    }

    fn on_times_loaded(&mut self, now: NaiveDateTime, mut fresh: PrayerDay) -> Vec<Effect> {
        if let Some(previous) = &self.day {
            fresh.carry_completed(previous);
        }
        self.day = Some(fresh);
        self.load_failed = false;
        self.requested_date = None;
        self.replan_all(now);
        vec![Effect::Persist]
    }

    /// The acknowledgment machine: Upcoming or Missed moves to Completed,
    /// nothing ever moves back, Sunrise is out of scope. Cancellation runs
    /// before the status commits so the two read as one atomic step.
    fn on_acknowledged(&mut self, _now: NaiveDateTime, name: PrayerName) -> Vec<Effect> {
        if !name.is_actionable() {
            return Vec::new();
        }
        let stored = self.day.as_ref().and_then(|d| d.point(name)).map(|p| p.status);
        match stored {
            None | Some(PrayerStatus::Completed) => return Vec::new(),
            Some(PrayerStatus::Upcoming) | Some(PrayerStatus::Missed) => {}
        }

        self.sink.cancel_owner(name.as_str());
        if let Some(point) = self.day.as_mut().and_then(|d| d.point_mut(name)) {
            point.status = PrayerStatus::Completed;
        }
        log::info!("{} acknowledged", name);
        vec![Effect::Persist]
    }

    /// Cancel every owner, then register plans for every point whose
    /// derived status is still Upcoming. Follow-ups are held back when
    /// reminders are off; openings are always registered. Only instants
    /// strictly in the future reach the sink.
    fn replan_all(&mut self, now: NaiveDateTime) {
        let Some(day) = &self.day else { return };
        let replan = self.planner.replan(day, self.interval_minutes, now);

        for owner in &replan.cancellations {
            self.sink.cancel_owner(owner.as_str());
        }

        for plan in &replan.plans {
            let owner = plan.owner.as_str();
            if let Some(instant) = plan.primary {
                self.sink
                    .schedule(instant, AlertPayload::opening(plan.owner), owner);
            }
            if self.reminders_enabled {
                for instant in plan.follow_ups.iter().filter(|t| **t > now) {
                    self.sink
                        .schedule(*instant, AlertPayload::follow_up(plan.owner), owner);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use chrono::{NaiveDate, NaiveTime};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 24).unwrap()
    }

    fn day() -> PrayerDay {
        PrayerDay::new(
            date(),
            vec![
                (PrayerName::Fajr, t(4, 30)),
                (PrayerName::Sunrise, t(6, 0)),
                (PrayerName::Dhuhr, t(13, 0)),
                (PrayerName::Asr, t(17, 0)),
            ],
        )
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        date().and_time(t(h, m))
    }

    fn runtime() -> Runtime<MemorySink> {
        Runtime::new(WindowPolicy::CapAtMidnight, 10, true, MemorySink::new())
    }

    #[test]
    fn loading_times_schedules_the_day() {
        let mut rt = runtime();
        let effects = rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        assert_eq!(effects, vec![Effect::Persist]);
        assert!(!rt.load_failed());
        // Alerts for the actionable prayers, none for Sunrise.
        assert!(rt.sink().pending_for("fajr") > 0);
        assert_eq!(rt.sink().pending_for("sunrise"), 0);
    }

    #[test]
    fn reloading_same_times_does_not_duplicate_alerts() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        let first: Vec<_> = rt.sink().pending().to_vec();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        assert_eq!(rt.sink().pending(), first.as_slice());
    }

    #[test]
    fn acknowledgment_cancels_then_completes() {
        let mut rt = runtime();
        rt.apply(at(12, 0), EngineEvent::TimesLoaded(day()));
        assert!(rt.sink().pending_for("dhuhr") > 0);

        let effects = rt.apply(at(13, 15), EngineEvent::Acknowledged(PrayerName::Dhuhr));
        assert_eq!(effects, vec![Effect::Persist]);
        assert_eq!(rt.sink().pending_for("dhuhr"), 0);
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Dhuhr).unwrap().status,
            PrayerStatus::Completed
        );

        // A later tick never re-marks it missed.
        rt.apply(at(18, 0), EngineEvent::Tick);
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Dhuhr).unwrap().status,
            PrayerStatus::Completed
        );
    }

    #[test]
    fn late_acknowledgment_of_missed_prayer_is_allowed() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));

        rt.apply(at(6, 30), EngineEvent::Tick);
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Fajr).unwrap().status,
            PrayerStatus::Missed
        );

        rt.apply(at(6, 45), EngineEvent::Acknowledged(PrayerName::Fajr));
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Fajr).unwrap().status,
            PrayerStatus::Completed
        );
    }

    #[test]
    fn tick_sweep_marks_missed_and_revokes_alerts() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        assert!(rt.sink().pending_for("fajr") > 0);

        let effects = rt.apply(at(6, 0), EngineEvent::Tick);
        assert_eq!(effects, vec![Effect::Persist]);
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Fajr).unwrap().status,
            PrayerStatus::Missed
        );
        assert_eq!(rt.sink().pending_for("fajr"), 0);
        // Sunrise ages out with its window too.
        rt.apply(at(13, 0), EngineEvent::Tick);
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Sunrise).unwrap().status,
            PrayerStatus::Missed
        );
    }

    #[test]
    fn acknowledging_sunrise_is_a_no_op() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        let effects = rt.apply(at(6, 30), EngineEvent::Acknowledged(PrayerName::Sunrise));
        assert!(effects.is_empty());
        assert_ne!(
            rt.day().unwrap().point(PrayerName::Sunrise).unwrap().status,
            PrayerStatus::Completed
        );
    }

    #[test]
    fn day_rollover_requests_fresh_times_once() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));

        let tomorrow = date().succ_opt().unwrap();
        let after_midnight = tomorrow.and_time(t(0, 0));

        let effects = rt.apply(after_midnight, EngineEvent::Tick);
        assert!(effects.contains(&Effect::RequestTimes { date: tomorrow }));
        // Last-known-good set is retained while the fetch is in flight.
        assert_eq!(rt.day().unwrap().date, date());

        // No duplicate request on the next tick.
        let effects = rt.apply(tomorrow.and_time(t(0, 1)), EngineEvent::Tick);
        assert!(!effects.iter().any(|e| matches!(e, Effect::RequestTimes { .. })));
    }

    #[test]
    fn failed_fetch_keeps_last_known_good() {
        let mut rt = runtime();
        rt.apply(at(3, 0), EngineEvent::TimesLoaded(day()));
        rt.apply(at(3, 1), EngineEvent::TimesFailed);
        assert!(rt.load_failed());
        assert!(rt.day().is_some());

        // A successful load clears the flag.
        rt.apply(at(3, 2), EngineEvent::TimesLoaded(day()));
        assert!(!rt.load_failed());
    }

    #[test]
    fn refetch_carries_completed_forward() {
        let mut rt = runtime();
        rt.apply(at(5, 0), EngineEvent::TimesLoaded(day()));
        rt.apply(at(5, 5), EngineEvent::Acknowledged(PrayerName::Fajr));

        rt.apply(at(5, 30), EngineEvent::TimesLoaded(day()));
        assert_eq!(
            rt.day().unwrap().point(PrayerName::Fajr).unwrap().status,
            PrayerStatus::Completed
        );
    }

    #[test]
    fn interval_change_rebuilds_follow_ups() {
        let mut rt = runtime();
        rt.apply(at(12, 0), EngineEvent::TimesLoaded(day()));
        let dense = rt.sink().pending_for("dhuhr");

        rt.apply(at(12, 0), EngineEvent::IntervalChanged(60));
        let sparse = rt.sink().pending_for("dhuhr");
        assert!(sparse < dense, "{} should shrink below {}", sparse, dense);
    }

    #[test]
    fn toggling_reminders_off_keeps_openings_only() {
        let mut rt = runtime();
        rt.apply(at(12, 0), EngineEvent::TimesLoaded(day()));
        rt.apply(at(12, 0), EngineEvent::RemindersToggled(false));

        // One opening alert per upcoming prayer, zero follow-ups.
        assert_eq!(rt.sink().pending_for("dhuhr"), 1);
        assert_eq!(rt.sink().pending_for("asr"), 1);
        assert!(rt
            .sink()
            .pending()
            .iter()
            .all(|a| a.payload.kind == crate::sink::AlertKind::Opening));
    }

    #[test]
    fn events_without_data_degrade_quietly() {
        let mut rt = runtime();
        assert!(rt.apply(at(12, 0), EngineEvent::Tick).is_empty());
        assert!(rt
            .apply(at(12, 0), EngineEvent::Acknowledged(PrayerName::Fajr))
            .is_empty());
        assert!(rt.next_upcoming().is_none());
    }
}
