use chrono::{NaiveDateTime, NaiveTime};

use crate::engine::clock;
use crate::models::{PrayerDay, PrayerName, PrayerStatus, TimePoint};

/// How the last point's window ends.
///
/// Earlier revisions of this logic disagreed on whether Isha runs out at
/// midnight or rolls into tomorrow's Fajr; the policy is now a single value
/// that feeds every bounds computation, so the predicates can never diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// The final window is capped at 23:59:59 of its own day.
    CapAtMidnight,
    /// The final window extends to the next day's first point.
    ExtendToNextDay(NaiveTime),
}

impl Default for WindowPolicy {
    fn default() -> Self {
        WindowPolicy::CapAtMidnight
    }
}

/// The half-open interval `[start, end)` a point's action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Pure window derivation over a [`PrayerDay`].
///
/// Every predicate here is computed from the one bounds pair that
/// [`WindowEngine::window_bounds`] returns. No state, no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowEngine {
    policy: WindowPolicy,
}

impl WindowEngine {
    pub fn new(policy: WindowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Window boundaries for the point at `idx`.
    ///
    /// `start` is the point's own time composed with the set's day; `end` is
    /// the next point's composed time. The non-actionable point counts as a
    /// successor like any other, so a window's end is always its immediate
    /// neighbor's start. The last point ends per the configured policy.
    pub fn window_bounds(&self, day: &PrayerDay, idx: usize) -> Option<Window> {
        let point = day.points.get(idx)?;
        let start = clock::at(day.date, point.time);

        let end = match day.points.get(idx + 1) {
            Some(next) => clock::at(day.date, next.time),
            None => match self.policy {
                WindowPolicy::CapAtMidnight => clock::end_of_day(day.date),
                WindowPolicy::ExtendToNextDay(first_time) => match day.date.succ_opt() {
                    Some(tomorrow) => clock::at(tomorrow, first_time),
                    None => clock::end_of_day(day.date),
                },
            },
        };

        Some(Window { start, end })
    }

    pub fn window_for(&self, day: &PrayerDay, name: PrayerName) -> Option<Window> {
        self.window_bounds(day, day.index_of(name)?)
    }

    /// True iff `now` falls inside the point's window and the point is
    /// actionable. Sunrise never reports active; it only closes Fajr.
    pub fn is_active(&self, day: &PrayerDay, name: PrayerName, now: NaiveDateTime) -> bool {
        if !name.is_actionable() {
            return false;
        }
        self.window_for(day, name)
            .map(|w| w.contains(now))
            .unwrap_or(false)
    }

    /// True iff the point's window has closed. Uses the same `end` as
    /// [`is_active`], so the two can never contradict each other.
    pub fn has_window_ended(&self, day: &PrayerDay, name: PrayerName, now: NaiveDateTime) -> bool {
        self.window_for(day, name)
            .map(|w| now >= w.end)
            .unwrap_or(false)
    }

    /// Time-aware status for a point.
    ///
    /// Completed is sticky: once acknowledged, no amount of clock progress
    /// changes it. Otherwise a closed window means Missed and an open or
    /// future one means Upcoming. Active is not a status; derive it with
    /// [`is_active`].
    pub fn derive_status(
        &self,
        day: &PrayerDay,
        name: PrayerName,
        now: NaiveDateTime,
    ) -> Option<PrayerStatus> {
        let point = day.point(name)?;
        if point.status == PrayerStatus::Completed {
            return Some(PrayerStatus::Completed);
        }
        if self.has_window_ended(day, name, now) {
            return Some(PrayerStatus::Missed);
        }
        Some(PrayerStatus::Upcoming)
    }

    /// The first actionable point still stored as Upcoming, in list order,
    /// with its start instant.
    ///
    /// The start is returned even when it has already passed (the point is
    /// inside its own window); the countdown display wants the pending
    /// point, not the next strictly-future one. Returns None when nothing
    /// is left; rolling over to tomorrow is the caller's call.
    pub fn next_upcoming<'a>(&self, day: &'a PrayerDay) -> Option<(&'a TimePoint, NaiveDateTime)> {
        day.points
            .iter()
            .find(|p| p.name.is_actionable() && p.status == PrayerStatus::Upcoming)
            .map(|p| (p, clock::at(day.date, p.time)))
    }

    /// The point whose window contains `now`, if any. At most one exists:
    /// windows are adjacent and half-open.
    pub fn active_point<'a>(
        &self,
        day: &'a PrayerDay,
        now: NaiveDateTime,
    ) -> Option<&'a TimePoint> {
        day.points
            .iter()
            .find(|p| self.is_active(day, p.name, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> PrayerDay {
        PrayerDay::new(
            NaiveDate::from_ymd_opt(2025, 7, 24).unwrap(),
            vec![
                (PrayerName::Fajr, t(4, 30)),
                (PrayerName::Sunrise, t(6, 0)),
                (PrayerName::Dhuhr, t(13, 0)),
            ],
        )
    }

    fn at(day: &PrayerDay, h: u32, m: u32) -> NaiveDateTime {
        day.date.and_time(t(h, m))
    }

    #[test]
    fn bounds_come_from_adjacency() {
        let day = day();
        let engine = WindowEngine::default();

        let fajr = engine.window_for(&day, PrayerName::Fajr).unwrap();
        assert_eq!(fajr.start, at(&day, 4, 30));
        assert_eq!(fajr.end, at(&day, 6, 0)); // Sunrise closes Fajr

        let sunrise = engine.window_for(&day, PrayerName::Sunrise).unwrap();
        assert_eq!(sunrise.end, at(&day, 13, 0));
    }

    #[test]
    fn last_window_capped_at_end_of_day() {
        let day = day();
        let engine = WindowEngine::new(WindowPolicy::CapAtMidnight);
        let dhuhr = engine.window_for(&day, PrayerName::Dhuhr).unwrap();
        assert_eq!(dhuhr.end, day.date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));
    }

    #[test]
    fn last_window_extends_to_next_day_when_configured() {
        let day = day();
        let engine = WindowEngine::new(WindowPolicy::ExtendToNextDay(t(4, 31)));
        let dhuhr = engine.window_for(&day, PrayerName::Dhuhr).unwrap();
        assert_eq!(dhuhr.end, day.date.succ_opt().unwrap().and_time(t(4, 31)));

        // The same policy feeds the predicates: 23:59 is still inside.
        let late = day.date.and_time(NaiveTime::from_hms_opt(23, 59, 30).unwrap());
        assert!(engine.is_active(&day, PrayerName::Dhuhr, late));
        assert!(!engine.has_window_ended(&day, PrayerName::Dhuhr, late));
    }

    #[test]
    fn fajr_active_at_five() {
        let day = day();
        let engine = WindowEngine::default();
        let now = at(&day, 5, 0);

        assert!(engine.is_active(&day, PrayerName::Fajr, now));
        assert!(!engine.has_window_ended(&day, PrayerName::Fajr, now));
        assert!(!engine.is_active(&day, PrayerName::Sunrise, now));
    }

    #[test]
    fn fajr_window_closed_at_six_thirty() {
        let day = day();
        let engine = WindowEngine::default();
        let now = at(&day, 6, 30);

        assert!(engine.has_window_ended(&day, PrayerName::Fajr, now));
        assert_eq!(
            engine.derive_status(&day, PrayerName::Fajr, now),
            Some(PrayerStatus::Missed)
        );
        // Sunrise is never active, even inside its own bounds.
        assert!(!engine.is_active(&day, PrayerName::Sunrise, now));
    }

    #[test]
    fn active_and_ended_are_mutually_exclusive() {
        let day = day();
        let engine = WindowEngine::default();
        // Sweep the whole day in 10-minute steps.
        for minutes in (0..24 * 60).step_by(10) {
            let now = day.date.and_time(t(minutes / 60, minutes % 60));
            for point in &day.points {
                let active = engine.is_active(&day, point.name, now);
                let ended = engine.has_window_ended(&day, point.name, now);
                assert!(!(active && ended), "{} at {}", point.name, now);
            }
        }
    }

    #[test]
    fn at_most_one_point_active() {
        let day = day();
        let engine = WindowEngine::default();
        for minutes in (0..24 * 60).step_by(7) {
            let now = day.date.and_time(t(minutes / 60, minutes % 60));
            let actives = day
                .points
                .iter()
                .filter(|p| engine.is_active(&day, p.name, now))
                .count();
            assert!(actives <= 1, "{} active at {}", actives, now);
        }
    }

    #[test]
    fn window_end_is_monotonic() {
        let day = day();
        let engine = WindowEngine::default();
        let mut ended_since: Option<NaiveDateTime> = None;
        for minutes in 0..24 * 60 {
            let now = day.date.and_time(t(minutes / 60, minutes % 60));
            let ended = engine.has_window_ended(&day, PrayerName::Fajr, now);
            if let Some(first) = ended_since {
                assert!(ended, "ended at {} but not at {}", first, now);
            } else if ended {
                ended_since = Some(now);
            }
        }
        assert!(ended_since.is_some());
    }

    #[test]
    fn completed_is_sticky() {
        let mut day = day();
        let engine = WindowEngine::default();
        day.point_mut(PrayerName::Fajr).unwrap().status = PrayerStatus::Completed;

        for (h, m) in [(4, 0), (5, 0), (6, 30), (23, 59)] {
            assert_eq!(
                engine.derive_status(&day, PrayerName::Fajr, at(&day, h, m)),
                Some(PrayerStatus::Completed)
            );
        }
    }

    #[test]
    fn next_upcoming_returns_pending_point_even_mid_window() {
        let day = day();
        let engine = WindowEngine::default();

        // Fajr still Upcoming while inside its own window: its own start is
        // the pending instant.
        let (point, instant) = engine.next_upcoming(&day).unwrap();
        assert_eq!(point.name, PrayerName::Fajr);
        assert_eq!(instant, at(&day, 4, 30));
    }

    #[test]
    fn next_upcoming_skips_sunrise_and_non_upcoming() {
        let mut day = day();
        let engine = WindowEngine::default();
        day.point_mut(PrayerName::Fajr).unwrap().status = PrayerStatus::Completed;

        let (point, instant) = engine.next_upcoming(&day).unwrap();
        assert_eq!(point.name, PrayerName::Dhuhr);
        assert_eq!(instant, at(&day, 13, 0));

        day.point_mut(PrayerName::Dhuhr).unwrap().status = PrayerStatus::Missed;
        assert!(engine.next_upcoming(&day).is_none());
    }

    #[test]
    fn empty_day_answers_nothing() {
        let day = PrayerDay::new(NaiveDate::from_ymd_opt(2025, 7, 24).unwrap(), vec![]);
        let engine = WindowEngine::default();
        let now = day.date.and_time(t(12, 0));

        assert!(engine.window_bounds(&day, 0).is_none());
        assert!(!engine.is_active(&day, PrayerName::Fajr, now));
        assert!(!engine.has_window_ended(&day, PrayerName::Fajr, now));
        assert!(engine.derive_status(&day, PrayerName::Fajr, now).is_none());
        assert!(engine.next_upcoming(&day).is_none());
        assert!(engine.active_point(&day, now).is_none());
    }

    #[test]
    fn single_point_uses_end_of_day() {
        let day = PrayerDay::new(
            NaiveDate::from_ymd_opt(2025, 7, 24).unwrap(),
            vec![(PrayerName::Fajr, t(4, 30))],
        );
        let engine = WindowEngine::default();
        let w = engine.window_for(&day, PrayerName::Fajr).unwrap();
        assert_eq!(w.end, clock::end_of_day(day.date));
        assert!(engine.is_active(&day, PrayerName::Fajr, at(&day, 22, 0)));
    }

    #[test]
    fn active_point_finds_the_open_window() {
        let day = day();
        let engine = WindowEngine::default();
        assert_eq!(
            engine.active_point(&day, at(&day, 5, 0)).map(|p| p.name),
            Some(PrayerName::Fajr)
        );
        // Between sunrise and dhuhr no actionable window is open.
        assert!(engine.active_point(&day, at(&day, 7, 0)).is_none());
        assert_eq!(
            engine.active_point(&day, at(&day, 14, 0)).map(|p| p.name),
            Some(PrayerName::Dhuhr)
        );
    }
}
