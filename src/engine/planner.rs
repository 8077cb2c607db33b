use chrono::{Duration, NaiveDateTime};

use crate::engine::window::WindowEngine;
use crate::models::{PrayerDay, PrayerName, PrayerStatus};

/// Follow-up spacing below one minute is treated as one minute.
pub const MIN_INTERVAL_MINUTES: u32 = 1;

/// The pre-computed alert schedule for one window.
///
/// Every instant is enumerated up front so delivery can be registered in
/// advance and survive the host process dying; the plan is recomputed
/// whenever the window opens, the interval setting changes, or a refresh
/// lands, and dropped wholesale once the owner leaves Upcoming.
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderPlan {
    pub owner: PrayerName,
    /// The single opening alert at window start, absent when the start has
    /// already passed at planning time. No retroactive alerts.
    pub primary: Option<NaiveDateTime>,
    /// Follow-up instants, strictly increasing, all within
    /// `[start + interval, end)`.
    pub follow_ups: Vec<NaiveDateTime>,
}

impl ReminderPlan {
    /// Every instant of the plan still strictly in the future.
    pub fn outstanding(&self, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        self.primary
            .into_iter()
            .chain(self.follow_ups.iter().copied())
            .filter(|t| *t > now)
            .collect()
    }
}

/// Result of a full [`ReminderPlanner::replan`] pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Replan {
    /// Owners whose outstanding alerts must be revoked before anything new
    /// is registered. Always the complete set of names, so the pass is total.
    pub cancellations: Vec<PrayerName>,
    pub plans: Vec<ReminderPlan>,
}

/// Translates window facts into concrete alert instants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReminderPlanner {
    engine: WindowEngine,
}

impl ReminderPlanner {
    pub fn new(engine: WindowEngine) -> Self {
        Self { engine }
    }

    /// The opening alert: fires exactly at window start, suppressed when the
    /// start is not in the future relative to planning time.
    pub fn plan_primary(
        &self,
        day: &PrayerDay,
        name: PrayerName,
        now: NaiveDateTime,
    ) -> Option<NaiveDateTime> {
        if !name.is_actionable() {
            return None;
        }
        let window = self.engine.window_for(day, name)?;
        (window.start > now).then_some(window.start)
    }

    /// Enumerate `start + k * interval` for `k = 1, 2, ...` while inside the
    /// window. An interval spanning the whole window yields nothing. An
    /// instant colliding with the window start itself is dropped: the
    /// primary alert takes precedence over a coincident follow-up.
    pub fn plan_follow_ups(
        &self,
        day: &PrayerDay,
        name: PrayerName,
        interval_minutes: u32,
    ) -> Vec<NaiveDateTime> {
        if !name.is_actionable() {
            return Vec::new();
        }
        let Some(window) = self.engine.window_for(day, name) else {
            return Vec::new();
        };

        let interval = Duration::minutes(interval_minutes.max(MIN_INTERVAL_MINUTES) as i64);
        let mut instants = Vec::new();
        let mut next = window.start + interval;
        while next < window.end {
            if next != window.start {
                instants.push(next);
            }
            next += interval;
        }
        instants
    }

    /// Full plan for one window.
    pub fn plan(
        &self,
        day: &PrayerDay,
        name: PrayerName,
        interval_minutes: u32,
        now: NaiveDateTime,
    ) -> ReminderPlan {
        ReminderPlan {
            owner: name,
            primary: self.plan_primary(day, name, now),
            follow_ups: self.plan_follow_ups(day, name, interval_minutes),
        }
    }

    /// Instants to revoke when a window's status leaves Upcoming: everything
    /// in the plan still pending, the unfired primary included.
    pub fn cancel(&self, plan: &ReminderPlan, now: NaiveDateTime) -> Vec<NaiveDateTime> {
        plan.outstanding(now)
    }

    /// Cancel everything outstanding, then plan afresh for every actionable
    /// point whose derived status is still Upcoming.
    ///
    /// Pure over its inputs: calling it twice with the same day, interval,
    /// and instant yields the identical schedule, so the caller can apply it
    /// on any trigger without double-registering alerts.
    pub fn replan(
        &self,
        day: &PrayerDay,
        interval_minutes: u32,
        now: NaiveDateTime,
    ) -> Replan {
        let cancellations = day.points.iter().map(|p| p.name).collect();

        let plans = day
            .points
            .iter()
            .filter(|p| p.name.is_actionable())
            .filter(|p| {
                self.engine.derive_status(day, p.name, now) == Some(PrayerStatus::Upcoming)
            })
            .map(|p| self.plan(day, p.name, interval_minutes, now))
            .collect();

        Replan {
            cancellations,
            plans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::window::WindowPolicy;
    use chrono::{NaiveDate, NaiveTime};

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
                (PrayerName::Asr, t(17, 0)),
            ],
        )
    }

    fn planner() -> ReminderPlanner {
        ReminderPlanner::new(WindowEngine::new(WindowPolicy::CapAtMidnight))
    }

    fn at(day: &PrayerDay, h: u32, m: u32) -> NaiveDateTime {
        day.date.and_time(t(h, m))
    }

    #[test]
    fn follow_ups_fill_the_window() {
        let day = day();
        // Dhuhr runs 13:00 to 17:00; every 10 minutes starting 13:10.
        let instants = planner().plan_follow_ups(&day, PrayerName::Dhuhr, 10);

        // 240-minute window at 10-minute spacing: 13:10 through 16:50.
        assert_eq!(instants.len(), 23);
        assert_eq!(instants.first().copied(), Some(at(&day, 13, 10)));
        assert_eq!(instants.last().copied(), Some(at(&day, 16, 50)));
        assert!(instants.iter().all(|i| *i < at(&day, 17, 0)));
        assert!(instants.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn interval_spanning_window_yields_nothing() {
        let day = day();
        // Fajr window is 90 minutes.
        assert!(planner().plan_follow_ups(&day, PrayerName::Fajr, 90).is_empty());
        assert!(planner().plan_follow_ups(&day, PrayerName::Fajr, 240).is_empty());
    }

    #[test]
    fn zero_interval_is_clamped_not_rejected() {
        let day = day();
        let clamped = planner().plan_follow_ups(&day, PrayerName::Fajr, 0);
        let one = planner().plan_follow_ups(&day, PrayerName::Fajr, 1);
        assert_eq!(clamped, one);
        assert_eq!(clamped.len(), 89); // 04:31 ..= 05:59
    }

    #[test]
    fn sunrise_owns_no_plan() {
        let day = day();
        let p = planner();
        assert!(p.plan_follow_ups(&day, PrayerName::Sunrise, 10).is_empty());
        assert!(p.plan_primary(&day, PrayerName::Sunrise, at(&day, 0, 0)).is_none());
    }

    #[test]
    fn primary_fires_at_start_only_in_the_future() {
        let day = day();
        let p = planner();
        assert_eq!(
            p.plan_primary(&day, PrayerName::Dhuhr, at(&day, 12, 0)),
            Some(at(&day, 13, 0))
        );
        // Exactly at start or later: suppressed, no retroactive alert.
        assert!(p.plan_primary(&day, PrayerName::Dhuhr, at(&day, 13, 0)).is_none());
        assert!(p.plan_primary(&day, PrayerName::Dhuhr, at(&day, 13, 5)).is_none());
    }

    #[test]
    fn cancel_returns_only_outstanding_instants() {
        let day = day();
        let p = planner();
        // Planned before the window opened, acknowledged at 13:15.
        let plan = p.plan(&day, PrayerName::Dhuhr, 10, at(&day, 12, 0));
        let revoked = p.cancel(&plan, at(&day, 13, 15));

        // 13:00 primary and the 13:10 follow-up already fired; everything
        // later is revoked.
        assert_eq!(revoked.first().copied(), Some(at(&day, 13, 20)));
        assert_eq!(revoked.len(), 22);
        assert!(revoked.iter().all(|i| *i > at(&day, 13, 15)));
    }

    #[test]
    fn replan_covers_only_upcoming_points() {
        let mut day = day();
        day.point_mut(PrayerName::Fajr).unwrap().status = PrayerStatus::Completed;
        let p = planner();

        // 07:00: Fajr completed, Dhuhr and Asr still ahead.
        let replan = p.replan(&day, 10, at(&day, 7, 0));

        assert_eq!(replan.cancellations.len(), day.points.len());
        let owners: Vec<PrayerName> = replan.plans.iter().map(|pl| pl.owner).collect();
        assert_eq!(owners, vec![PrayerName::Dhuhr, PrayerName::Asr]);
    }

    #[test]
    fn replan_skips_windows_already_ended() {
        let day = day();
        let p = planner();
        // 14:00: Fajr's window ended (derived Missed even though stored
        // Upcoming), Dhuhr open, Asr ahead.
        let replan = p.replan(&day, 10, at(&day, 14, 0));
        let owners: Vec<PrayerName> = replan.plans.iter().map(|pl| pl.owner).collect();
        assert_eq!(owners, vec![PrayerName::Dhuhr, PrayerName::Asr]);
    }

    #[test]
    fn replan_is_idempotent() {
        let day = day();
        let p = planner();
        let now = at(&day, 12, 0);
        assert_eq!(p.replan(&day, 10, now), p.replan(&day, 10, now));
    }

    #[test]
    fn mid_window_plan_keeps_full_enumeration_but_outstanding_trims_it() {
        let day = day();
        let p = planner();
        let now = at(&day, 13, 25);
        let plan = p.plan(&day, PrayerName::Dhuhr, 10, now);

        assert!(plan.primary.is_none());
        assert_eq!(plan.follow_ups.len(), 23); // full window, by contract
        let future = plan.outstanding(now);
        assert_eq!(future.first().copied(), Some(at(&day, 13, 30)));
    }
}
