use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::PrayerName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Fires once, exactly when a window opens.
    Opening,
    /// Repeats inside an open window until the prayer is acknowledged.
    FollowUp,
}

/// What a scheduled alert says when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub kind: AlertKind,
    pub prayer: PrayerName,
    pub body: String,
}

impl AlertPayload {
    pub fn opening(prayer: PrayerName) -> Self {
        Self {
            kind: AlertKind::Opening,
            prayer,
            body: format!("It's time for {}.", prayer.display_name()),
        }
    }

    pub fn follow_up(prayer: PrayerName) -> Self {
        Self {
            kind: AlertKind::FollowUp,
            prayer,
            body: format!("Have you prayed {} yet?", prayer.display_name()),
        }
    }
}

/// Where the planner registers and revokes alert instants.
///
/// The owner key groups every alert of one window (its opening and all its
/// follow-ups), so acknowledgment can revoke the whole set in one call.
/// Implementations decide delivery; the engine only decides what and when.
pub trait AlertSink {
    fn schedule(&mut self, instant: NaiveDateTime, payload: AlertPayload, owner: &str);

    /// Remove every pending alert registered under `owner`.
    fn cancel_owner(&mut self, owner: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAlert {
    pub instant: NaiveDateTime,
    pub payload: AlertPayload,
    pub owner: String,
}

/// In-process sink: an ordered pending queue the dashboard drains each tick.
#[derive(Debug, Default)]
pub struct MemorySink {
    pending: Vec<ScheduledAlert>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts whose instant has arrived, removed from the queue in firing
    /// order. The caller delivers them however it likes.
    pub fn drain_due(&mut self, now: NaiveDateTime) -> Vec<ScheduledAlert> {
        let mut due: Vec<ScheduledAlert> = Vec::new();
        self.pending.retain(|a| {
            if a.instant <= now {
                due.push(a.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|a| a.instant);
        due
    }

    pub fn pending(&self) -> &[ScheduledAlert] {
        &self.pending
    }

    pub fn pending_for(&self, owner: &str) -> usize {
        self.pending.iter().filter(|a| a.owner == owner).count()
    }
}

impl AlertSink for MemorySink {
    fn schedule(&mut self, instant: NaiveDateTime, payload: AlertPayload, owner: &str) {
        log::debug!(
            "schedule {} @ {}: {}",
            owner,
            instant,
            serde_json::to_string(&payload).unwrap_or_default()
        );
        self.pending.push(ScheduledAlert {
            instant,
            payload,
            owner: owner.to_string(),
        });
        self.pending.sort_by_key(|a| a.instant);
    }

    fn cancel_owner(&mut self, owner: &str) {
        let before = self.pending.len();
        self.pending.retain(|a| a.owner != owner);
        let removed = before - self.pending.len();
        if removed > 0 {
            log::debug!("cancelled {} pending alerts for {}", removed, owner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 24)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    #[test]
    fn drain_due_fires_in_order_and_removes() {
        let mut sink = MemorySink::new();
        sink.schedule(at(13, 20), AlertPayload::follow_up(PrayerName::Dhuhr), "dhuhr");
        sink.schedule(at(13, 0), AlertPayload::opening(PrayerName::Dhuhr), "dhuhr");
        sink.schedule(at(13, 10), AlertPayload::follow_up(PrayerName::Dhuhr), "dhuhr");

        let due = sink.drain_due(at(13, 10));
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].instant, at(13, 0));
        assert_eq!(due[0].payload.kind, AlertKind::Opening);
        assert_eq!(due[1].instant, at(13, 10));
        assert_eq!(sink.pending().len(), 1);
    }

    #[test]
    fn cancel_owner_removes_only_that_window() {
        let mut sink = MemorySink::new();
        sink.schedule(at(13, 10), AlertPayload::follow_up(PrayerName::Dhuhr), "dhuhr");
        sink.schedule(at(17, 10), AlertPayload::follow_up(PrayerName::Asr), "asr");

        sink.cancel_owner("dhuhr");
        assert_eq!(sink.pending_for("dhuhr"), 0);
        assert_eq!(sink.pending_for("asr"), 1);
    }

    #[test]
    fn cancelled_alerts_never_fire() {
        let mut sink = MemorySink::new();
        sink.schedule(at(13, 10), AlertPayload::follow_up(PrayerName::Dhuhr), "dhuhr");
        sink.cancel_owner("dhuhr");
        assert!(sink.drain_due(at(23, 59)).is_empty());
    }
}
