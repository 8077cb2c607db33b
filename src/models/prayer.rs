use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerName {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl PrayerName {
    /// All named points of a day, in chronological order. Order matters:
    /// each point's window ends where the next one starts.
    pub fn all() -> Vec<PrayerName> {
        vec![
            PrayerName::Fajr,
            PrayerName::Sunrise,
            PrayerName::Dhuhr,
            PrayerName::Asr,
            PrayerName::Maghrib,
            PrayerName::Isha,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "fajr",
            PrayerName::Sunrise => "sunrise",
            PrayerName::Dhuhr => "dhuhr",
            PrayerName::Asr => "asr",
            PrayerName::Maghrib => "maghrib",
            PrayerName::Isha => "isha",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PrayerName::Fajr => "Fajr",
            PrayerName::Sunrise => "Sunrise",
            PrayerName::Dhuhr => "Dhuhr",
            PrayerName::Asr => "Asr",
            PrayerName::Maghrib => "Maghrib",
            PrayerName::Isha => "Isha",
        }
    }

    /// Sunrise marks the end of the Fajr window but is not itself a prayer:
    /// it cannot be acknowledged and never owns reminders.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, PrayerName::Sunrise)
    }
}

impl std::fmt::Display for PrayerName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PrayerName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fajr" => Ok(PrayerName::Fajr),
            "sunrise" => Ok(PrayerName::Sunrise),
            "dhuhr" | "zuhr" | "dhuhur" => Ok(PrayerName::Dhuhr),
            "asr" => Ok(PrayerName::Asr),
            "maghrib" => Ok(PrayerName::Maghrib),
            "isha" => Ok(PrayerName::Isha),
            _ => Err(anyhow::anyhow!("Unknown prayer name: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerStatus {
    Upcoming,
    Completed,
    Missed,
}

impl PrayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrayerStatus::Upcoming => "upcoming",
            PrayerStatus::Completed => "completed",
            PrayerStatus::Missed => "missed",
        }
    }
}

impl FromStr for PrayerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(PrayerStatus::Upcoming),
            "completed" => Ok(PrayerStatus::Completed),
            "missed" => Ok(PrayerStatus::Missed),
            _ => Err(anyhow::anyhow!("Unknown prayer status: {}", s)),
        }
    }
}

/// One named time point of the day with its stored status.
///
/// "Active" is never stored here; it is derived from the window bounds and
/// the current instant by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub name: PrayerName,
    pub time: NaiveTime,
    pub status: PrayerStatus,
}

impl TimePoint {
    pub fn new(name: PrayerName, time: NaiveTime) -> Self {
        Self {
            name,
            time,
            status: PrayerStatus::Upcoming,
        }
    }
}

/// The ordered set of time points for one calendar day.
///
/// Insertion order is chronological order; window boundaries are defined by
/// adjacency, so the order of `points` is load-bearing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerDay {
    pub date: NaiveDate,
    pub points: Vec<TimePoint>,
}

impl PrayerDay {
    pub fn new(date: NaiveDate, times: Vec<(PrayerName, NaiveTime)>) -> Self {
        let points = times
            .into_iter()
            .map(|(name, time)| TimePoint::new(name, time))
            .collect();
        Self { date, points }
    }

    pub fn point(&self, name: PrayerName) -> Option<&TimePoint> {
        self.points.iter().find(|p| p.name == name)
    }

    pub fn point_mut(&mut self, name: PrayerName) -> Option<&mut TimePoint> {
        self.points.iter_mut().find(|p| p.name == name)
    }

    pub fn index_of(&self, name: PrayerName) -> Option<usize> {
        self.points.iter().position(|p| p.name == name)
    }

    /// Carry Completed forward from a previous snapshot of the same points.
    ///
    /// Applied when fresh times arrive for a day the user already interacted
    /// with: a point keeps its Completed status only if both its name and
    /// its time match, so a changed timetable resets the point.
    pub fn carry_completed(&mut self, previous: &PrayerDay) {
        for point in &mut self.points {
            let matched = previous
                .points
                .iter()
                .any(|old| old.name == point.name && old.time == point.time
                    && old.status == PrayerStatus::Completed);
            if matched {
                point.status = PrayerStatus::Completed;
            }
        }
    }
}
