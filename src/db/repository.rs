use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension, params};
use std::str::FromStr;

use crate::engine::clock::parse_clock_time;
use crate::engine::window::WindowPolicy;
use crate::models::{PrayerDay, PrayerName, PrayerStatus};
use crate::provider::TimeProvider;

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// The last-window policy for `today`: midnight cap unless configured to
/// extend and tomorrow's first point is already in the cache.
pub fn window_policy(conn: &Connection, extend_past_midnight: bool, today: NaiveDate) -> WindowPolicy {
    if !extend_past_midnight {
        return WindowPolicy::CapAtMidnight;
    }
    today
        .succ_opt()
        .and_then(|tomorrow| {
            CacheRepo::get_times_for_date(conn, &date_key(tomorrow))
                .ok()
                .flatten()
        })
        .and_then(|times| times.first().map(|(_, t)| *t))
        .map(WindowPolicy::ExtendToNextDay)
        .unwrap_or(WindowPolicy::CapAtMidnight)
}

// ─── Cached prayer times ────────────────────────────────────────────────────

pub struct CacheRepo;

impl CacheRepo {
    /// Cached times for a date, in chronological order.
    ///
    /// A single malformed HH:MM value drops that one point, never the rest
    /// of the set.
    pub fn get_times_for_date(
        conn: &Connection,
        date: &str,
    ) -> Result<Option<Vec<(PrayerName, NaiveTime)>>> {
        let row = conn
            .query_row(
                "SELECT fajr, sunrise, dhuhr, asr, maghrib, isha FROM prayer_times_cache WHERE date = ?1",
                params![date],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((fajr, sunrise, dhuhr, asr, maghrib, isha)) = row else {
            return Ok(None);
        };

        let raw = [
            (PrayerName::Fajr, fajr),
            (PrayerName::Sunrise, sunrise),
            (PrayerName::Dhuhr, dhuhr),
            (PrayerName::Asr, asr),
            (PrayerName::Maghrib, maghrib),
            (PrayerName::Isha, isha),
        ];

        let mut times = Vec::new();
        for (name, value) in raw {
            let Some(value) = value else { continue };
            match parse_clock_time(&value) {
                Ok(time) => times.push((name, time)),
                Err(e) => log::warn!("dropping cached {} for {}: {}", name, date, e),
            }
        }
        Ok(Some(times))
    }

    pub fn store_times(
        conn: &Connection,
        date: &str,
        times: &[(PrayerName, NaiveTime)],
    ) -> Result<()> {
        let find = |name: PrayerName| -> Option<String> {
            times
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, t)| t.format("%H:%M").to_string())
        };
        conn.execute(
            "INSERT OR REPLACE INTO prayer_times_cache (date, fajr, sunrise, dhuhr, asr, maghrib, isha)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                date,
                find(PrayerName::Fajr),
                find(PrayerName::Sunrise),
                find(PrayerName::Dhuhr),
                find(PrayerName::Asr),
                find(PrayerName::Maghrib),
                find(PrayerName::Isha),
            ],
        )?;
        Ok(())
    }

    pub fn clear_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM prayer_times_cache", [])?;
        Ok(())
    }

    /// Get times from cache, or ask the provider and cache the result.
    pub fn get_or_fetch(
        conn: &Connection,
        provider: &dyn TimeProvider,
        date: NaiveDate,
    ) -> Result<Vec<(PrayerName, NaiveTime)>> {
        let key = date_key(date);
        if let Some(cached) = Self::get_times_for_date(conn, &key)? {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }
        let times = provider.times_for(date)?;
        Self::store_times(conn, &key, &times)?;
        Ok(times)
    }

    /// Make sure today through `days_ahead` days are cached.
    pub fn ensure_cached(
        conn: &Connection,
        provider: &dyn TimeProvider,
        today: NaiveDate,
        days_ahead: u32,
    ) -> Result<()> {
        for i in 0..=(days_ahead as i64) {
            let date = today + Duration::days(i);
            Self::get_or_fetch(conn, provider, date)?;
        }
        Ok(())
    }
}

// ─── Daily snapshots ─────────────────────────────────────────────────────────

pub struct PrayerDayRepo;

impl PrayerDayRepo {
    /// Ensure a status row exists for each named point on the given date.
    pub fn ensure_rows(conn: &Connection, date: &str) -> Result<()> {
        for name in PrayerName::all() {
            conn.execute(
                "INSERT OR IGNORE INTO prayers (prayer_name, date, status)
                 VALUES (?1, ?2, 'upcoming')",
                params![name.as_str(), date],
            )?;
        }
        Ok(())
    }

    pub fn statuses_for(conn: &Connection, date: &str) -> Result<Vec<(PrayerName, PrayerStatus)>> {
        let mut stmt = conn.prepare(
            "SELECT prayer_name, status FROM prayers WHERE date = ?1",
        )?;
        let rows = stmt.query_map(params![date], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut result = Vec::new();
        for r in rows {
            let (name, status) = r?;
            result.push((
                PrayerName::from_str(&name)
                    .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?,
                PrayerStatus::from_str(&status)
                    .map_err(|e| rusqlite::Error::InvalidParameterName(e.to_string()))?,
            ));
        }
        Ok(result)
    }

    pub fn mark_status(
        conn: &Connection,
        name: PrayerName,
        date: &str,
        status: PrayerStatus,
    ) -> Result<()> {
        conn.execute(
            "UPDATE prayers SET status = ?1 WHERE prayer_name = ?2 AND date = ?3",
            params![status.as_str(), name.as_str(), date],
        )?;
        Ok(())
    }

    /// Write the whole day snapshot back.
    pub fn save_day(conn: &Connection, day: &PrayerDay) -> Result<()> {
        let date = date_key(day.date);
        for point in &day.points {
            conn.execute(
                "INSERT INTO prayers (prayer_name, date, status) VALUES (?1, ?2, ?3)
                 ON CONFLICT(prayer_name, date) DO UPDATE SET status = ?3",
                params![point.name.as_str(), date, point.status.as_str()],
            )?;
        }
        Ok(())
    }

    /// Assemble a day from cached times plus stored statuses. `None` when
    /// no times are cached for the date.
    pub fn load_day(conn: &Connection, date: NaiveDate) -> Result<Option<PrayerDay>> {
        let key = date_key(date);
        let Some(times) = CacheRepo::get_times_for_date(conn, &key)? else {
            return Ok(None);
        };

        Self::ensure_rows(conn, &key)?;
        let statuses = Self::statuses_for(conn, &key)?;

        let mut day = PrayerDay::new(date, times);
        for (name, status) in statuses {
            if let Some(point) = day.point_mut(name) {
                point.status = status;
            }
        }
        Ok(Some(day))
    }

    /// Every stored day, oldest first.
    pub fn load_all(conn: &Connection) -> Result<Vec<PrayerDay>> {
        let mut stmt = conn.prepare(
            "SELECT DISTINCT date FROM prayer_times_cache ORDER BY date",
        )?;
        let dates: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut days = Vec::new();
        for date_str in dates {
            let Ok(date) = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") else {
                log::warn!("skipping unparseable cache date '{}'", date_str);
                continue;
            };
            if let Some(day) = Self::load_day(conn, date)? {
                days.push(day);
            }
        }
        Ok(days)
    }
}

// ─── App meta ────────────────────────────────────────────────────────────────

pub struct MetaRepo;

impl MetaRepo {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.query_row(
            "SELECT value FROM app_meta WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(anyhow::Error::from)
    }

    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO app_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::run_migrations;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_times() -> Vec<(PrayerName, NaiveTime)> {
        vec![
            (PrayerName::Fajr, t(4, 30)),
            (PrayerName::Sunrise, t(6, 0)),
            (PrayerName::Dhuhr, t(13, 0)),
            (PrayerName::Asr, t(17, 0)),
            (PrayerName::Maghrib, t(19, 30)),
            (PrayerName::Isha, t(21, 0)),
        ]
    }

    #[test]
    fn day_snapshot_round_trips() {
        let conn = conn();
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        CacheRepo::store_times(&conn, &date_key(date), &sample_times()).unwrap();

        let mut day = PrayerDayRepo::load_day(&conn, date).unwrap().unwrap();
        assert_eq!(day.points.len(), 6);
        assert!(day.points.iter().all(|p| p.status == PrayerStatus::Upcoming));

        day.point_mut(PrayerName::Fajr).unwrap().status = PrayerStatus::Completed;
        day.point_mut(PrayerName::Dhuhr).unwrap().status = PrayerStatus::Missed;
        PrayerDayRepo::save_day(&conn, &day).unwrap();

        let reloaded = PrayerDayRepo::load_day(&conn, date).unwrap().unwrap();
        assert_eq!(reloaded, day);
    }

    #[test]
    fn malformed_cache_entry_drops_single_point() {
        let conn = conn();
        conn.execute(
            "INSERT INTO prayer_times_cache (date, fajr, sunrise, dhuhr, asr, maghrib, isha)
             VALUES ('2025-07-24', '04:30', 'dawnish', '13:00', '17:00', '19:30', '21:00')",
            [],
        )
        .unwrap();

        let times = CacheRepo::get_times_for_date(&conn, "2025-07-24")
            .unwrap()
            .unwrap();
        assert_eq!(times.len(), 5);
        assert!(!times.iter().any(|(n, _)| *n == PrayerName::Sunrise));
        assert!(times.iter().any(|(n, _)| *n == PrayerName::Fajr));
    }

    #[test]
    fn missing_date_loads_nothing() {
        let conn = conn();
        let date = NaiveDate::from_ymd_opt(2025, 7, 24).unwrap();
        assert!(PrayerDayRepo::load_day(&conn, date).unwrap().is_none());
    }

    #[test]
    fn load_all_is_ordered_by_day() {
        let conn = conn();
        for day in ["2025-07-26", "2025-07-24", "2025-07-25"] {
            CacheRepo::store_times(&conn, day, &sample_times()).unwrap();
        }
        let days = PrayerDayRepo::load_all(&conn).unwrap();
        let dates: Vec<String> = days.iter().map(|d| date_key(d.date)).collect();
        assert_eq!(dates, vec!["2025-07-24", "2025-07-25", "2025-07-26"]);
    }

    #[test]
    fn meta_round_trips() {
        let conn = conn();
        assert!(MetaRepo::get(&conn, "setup_done").unwrap().is_none());
        MetaRepo::set(&conn, "setup_done", "1").unwrap();
        assert_eq!(MetaRepo::get(&conn, "setup_done").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn migrations_are_idempotent_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tanbih.db");
        {
            let conn = Connection::open(&path).unwrap();
            run_migrations(&conn).unwrap();
            CacheRepo::store_times(&conn, "2025-07-24", &sample_times()).unwrap();
        }
        let conn = Connection::open(&path).unwrap();
        run_migrations(&conn).unwrap();
        assert!(
            CacheRepo::get_times_for_date(&conn, "2025-07-24")
                .unwrap()
                .is_some()
        );
    }
}
