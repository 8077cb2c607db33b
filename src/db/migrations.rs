use anyhow::Result;
use rusqlite::Connection;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch("
        CREATE TABLE IF NOT EXISTS prayers (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            prayer_name  TEXT NOT NULL CHECK(prayer_name IN ('fajr','sunrise','dhuhr','asr','maghrib','isha')),
            date         TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'upcoming'
                         CHECK(status IN ('upcoming','completed','missed')),
            created_at   TEXT DEFAULT (datetime('now')),
            UNIQUE(prayer_name, date)
        );

        CREATE TABLE IF NOT EXISTS prayer_times_cache (
            date     TEXT PRIMARY KEY,
            fajr     TEXT,
            sunrise  TEXT,
            dhuhr    TEXT,
            asr      TEXT,
            maghrib  TEXT,
            isha     TEXT
        );

        CREATE TABLE IF NOT EXISTS app_meta (
            key   TEXT PRIMARY KEY,
            value TEXT
        );
    ")?;
    Ok(())
}
