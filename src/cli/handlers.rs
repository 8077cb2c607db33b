use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::str::FromStr;

use crate::cli::args::RemindCommands;
use crate::config::AppConfig;
use crate::db::repository::{CacheRepo, MetaRepo, PrayerDayRepo, date_key, window_policy};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::planner::ReminderPlanner;
use crate::engine::window::WindowEngine;
use crate::models::{PrayerDay, PrayerName, PrayerStatus};
use crate::provider::{ProviderError, SalahProvider};
use crate::utils::format::{format_duration_secs, format_time};

// ─── ANSI helpers ────────────────────────────────────────────────────────────

macro_rules! println_colored {
    ($color:expr, $($arg:tt)*) => {{
        print!("{}", $color);
        print!($($arg)*);
        println!("\x1b[0m");
    }};
}

const GREEN: &str = "\x1b[32m";
const AMBER: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GOLD: &str = "\x1b[38;2;196;160;68m";

// ─── Shared glue ─────────────────────────────────────────────────────────────

fn load_today(conn: &Connection, config: &AppConfig, today: NaiveDate) -> Result<PrayerDay> {
    let provider = SalahProvider::from_config(&config.salah)?;
    CacheRepo::get_or_fetch(conn, &provider, today)?;
    Ok(PrayerDayRepo::load_day(conn, today)?.ok_or(ProviderError::NoData(today))?)
}

fn engine_for(conn: &Connection, config: &AppConfig, today: NaiveDate) -> WindowEngine {
    WindowEngine::new(window_policy(
        conn,
        config.reminders.extend_past_midnight,
        today,
    ))
}

// ─── Setup wizard ────────────────────────────────────────────────────────────

pub fn handle_setup(conn: &Connection, config: &mut AppConfig, reset: bool) -> Result<()> {
    if !reset {
        if let Some(done) = MetaRepo::get(conn, "setup_done")? {
            if done == "1" {
                println!("Tanbih is already configured. Use --reset to reconfigure.");
                return Ok(());
            }
        }
    }
    crate::cli::setup_tui::run_setup_tui(conn, config)
}

// ─── Times ───────────────────────────────────────────────────────────────────

pub fn handle_times(conn: &Connection, config: &AppConfig) -> Result<()> {
    let now = SystemClock.now();
    let today = now.date();
    let day = load_today(conn, config, today)?;
    let engine = engine_for(conn, config, today);

    println!();
    println_colored!(
        GOLD,
        "  Prayer Times — {} ({})",
        config.salah.location_name,
        date_key(today)
    );
    println!();

    for point in &day.points {
        let time_str = format_time(point.time);
        let derived = engine
            .derive_status(&day, point.name, now)
            .unwrap_or(PrayerStatus::Upcoming);

        if engine.is_active(&day, point.name, now) {
            println_colored!(
                AMBER,
                "  {:<10}  {}   ● open now",
                point.name.display_name(),
                time_str
            );
        } else if !point.name.is_actionable() {
            println_colored!(DIM, "  {:<10}  {}", point.name.display_name(), time_str);
        } else {
            match derived {
                PrayerStatus::Completed => println_colored!(
                    GREEN,
                    "  {:<10}  {}   ✓ prayed",
                    point.name.display_name(),
                    time_str
                ),
                PrayerStatus::Missed => println_colored!(
                    RED,
                    "  {:<10}  {}   ✗ missed",
                    point.name.display_name(),
                    time_str
                ),
                PrayerStatus::Upcoming => println_colored!(
                    BOLD,
                    "  {:<10}  {}",
                    point.name.display_name(),
                    time_str
                ),
            }
        }
    }

    if let Some((point, instant)) = engine.next_upcoming(&day) {
        let secs = (instant - now).num_seconds();
        println!();
        println_colored!(
            AMBER,
            "  Next: {} in {}",
            point.name.display_name(),
            format_duration_secs(secs)
        );
    }
    println!();
    Ok(())
}

// ─── Next ────────────────────────────────────────────────────────────────────

pub fn handle_next(conn: &Connection, config: &AppConfig) -> Result<()> {
    let now = SystemClock.now();
    let today = now.date();
    let day = load_today(conn, config, today)?;
    let engine = engine_for(conn, config, today);

    match engine.next_upcoming(&day) {
        Some((point, instant)) => {
            let secs = (instant - now).num_seconds();
            println_colored!(
                AMBER,
                "  {} in {}  ({})",
                point.name.display_name(),
                format_duration_secs(secs),
                format_time(point.time)
            );
        }
        None => {
            // Nothing pending today; roll the countdown over to tomorrow.
            let tomorrow = today
                .succ_opt()
                .ok_or_else(|| anyhow!("Calendar overflow"))?;
            let provider = SalahProvider::from_config(&config.salah)?;
            let times = CacheRepo::get_or_fetch(conn, &provider, tomorrow)?;
            match times.first() {
                Some((name, time)) => {
                    let secs = (tomorrow.and_time(*time) - now).num_seconds();
                    println_colored!(
                        AMBER,
                        "  {} (tomorrow) in {}  ({})",
                        name.display_name(),
                        format_duration_secs(secs),
                        format_time(*time)
                    );
                }
                None => println_colored!(DIM, "  No prayer times available"),
            }
        }
    }
    Ok(())
}

// ─── Mark (acknowledge) ──────────────────────────────────────────────────────

pub fn handle_mark(conn: &Connection, config: &AppConfig, prayer_str: &str) -> Result<()> {
    let name = PrayerName::from_str(prayer_str)
        .map_err(|_| anyhow!("Unknown prayer '{}'. Use: fajr, dhuhr, asr, maghrib, isha", prayer_str))?;
    if !name.is_actionable() {
        return Err(anyhow!("{} is not a prayer and cannot be marked", name.display_name()));
    }

    let today = SystemClock.today();
    let day = load_today(conn, config, today)?;
    let stored = day
        .point(name)
        .map(|p| p.status)
        .ok_or_else(|| anyhow!("{} is not in today's set", name.display_name()))?;

    match stored {
        PrayerStatus::Completed => {
            println_colored!(DIM, "  {} is already marked as prayed", name.display_name());
        }
        PrayerStatus::Upcoming | PrayerStatus::Missed => {
            PrayerDayRepo::mark_status(conn, name, &date_key(today), PrayerStatus::Completed)?;
            println_colored!(GREEN, "  ✓ {} marked as prayed", name.display_name());
        }
    }
    Ok(())
}

// ─── Alerts ──────────────────────────────────────────────────────────────────

pub fn handle_alerts(conn: &Connection, config: &AppConfig) -> Result<()> {
    let now = SystemClock.now();
    let today = now.date();
    let day = load_today(conn, config, today)?;
    let engine = engine_for(conn, config, today);
    let planner = ReminderPlanner::new(engine);

    let replan = planner.replan(&day, config.reminders.interval_minutes, now);

    println!();
    println_colored!(GOLD, "  Alert schedule for {}", date_key(today));
    if !config.reminders.enabled {
        println_colored!(DIM, "  (follow-up reminders are off; openings only)");
    }
    println!();

    let mut any = false;
    for plan in &replan.plans {
        let outstanding: Vec<_> = plan
            .outstanding(now)
            .into_iter()
            .filter(|t| config.reminders.enabled || plan.primary == Some(*t))
            .collect();
        if outstanding.is_empty() {
            continue;
        }
        any = true;

        println_colored!(BOLD, "  {}", plan.owner.display_name());
        if let Some(primary) = plan.primary {
            if primary > now {
                println_colored!(GREEN, "    opening    {}", format_time(primary.time()));
            }
        }
        if config.reminders.enabled {
            let follow_ups: Vec<_> = plan.follow_ups.iter().filter(|t| **t > now).collect();
            if !follow_ups.is_empty() {
                let preview: Vec<String> = follow_ups
                    .iter()
                    .take(3)
                    .map(|t| format_time(t.time()))
                    .collect();
                let suffix = if follow_ups.len() > 3 {
                    format!(" … ({} total)", follow_ups.len())
                } else {
                    String::new()
                };
                println_colored!(
                    DIM,
                    "    follow-ups every {}m: {}{}",
                    config.reminders.interval_minutes.max(1),
                    preview.join(", "),
                    suffix
                );
            }
        }
    }

    if !any {
        println_colored!(DIM, "  Nothing pending — all prayers settled for today");
    }
    println!();
    Ok(())
}

// ─── History ─────────────────────────────────────────────────────────────────

pub fn handle_history(conn: &Connection) -> Result<()> {
    let days = PrayerDayRepo::load_all(conn)?;
    let today = SystemClock.today();

    // Only days the user has actually lived through.
    let past: Vec<_> = days.into_iter().filter(|d| d.date <= today).collect();

    println!();
    if past.is_empty() {
        println_colored!(DIM, "  No history recorded yet");
        println!();
        return Ok(());
    }

    println_colored!(GOLD, "  Prayer History");
    println!();
    for day in past.iter().rev().take(14) {
        let actionable: Vec<_> = day
            .points
            .iter()
            .filter(|p| p.name.is_actionable())
            .collect();
        let prayed = actionable
            .iter()
            .filter(|p| p.status == PrayerStatus::Completed)
            .count();
        let bar: String = actionable
            .iter()
            .map(|p| match p.status {
                PrayerStatus::Completed => '█',
                PrayerStatus::Missed => '░',
                PrayerStatus::Upcoming => '·',
            })
            .collect();
        if prayed == actionable.len() && !actionable.is_empty() {
            println_colored!(GREEN, "  {}  {}  {}/{}", date_key(day.date), bar, prayed, actionable.len());
        } else {
            println_colored!(DIM, "  {}  {}  {}/{}", date_key(day.date), bar, prayed, actionable.len());
        }
    }
    println!();
    Ok(())
}

// ─── Reminder settings ───────────────────────────────────────────────────────

pub fn handle_remind(config: &mut AppConfig, action: &RemindCommands) -> Result<()> {
    match action {
        RemindCommands::Interval { minutes } => {
            let clamped = (*minutes).max(1);
            config.reminders.interval_minutes = clamped;
            config.save()?;
            println_colored!(GREEN, "  ✓ Follow-up interval set to {} minutes", clamped);
        }
        RemindCommands::On => {
            config.reminders.enabled = true;
            config.save()?;
            println_colored!(GREEN, "  ✓ Follow-up reminders on");
        }
        RemindCommands::Off => {
            config.reminders.enabled = false;
            config.save()?;
            println_colored!(AMBER, "  Follow-up reminders off (openings stay on)");
        }
        RemindCommands::Status => {
            let state = if config.reminders.enabled { "on" } else { "off" };
            println!("  reminders:           {}", state);
            println!("  interval:            {} minutes", config.reminders.interval_minutes);
            println!(
                "  extend past midnight: {}",
                if config.reminders.extend_past_midnight { "yes" } else { "no" }
            );
        }
    }
    Ok(())
}
