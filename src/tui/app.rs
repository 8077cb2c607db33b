use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use crossterm::event::{KeyCode, KeyEventKind};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::repository::{CacheRepo, PrayerDayRepo, date_key, window_policy};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::runtime::{Effect, EngineEvent, Runtime};
use crate::engine::window::WindowPolicy;
use crate::models::PrayerStatus;
use crate::provider::SalahProvider;
use crate::sink::{MemorySink, ScheduledAlert};
use crate::tui::events::{Event, EventHandler};
use crate::tui::theme;
use crate::tui::widgets::next_prayer::NextInfo;
use crate::tui::widgets::{alerts, header, next_prayer, prayers, statusbar};
use crate::utils::hijri::today_hijri_string;

const RECENT_ALERTS_KEPT: usize = 16;

pub struct App {
    pub config: AppConfig,
    pub focus_idx: usize,
    pub should_quit: bool,
    pub show_help: bool,
    pub hijri_str: String,

    runtime: Runtime<MemorySink>,
    provider: Option<SalahProvider>,
    clock: SystemClock,
    recent_alerts: Vec<(NaiveDateTime, ScheduledAlert)>,
    next_info: Option<NextInfo>,
    bell_pending: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let provider = match SalahProvider::from_config(&config.salah) {
            Ok(p) => Some(p),
            Err(e) => {
                log::warn!("provider config invalid: {}", e);
                None
            }
        };
        let runtime = Runtime::new(
            WindowPolicy::CapAtMidnight,
            config.reminders.interval_minutes,
            config.reminders.enabled,
            MemorySink::new(),
        );
        let hijri_str = today_hijri_string(config.salah.hijri_offset);

        App {
            config,
            focus_idx: 0,
            should_quit: false,
            show_help: false,
            hijri_str,
            runtime,
            provider,
            clock: SystemClock,
            recent_alerts: Vec::new(),
            next_info: None,
            bell_pending: false,
        }
    }

    pub fn load(&mut self, conn: &Connection) {
        let now = self.clock.now();
        self.refetch(conn, now, now.date());
        self.refresh_next_info(conn, now);
    }

    /// One heartbeat: advance the engine, persist what it asks for, deliver
    /// whatever came due.
    pub fn tick(&mut self, conn: &Connection) {
        let now = self.clock.now();
        let effects = self.runtime.apply(now, EngineEvent::Tick);
        self.process_effects(conn, now, effects);

        let due = self.runtime.sink_mut().drain_due(now);
        if !due.is_empty() {
            self.bell_pending = true;
            for alert in due {
                self.recent_alerts.push((now, alert));
            }
            let overflow = self.recent_alerts.len().saturating_sub(RECENT_ALERTS_KEPT);
            if overflow > 0 {
                self.recent_alerts.drain(..overflow);
            }
        }

        self.hijri_str = today_hijri_string(self.config.salah.hijri_offset);
        self.refresh_next_info(conn, now);
    }

    /// True once per batch of fired alerts; the run loop rings the terminal
    /// bell when it sees it.
    pub fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell_pending)
    }

    // ── Data loading ─────────────────────────────────────────────────

    fn refetch(&mut self, conn: &Connection, now: NaiveDateTime, date: NaiveDate) {
        let loaded = match &self.provider {
            Some(provider) => {
                match CacheRepo::get_or_fetch(conn, provider, date) {
                    Ok(_) => {
                        // Warm tomorrow too: rollover and the past-midnight
                        // policy both want it.
                        if let Some(tomorrow) = date.succ_opt() {
                            if let Err(e) = CacheRepo::get_or_fetch(conn, provider, tomorrow) {
                                log::debug!("could not warm {}: {}", date_key(tomorrow), e);
                            }
                        }
                        PrayerDayRepo::load_day(conn, date).unwrap_or_else(|e| {
                            log::warn!("loading {} failed: {}", date_key(date), e);
                            None
                        })
                    }
                    Err(e) => {
                        log::warn!("fetching {} failed: {}", date_key(date), e);
                        None
                    }
                }
            }
            None => None,
        };

        match loaded {
            Some(day) => {
                let policy = window_policy(
                    conn,
                    self.config.reminders.extend_past_midnight,
                    date,
                );
                self.runtime.set_policy(policy, now);
                let effects = self.runtime.apply(now, EngineEvent::TimesLoaded(day));
                self.process_effects(conn, now, effects);
            }
            None => {
                self.runtime.apply(now, EngineEvent::TimesFailed);
            }
        }
    }

    fn process_effects(&mut self, conn: &Connection, now: NaiveDateTime, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Persist => {
                    if let Some(day) = self.runtime.day() {
                        if let Err(e) = PrayerDayRepo::save_day(conn, day) {
                            log::warn!("persisting day failed: {}", e);
                        }
                    }
                }
                Effect::RequestTimes { date } => self.refetch(conn, now, date),
            }
        }
    }

    fn refresh_next_info(&mut self, conn: &Connection, now: NaiveDateTime) {
        if let Some((point, instant)) = self.runtime.next_upcoming() {
            self.next_info = Some(NextInfo {
                name: point.name.display_name().to_string(),
                secs_until: (instant - now).num_seconds(),
                tomorrow: false,
            });
            return;
        }

        // Everything settled today: count down to tomorrow's first point.
        self.next_info = now.date().succ_opt().and_then(|tomorrow| {
            let times = CacheRepo::get_times_for_date(conn, &date_key(tomorrow))
                .ok()
                .flatten()?;
            let (name, time) = times.first().copied()?;
            Some(NextInfo {
                name: name.display_name().to_string(),
                secs_until: (tomorrow.and_time(time) - now).num_seconds(),
                tomorrow: true,
            })
        });
    }

    // ── Input ────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: crossterm::event::KeyEvent, conn: &Connection) {
        // Only handle actual key presses — ignore release/repeat events from some terminals
        if key.kind != KeyEventKind::Press {
            return;
        }

        if self.show_help {
            self.show_help = false;
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.should_quit = true;
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            KeyCode::Up => {
                if self.focus_idx > 0 {
                    self.focus_idx -= 1;
                }
            }
            KeyCode::Down => {
                let max = self
                    .runtime
                    .day()
                    .map(|d| d.points.len().saturating_sub(1))
                    .unwrap_or(0);
                if self.focus_idx < max {
                    self.focus_idx += 1;
                }
            }
            KeyCode::Char('m') | KeyCode::Enter => self.ack_focused(conn),
            KeyCode::Char('t') => self.toggle_reminders(conn),
            KeyCode::Char('+') | KeyCode::Char('=') => self.adjust_interval(conn, 1),
            KeyCode::Char('-') => self.adjust_interval(conn, -1),
            KeyCode::Char('r') => {
                let now = self.clock.now();
                self.refetch(conn, now, now.date());
                self.refresh_next_info(conn, now);
            }
            _ => {}
        }
    }

    fn ack_focused(&mut self, conn: &Connection) {
        let Some(name) = self
            .runtime
            .day()
            .and_then(|d| d.points.get(self.focus_idx))
            .map(|p| p.name)
        else {
            return;
        };
        let now = self.clock.now();
        let effects = self.runtime.apply(now, EngineEvent::Acknowledged(name));
        self.process_effects(conn, now, effects);
        self.refresh_next_info(conn, now);
    }

    fn toggle_reminders(&mut self, conn: &Connection) {
        let enabled = !self.runtime.reminders_enabled();
        self.config.reminders.enabled = enabled;
        if let Err(e) = self.config.save() {
            log::warn!("saving config failed: {}", e);
        }
        let now = self.clock.now();
        let effects = self.runtime.apply(now, EngineEvent::RemindersToggled(enabled));
        self.process_effects(conn, now, effects);
    }

    fn adjust_interval(&mut self, conn: &Connection, delta: i32) {
        let current = self.runtime.interval_minutes();
        let next = if delta < 0 {
            current.saturating_sub(1).max(1)
        } else {
            current.saturating_add(1)
        };
        if next == current {
            return;
        }
        self.config.reminders.interval_minutes = next;
        if let Err(e) = self.config.save() {
            log::warn!("saving config failed: {}", e);
        }
        let now = self.clock.now();
        let effects = self.runtime.apply(now, EngineEvent::IntervalChanged(next));
        self.process_effects(conn, now, effects);
    }

    // ── Drawing ──────────────────────────────────────────────────────

    pub fn draw(&self, frame: &mut Frame) {
        let now = self.clock.now();
        let area = frame.area();

        frame.render_widget(Block::default().style(theme::base()), area);

        let outer_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5), // header
                Constraint::Min(0),    // body
                Constraint::Length(1), // status bar
            ])
            .split(area);

        header::render(
            frame,
            outer_chunks[0],
            &self.hijri_str,
            &self.config.salah.location_name,
        );

        statusbar::render(
            frame,
            outer_chunks[2],
            self.runtime.load_failed(),
            self.runtime.reminders_enabled(),
            self.runtime.interval_minutes(),
        );

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(outer_chunks[1]);

        // Left column: prayer list + reminders
        let left_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8), // prayers
                Constraint::Min(0),    // reminders
            ])
            .split(columns[0]);

        prayers::render(
            frame,
            left_chunks[0],
            self.runtime.day(),
            self.runtime.engine(),
            now,
            self.focus_idx,
        );

        alerts::render(
            frame,
            left_chunks[1],
            &self.recent_alerts,
            self.runtime.sink().pending(),
        );

        // Right column: countdown + today's tally
        let right_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(9), // next prayer
                Constraint::Min(0),    // summary
            ])
            .split(columns[1]);

        next_prayer::render(frame, right_chunks[0], self.next_info.as_ref());
        self.draw_summary(frame, right_chunks[1]);

        if self.show_help {
            self.draw_help_overlay(frame);
        }
    }

    fn draw_summary(&self, frame: &mut Frame, area: Rect) {
        let now = self.clock.now();
        let block = Block::default()
            .title(Span::styled(" Today ", theme::gold()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(ratatui::style::Style::default().fg(theme::BORDER))
            .style(theme::surface());

        let lines = match self.runtime.day() {
            None => vec![
                Line::from(""),
                Line::from(Span::styled("  No data", theme::dim())),
            ],
            Some(day) => {
                let actionable: Vec<_> =
                    day.points.iter().filter(|p| p.name.is_actionable()).collect();
                let prayed = actionable
                    .iter()
                    .filter(|p| p.status == PrayerStatus::Completed)
                    .count();
                let missed = actionable
                    .iter()
                    .filter(|p| p.status == PrayerStatus::Missed)
                    .count();

                let mut lines = vec![
                    Line::from(""),
                    Line::from(vec![
                        Span::styled("  Prayed  ", theme::dim()),
                        Span::styled(
                            format!("{}/{}", prayed, actionable.len()),
                            theme::green().add_modifier(Modifier::BOLD),
                        ),
                    ]),
                ];
                if missed > 0 {
                    lines.push(Line::from(vec![
                        Span::styled("  Missed  ", theme::dim()),
                        Span::styled(format!("{}", missed), theme::red()),
                    ]));
                }
                if let Some(active) = self.runtime.active_point(now) {
                    if active.status == PrayerStatus::Upcoming {
                        let queued = self.runtime.sink().pending_for(active.name.as_str());
                        lines.push(Line::from(""));
                        lines.push(Line::from(vec![
                            Span::styled("  Open    ", theme::dim()),
                            Span::styled(active.name.display_name(), theme::blue()),
                            Span::styled(
                                format!("  ({} reminders queued)", queued),
                                theme::dim(),
                            ),
                        ]));
                    }
                }
                if prayed == actionable.len() && !actionable.is_empty() {
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        "  All prayers done for today",
                        theme::gold(),
                    )));
                }
                lines
            }
        };

        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, area);
    }

    fn draw_help_overlay(&self, frame: &mut Frame) {
        let area = frame.area();

        let popup_area = Rect {
            x: area.width / 4,
            y: area.height / 4,
            width: area.width / 2,
            height: (area.height / 2).min(16),
        };

        frame.render_widget(Clear, popup_area);

        let help_text = vec![
            Line::from(Span::styled(
                "  Keybindings",
                theme::gold().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("  [m] / Enter  ", theme::gold()),
                Span::styled("Mark focused prayer as prayed", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [↑ ↓]        ", theme::gold()),
                Span::styled("Navigate prayers", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [t]          ", theme::gold()),
                Span::styled("Toggle follow-up reminders", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [+ / -]      ", theme::gold()),
                Span::styled("Adjust reminder interval", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [r]          ", theme::gold()),
                Span::styled("Refresh prayer times", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [?]          ", theme::gold()),
                Span::styled("Toggle help", theme::dim()),
            ]),
            Line::from(vec![
                Span::styled("  [Esc / q]    ", theme::gold()),
                Span::styled("Quit", theme::dim()),
            ]),
        ];

        let block = Block::default()
            .title(Span::styled(" Help ", theme::gold()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::gold())
            .style(theme::surface());

        let paragraph = Paragraph::new(help_text).block(block);
        frame.render_widget(paragraph, popup_area);
    }
}

/// Run the dashboard event loop on a 1-second tick.
pub fn run(conn: Connection, config: AppConfig) -> Result<()> {
    let mut app = App::new(config);
    app.load(&conn);

    let mut terminal = ratatui::init();
    let mut events = EventHandler::new(1000);

    loop {
        terminal.draw(|frame| app.draw(frame))?;

        if app.take_bell() {
            // Terminal bell still works under the alternate screen.
            use std::io::Write;
            print!("\x07");
            let _ = std::io::stdout().flush();
        }

        match events.next()? {
            Event::Key(key) => {
                app.handle_key(key, &conn);
                if app.should_quit {
                    break;
                }
            }
            Event::Tick => {
                app.tick(&conn);
            }
        }
    }

    ratatui::restore();
    Ok(())
}
