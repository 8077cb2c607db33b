use chrono::NaiveDateTime;
use ratatui::{
    Frame,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem},
};

use crate::engine::window::WindowEngine;
use crate::models::{PrayerDay, PrayerStatus};
use crate::tui::theme;
use crate::utils::format::format_time;

pub fn render(
    frame: &mut Frame,
    area: Rect,
    day: Option<&PrayerDay>,
    engine: &WindowEngine,
    now: NaiveDateTime,
    focused_idx: usize,
) {
    let block = Block::default()
        .title(Span::styled(" Prayers ", theme::gold()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::gold())
        .style(theme::surface());

    let Some(day) = day else {
        let empty = List::new(vec![ListItem::new(Line::from(Span::styled(
            "  No prayer times yet",
            theme::dim(),
        )))])
        .block(block);
        frame.render_widget(empty, area);
        return;
    };

    let items: Vec<ListItem> = day
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let is_focused = i == focused_idx;
            let time_str = format_time(p.time);
            let active = engine.is_active(day, p.name, now);

            let (icon, icon_style, label, label_style) = if !p.name.is_actionable() {
                ("·", theme::dim(), "", theme::dim())
            } else if active && p.status == PrayerStatus::Upcoming {
                ("●", theme::blue(), "open now", theme::blue())
            } else {
                match p.status {
                    PrayerStatus::Completed => ("✓", theme::green(), "prayed", theme::dim()),
                    PrayerStatus::Missed => ("✗", theme::red(), "missed", theme::dim()),
                    PrayerStatus::Upcoming => ("○", theme::dim(), "upcoming", theme::dim()),
                }
            };

            let name_style = if is_focused {
                theme::gold().add_modifier(Modifier::BOLD)
            } else if !p.name.is_actionable() {
                theme::dim()
            } else {
                theme::bold()
            };

            let line = Line::from(vec![
                Span::styled(if is_focused { " ▸" } else { "  " }, theme::gold()),
                Span::styled(format!("{:<9}", p.name.display_name()), name_style),
                Span::styled(format!("{:<7}", time_str), theme::dim()),
                Span::styled(icon, icon_style),
                Span::styled(format!("  {}", label), label_style),
            ]);

            ListItem::new(line)
        })
        .collect();

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}
