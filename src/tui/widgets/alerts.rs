use chrono::NaiveDateTime;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem},
};

use crate::sink::{AlertKind, ScheduledAlert};
use crate::tui::theme;
use crate::utils::format::format_time;

/// Recently fired alerts on top, the next few pending instants below.
pub fn render(
    frame: &mut Frame,
    area: Rect,
    recent: &[(NaiveDateTime, ScheduledAlert)],
    pending: &[ScheduledAlert],
) {
    let block = Block::default()
        .title(Span::styled(" Reminders ", theme::gold()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(ratatui::style::Style::default().fg(theme::BORDER))
        .style(theme::surface());

    let mut items: Vec<ListItem> = Vec::new();

    for (fired_at, alert) in recent.iter().rev().take(4) {
        let style = match alert.payload.kind {
            AlertKind::Opening => theme::gold(),
            AlertKind::FollowUp => theme::amber(),
        };
        items.push(ListItem::new(Line::from(vec![
            Span::styled(format!("  {}  ", format_time(fired_at.time())), theme::dim()),
            Span::styled("🔔 ", style),
            Span::styled(alert.payload.body.clone(), style),
        ])));
    }

    if !items.is_empty() {
        items.push(ListItem::new(Line::from("")));
    }

    if pending.is_empty() {
        items.push(ListItem::new(Line::from(Span::styled(
            "  Nothing scheduled",
            theme::dim(),
        ))));
    } else {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  {} pending", pending.len()),
            theme::dim(),
        ))));
        for alert in pending.iter().take(3) {
            let kind = match alert.payload.kind {
                AlertKind::Opening => "opening",
                AlertKind::FollowUp => "follow-up",
            };
            items.push(ListItem::new(Line::from(vec![
                Span::styled(
                    format!("  {}  ", format_time(alert.instant.time())),
                    theme::dim(),
                ),
                Span::styled(
                    format!("{} · {}", alert.payload.prayer.display_name(), kind),
                    theme::dim(),
                ),
            ])));
        }
    }

    let list = List::new(items).block(block);
    frame.render_widget(list, area);
}
