use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::tui::theme;

pub fn render(
    frame: &mut Frame,
    area: Rect,
    load_failed: bool,
    reminders_enabled: bool,
    interval_minutes: u32,
) {
    let mut spans = Vec::new();

    if load_failed {
        spans.push(Span::styled("⚠ load failed — showing last known  ", theme::red()));
    }

    if reminders_enabled {
        spans.push(Span::styled(
            format!("⏰ every {}m  ", interval_minutes),
            theme::dim(),
        ));
    } else {
        spans.push(Span::styled("⏰ off  ", theme::dim()));
    }

    let hints = [
        ("[m]", " mark prayed  "),
        ("[t]", " reminders  "),
        ("[+/-]", " interval  "),
        ("[r]", " refresh  "),
        ("[?]", " help  "),
        ("[Esc]", " quit"),
    ];
    for (key, label) in &hints {
        spans.push(Span::styled(*key, theme::gold()));
        spans.push(Span::styled(*label, theme::dim()));
    }

    let line = Line::from(spans);
    let paragraph = Paragraph::new(line).alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
