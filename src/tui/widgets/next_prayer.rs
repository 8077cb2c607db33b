use ratatui::{
    Frame,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};
use tui_big_text::{BigText, PixelSize};

use crate::tui::theme;
use crate::utils::format::format_duration_secs;

/// What the countdown panel shows: the pending prayer's name, seconds until
/// its start, and whether it belongs to tomorrow.
pub struct NextInfo {
    pub name: String,
    pub secs_until: i64,
    pub tomorrow: bool,
}

pub fn render(frame: &mut Frame, area: Rect, next: Option<&NextInfo>) {
    let block = Block::default()
        .title(Span::styled(" Next Prayer ", theme::gold()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(ratatui::style::Style::default().fg(theme::BORDER))
        .style(theme::surface());

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(next) = next else {
        let para = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("  No data", theme::dim())),
        ]);
        frame.render_widget(para, inner);
        return;
    };

    let title = if next.tomorrow {
        format!("  {}  (tomorrow)", next.name.to_uppercase())
    } else if next.secs_until <= 0 {
        format!("  {}  — open", next.name.to_uppercase())
    } else {
        format!("  {}", next.name.to_uppercase())
    };

    let head = Paragraph::new(vec![
        Line::from(Span::styled(
            title,
            theme::gold().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ]);
    let head_area = Rect {
        height: 2.min(inner.height),
        ..inner
    };
    frame.render_widget(head, head_area);

    if inner.height <= 2 {
        return;
    }
    let countdown_area = Rect {
        x: inner.x + 2,
        y: inner.y + 2,
        width: inner.width.saturating_sub(2),
        height: inner.height - 2,
    };

    let countdown = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(theme::amber().add_modifier(Modifier::BOLD))
        .lines(vec![Line::from(format_duration_secs(next.secs_until))])
        .build();
    frame.render_widget(countdown, countdown_area);
}
