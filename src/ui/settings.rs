use super::centered_rect;
use crate::app::{App, SettingsRow};
use crate::db::MAX_SCROLL_SPEED;
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &App) {
    let area = centered_rect(50, 40, f.area());
    f.render_widget(Clear, area);

    let settings = app.settings;
    let mut lines = vec![Line::from("")];
    for (i, row) in SettingsRow::ALL.iter().enumerate() {
        let (label, value) = match row {
            SettingsRow::Speed => (
                "Auto-scroll speed",
                format!(
                    "{:<10} {}/{}",
                    "█".repeat(settings.auto_scroll_speed as usize),
                    settings.auto_scroll_speed,
                    MAX_SCROLL_SPEED
                ),
            ),
            SettingsRow::InfiniteScroll => (
                "Infinite scroll",
                if settings.infinite_scroll { "On" } else { "Off" }.to_string(),
            ),
            SettingsRow::Quality => ("Image quality", settings.image_quality.to_string()),
        };
        let style = if i == app.settings_row {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let marker = if i == app.settings_row { ">> " } else { "   " };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{:<20}", marker, label), style),
            Span::styled(value, style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " [j/k] Select  [h/l] Change  [Esc] Close",
        Style::default().fg(Color::DarkGray),
    )));

    let p = Paragraph::new(lines)
        .block(Block::default().title(" Reader Settings ").borders(Borders::ALL))
        .style(Style::default().fg(Color::White).bg(Color::Black));
    f.render_widget(p, area);
}
