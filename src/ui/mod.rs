pub mod fallback;
pub mod help;
pub mod library;
pub mod reader;
pub mod settings;

use crate::app::{App, AppView};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Clear, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, app: &mut App) {
    let underneath = match app.view {
        AppView::Help => app.previous_view.unwrap_or(AppView::Library),
        view => view,
    };
    match underneath {
        AppView::Reader if app.reader.is_some() => reader::render(f, app),
        _ => library::render(f, app),
    }

    if app.view == AppView::Help {
        help::render(f, app);
    }

    render_notice(f, app);
}

fn render_notice(f: &mut Frame, app: &App) {
    let Some(ref notice) = app.notice else {
        return;
    };
    let area = f.area();
    if area.height < 3 {
        return;
    }
    let width = (notice.text.chars().count() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + area.height - 3,
        width,
        height: 1,
    };
    f.render_widget(Clear, rect);
    let p = Paragraph::new(format!("  {}  ", notice.text)).style(
        Style::default()
            .fg(Color::Black)
            .bg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(p, rect);
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
