use super::centered_rect;
use crate::app::App;
use ratatui::{
    Frame,
    layout::Alignment,
    style::{Color, Style},
    widgets::{Block, Borders, Clear, Paragraph},
};

pub fn render(f: &mut Frame, _app: &App) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let help_text = [
        "--- GLOBAL ---",
        "? : Toggle Help",
        "q : Back / Quit",
        "--- LIBRARY ---",
        "Enter : Continue Reading",
        "j/k : Select",
        "s : Cycle Status",
        "d : Remove From Library",
        "r : Refresh",
        "--- READER ---",
        "j/k, wheel : Scroll",
        "Space/b : Page Down / Up",
        "g/G : Top / Bottom",
        "]/[ : Next / Previous Page",
        "n/p : Next / Previous Chapter",
        "a : Toggle Auto-Scroll",
        "+/- : Auto-Scroll Speed",
        "o : Reader Settings",
        "r : Retry Loading Pages",
        "--- SETTINGS ---",
        "j/k : Select Row",
        "h/l : Change Value",
        "Esc/o : Close",
    ];

    let p = Paragraph::new(help_text.join("\n"))
        .block(Block::default().title(" Quick Help ").borders(Borders::ALL))
        .alignment(Alignment::Left)
        .style(Style::default().fg(Color::White).bg(Color::Black));
    f.render_widget(p, area);
}
