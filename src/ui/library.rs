use crate::app::App;
use crate::db::LibraryEntry;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

fn progress(entry: &LibraryEntry) -> String {
    match (&entry.last_read_chapter, entry.last_read_page) {
        (Some(chapter), Some(page)) => {
            let short: String = chapter.chars().take(8).collect();
            format!("chapter {}… page {}", short, page + 1)
        }
        (Some(_), None) => "started".to_string(),
        _ => "not started".to_string(),
    }
}

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let user = match app.user {
        Some(ref user) => format!("signed in as {}", user.username),
        None => "not signed in (progress is not saved)".to_string(),
    };
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            " MangaVerse ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!(" {}", user), Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    if app.library.is_empty() {
        let empty = Paragraph::new(
            "Your library is empty.\n\nAdd a manga with `mangaverse add <manga-id>`\nor read one directly with `mangaverse read <manga-id>`.",
        )
        .block(Block::default().title(" Library ").borders(Borders::ALL))
        .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, chunks[1]);
    } else {
        let items: Vec<ListItem> = app
            .library
            .iter()
            .map(|entry| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        entry.title.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!("  [{}]", entry.status.label()),
                        Style::default().fg(Color::Green),
                    ),
                    Span::styled(
                        format!("  {}", progress(entry)),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title(" Library ").borders(Borders::ALL))
            .highlight_style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ");
        let mut state = ListState::default().with_selected(Some(app.selected_index));
        f.render_stateful_widget(list, chunks[1], &mut state);
    }

    let help = Paragraph::new(
        " [Enter] Read | [j/k] Navigate | [s] Status | [d] Remove | [r] Refresh | [?] Help | [q] Quit ",
    );
    f.render_widget(help, chunks[2]);
}
