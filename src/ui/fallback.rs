//! What the reader shows instead of pages: loading, a missing chapter, or
//! pages that could not be resolved.

use crate::reader::{ReaderSession, SessionState};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

fn lines_for(session: &ReaderSession) -> (&'static str, Color, Vec<Line<'static>>) {
    let chapter = session
        .chapter()
        .map(|c| c.display_title())
        .unwrap_or_else(|| "this chapter".to_string());

    match session.state() {
        SessionState::Loading => (
            " Loading ",
            Color::Cyan,
            vec![
                Line::from(format!("Loading {}…", chapter)),
                Line::from(""),
                Line::from(Span::styled(
                    "Failed requests are retried with backoff.",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
        ),
        SessionState::ChapterNotFound => (
            " Chapter not found ",
            Color::Yellow,
            vec![
                Line::from("This chapter is not available in the configured language."),
                Line::from(format!(
                    "{} chapters were found for this manga.",
                    session.chapters().len()
                )),
                Line::from(""),
                Line::from("[q] Back to library"),
            ],
        ),
        SessionState::PagesUnavailable => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("The pages of {} could not be loaded.", chapter),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ];
            if let Some(error) = session.error() {
                lines.push(Line::from(Span::styled(
                    error.to_string(),
                    Style::default().fg(Color::DarkGray),
                )));
                lines.push(Line::from(""));
            }
            if !session.error_is_transient() {
                lines.push(Line::from("The chapter may have been removed upstream."));
            }
            let mut actions = String::from("[r] Retry");
            if session.has_prev_chapter() {
                actions.push_str("  [p] Previous chapter");
            }
            if session.has_next_chapter() {
                actions.push_str("  [n] Next chapter");
            }
            actions.push_str("  [q] Library");
            lines.push(Line::from(actions));
            (" Pages unavailable ", Color::Red, lines)
        }
        SessionState::Ready => (" ", Color::Reset, Vec::new()),
    }
}

pub fn render(f: &mut Frame, area: Rect, session: &ReaderSession) {
    let (title, color, lines) = lines_for(session);
    let height = (lines.len() as u16 + 2).min(area.height);
    let rect = Rect {
        x: area.x + area.width / 8,
        y: area.y + area.height.saturating_sub(height) / 2,
        width: area.width - area.width / 4,
        height,
    };
    let p = Paragraph::new(lines)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    f.render_widget(p, rect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{LoadOutcome, PageError, ReadRequest};
    use crate::reader::fake::chapter;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .flat_map(|l| l.spans.iter().map(|s| s.content.to_string()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn unavailable_view_offers_retry_and_neighbours() {
        let mut session = ReaderSession::new(
            1,
            ReadRequest {
                manga_id: "m1".to_string(),
                chapter_id: Some("c2".to_string()),
            },
            200,
        );
        session.apply_load(
            1,
            LoadOutcome::PagesUnavailable {
                manga: None,
                chapters: vec![chapter("c3", Some("3")), chapter("c2", Some("2"))],
                chapter: chapter("c2", Some("2")),
                error: PageError::EmptyChapter {
                    chapter_id: "c2".to_string(),
                },
            },
        );

        let (title, _, lines) = lines_for(&session);
        assert_eq!(title, " Pages unavailable ");
        let body = text(&lines);
        assert!(body.contains("Chapter 2"));
        assert!(body.contains("[r] Retry"));
        assert!(body.contains("[n] Next chapter"));
        assert!(!body.contains("[p] Previous chapter"));
        assert!(body.contains("removed upstream"));
    }
}
