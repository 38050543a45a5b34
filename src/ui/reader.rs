use super::{fallback, settings};
use crate::app::{App, ReaderView};
use crate::reader::images::{Band, PageSlot};
use crate::reader::SessionState;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::Paragraph,
    Frame,
};
use ratatui_image::{picker::Picker, Image};

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(f.area());

    app.sync_viewport(chunks[0].width, chunks[0].height);
    let cell_height = app.config.cell_height_px.max(1);
    let settings = app.settings;
    let show_settings = app.settings_open();
    let Some(reader) = app.reader.as_mut() else {
        return;
    };

    match reader.session.state() {
        SessionState::Ready => draw_pages(f, chunks[0], reader, &app.picker, cell_height),
        _ => fallback::render(f, chunks[0], &reader.session),
    }

    let session = &reader.session;
    let mut status = format!(" {}", session.title());
    if let Some(chapter) = session.chapter() {
        status.push_str(&format!(" | {}", chapter.display_title()));
        if chapter.title.is_some() {
            status.push_str(&format!(" (Ch. {})", chapter.number_label()));
        }
    }
    if session.state() == SessionState::Ready {
        status.push_str(&format!(
            " | Page {}/{}",
            session.current_page() + 1,
            session.pages().len()
        ));
        let loaded = reader.strip.loaded();
        if loaded < reader.strip.len() {
            status.push_str(&format!(" ({} loaded)", loaded));
        }
    }
    status.push_str(&format!(
        " | auto {} x{}",
        if session.auto_scrolling() && reader.driver.is_running() { "on" } else { "off" },
        settings.auto_scroll_speed
    ));
    if settings.infinite_scroll {
        status.push_str(" | infinite");
    }
    status.push_str(" | '?' help | 'q' library ");

    let bar = Paragraph::new(status).style(Style::default().bg(Color::Blue).fg(Color::White));
    f.render_widget(bar, chunks[1]);

    if show_settings {
        settings::render(f, app);
    }
}

fn draw_pages(f: &mut Frame, area: Rect, reader: &mut ReaderView, picker: &Picker, cell_height: u32) {
    let cols = reader.layout_cols.min(area.width);
    if cols == 0 || reader.strip.is_empty() {
        return;
    }
    let x = area.x + (area.width - cols) / 2;
    let view_top = reader.viewport.scroll_top / cell_height;
    let view_bottom = view_top + u32::from(area.height);
    let total = reader.strip.len();

    for index in 0..reader.layout.len() {
        let Some((top, bottom)) = reader.layout.page_span(index) else {
            continue;
        };
        let (top, bottom) = (top / cell_height, bottom / cell_height);
        if bottom <= view_top || top >= view_bottom {
            continue;
        }
        let first = top.max(view_top);
        let band = Band {
            cols,
            page_rows: bottom - top,
            skip: first - top,
            rows: bottom.min(view_bottom) - first,
        };
        // band.rows is bounded by area.height
        let rect = Rect::new(x, area.y + (first - view_top) as u16, cols, band.rows as u16);

        match reader.strip.slot_mut(index) {
            Some(PageSlot::Loaded(image)) => match image.band(picker, band) {
                Some(protocol) => f.render_widget(Image::new(protocol), rect),
                None => placeholder(
                    f.buffer_mut(),
                    rect,
                    band,
                    &format!("Page {} could not be drawn", index + 1),
                    Style::default().fg(Color::Red),
                ),
            },
            Some(PageSlot::Pending) => placeholder(
                f.buffer_mut(),
                rect,
                band,
                &format!("Loading page {}/{}…", index + 1, total),
                Style::default().fg(Color::DarkGray),
            ),
            Some(PageSlot::Failed(error)) => placeholder(
                f.buffer_mut(),
                rect,
                band,
                &format!("Page {} could not be loaded: {}", index + 1, error),
                Style::default().fg(Color::Red),
            ),
            None => {}
        }
    }
}

/// A rule on the page's first row and `text` across its middle, for
/// whichever of those rows fall inside `rect`.
fn placeholder(buf: &mut Buffer, rect: Rect, band: Band, text: &str, style: Style) {
    if band.skip == 0 {
        let rule = "─".repeat(usize::from(rect.width));
        buf.set_string(rect.x, rect.y, rule, Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM));
    }
    let middle = band.page_rows / 2;
    if middle >= band.skip && middle < band.skip + band.rows {
        let y = rect.y + (middle - band.skip) as u16;
        centered_text(buf, rect.x, y, rect.width, text, style);
    }
}

fn centered_text(buf: &mut Buffer, x0: u16, y: u16, width: u16, text: &str, style: Style) {
    let len = text.chars().count().min(usize::from(width)) as u16;
    let x = x0 + (width - len) / 2;
    let clipped: String = text.chars().take(usize::from(len)).collect();
    buf.set_string(x, y, clipped, style);
}
