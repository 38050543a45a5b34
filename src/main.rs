mod api;
mod app;
mod config;
mod db;
mod logging;
mod reader;
mod ui;

use anyhow::{bail, Context, Result};
use api::CatalogClient;
use app::{App, AppEvent, AppView};
use config::AppConfig;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use db::{Db, MangaStatus, ReaderSettings};
use ratatui::{backend::CrosstermBackend, Terminal};
use ratatui_image::picker::Picker;
use reader::{Direction, ReadRequest};
use std::{io, path::Path, time::Duration};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

const USAGE: &str = "\
Usage: mangaverse [command]

  (no command)                     open the library
  read <manga-id> [chapter-id]     open the reader
  info <manga-id>                  show a manga and its chapters
  add <manga-id> [status]          add a manga to the library
  list                             show the library
  remove <manga-id>                remove a manga from the library
  status <manga-id> <status>       reading | on_hold | plan_to_read | dropped | re_reading | completed
  login <username> [email]         read as a named user (progress is saved)
  logout
  whoami
  like <manga-id>                  like or unlike a manga
  comment <manga-id> <text>        post a comment
  comments <manga-id>              show comments
  uncomment <comment-id>           delete a comment
  settings [speed=N] [infinite=on|off] [quality=low|medium|high]
  config                           write the current configuration file";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = AppConfig::load().context("Failed to load configuration")?;
    if let Err(e) = logging::init(&config.log_path) {
        eprintln!("Logging disabled: {:#}", e);
    }

    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let db = Db::new(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path))?;

    let mut initial = None;
    if args.len() > 1 {
        match run_command(&config, &db, &args[1..]).await? {
            Some(request) => initial = Some(request),
            None => return Ok(()),
        }
    }

    let (tx, rx) = unbounded_channel();
    let mut app = App::new(config, db, tx)?;
    if let Some(request) = initial {
        app.open_reader(request, None);
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    app.picker = Picker::from_query_stdio().unwrap_or_else(|_| Picker::halfblocks());
    log::info!("Terminal font size {:?}", app.picker.font_size());

    let res = run_app(&mut terminal, app, rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("{:?}", err);
        println!("{:?}", err)
    }

    Ok(())
}

/// Runs a one-shot command. Returns the reader to open for `read`, `None`
/// when the command is done and the TUI should not start.
async fn run_command(config: &AppConfig, db: &Db, args: &[String]) -> Result<Option<ReadRequest>> {
    match args[0].as_str() {
        "read" => {
            return Ok(Some(ReadRequest {
                manga_id: arg(args, 1, "manga-id")?.to_string(),
                chapter_id: args.get(2).cloned(),
            }));
        }
        "info" => {
            let manga_id = arg(args, 1, "manga-id")?;
            let client = CatalogClient::new(config)?;
            let manga = client
                .get_manga(manga_id)
                .await
                .with_context(|| format!("Could not fetch manga {}", manga_id))?;
            println!("{}", manga.title());
            let year = manga.year.map(|y| y.to_string()).unwrap_or_default();
            println!("{} {}", manga.status.as_deref().unwrap_or("unknown status"), year);
            if let Some(description) = manga.description() {
                println!("\n{}\n", description);
            }
            if let Some(entry) = db.get_entry(manga_id)? {
                println!("In library: {}", entry.status.label());
            }
            println!(
                "{} likes{}",
                db.like_count(manga_id)?,
                if db.is_liked(manga_id)? { " (including yours)" } else { "" }
            );
            let chapters = client.get_chapters(manga_id, &config.language).await?;
            println!("{} chapters ({}):", chapters.len(), config.language);
            for c in chapters {
                let published = c
                    .published_at
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!(
                    "  {}  Vol. {} Ch. {}  {}  [{}] {} pages {}",
                    c.id,
                    c.volume.as_deref().unwrap_or("-"),
                    c.number_label(),
                    c.display_title(),
                    c.group.as_deref().unwrap_or("no group"),
                    c.pages,
                    published
                );
            }
        }
        "add" => {
            let manga_id = arg(args, 1, "manga-id")?;
            let status = match args.get(2) {
                Some(s) => s.parse::<MangaStatus>().map_err(anyhow::Error::msg)?,
                None => MangaStatus::PlanToRead,
            };
            let client = CatalogClient::new(config)?;
            let manga = client
                .get_manga(manga_id)
                .await
                .with_context(|| format!("Could not fetch manga {}", manga_id))?;
            db.add_to_library(&manga.id, manga.title(), status)?;
            println!("Added: {} [{}]", manga.title(), status.label());
        }
        "list" => {
            for e in db.get_library()? {
                let progress = match (e.last_read_chapter, e.last_read_page) {
                    (Some(chapter), Some(page)) => format!("chapter {} page {}", chapter, page + 1),
                    _ => "not started".to_string(),
                };
                println!("ID: {}, Title: {}, Status: {}, Progress: {}", e.manga_id, e.title, e.status.label(), progress);
            }
        }
        "remove" => {
            let manga_id = arg(args, 1, "manga-id")?;
            if db.remove_from_library(manga_id)? {
                println!("Removed {}", manga_id);
            } else {
                println!("{} is not in the library", manga_id);
            }
        }
        "status" => {
            let manga_id = arg(args, 1, "manga-id")?;
            let status: MangaStatus = arg(args, 2, "status")?.parse().map_err(anyhow::Error::msg)?;
            if !db.update_status(manga_id, status)? {
                bail!("{} is not in the library", manga_id);
            }
            println!("{} is now {}", manga_id, status.label());
        }
        "login" => {
            let user = db.login(arg(args, 1, "username")?, args.get(2).map(String::as_str))?;
            println!("Signed in as {} ({})", user.username, user.id);
        }
        "logout" => {
            db.logout()?;
            println!("Signed out");
        }
        "whoami" => match db.get_user()? {
            Some(user) => println!(
                "{} ({}){}",
                user.username,
                user.id,
                user.email.map(|e| format!(" <{}>", e)).unwrap_or_default()
            ),
            None => println!("Not signed in"),
        },
        "like" => {
            let manga_id = arg(args, 1, "manga-id")?;
            match db.toggle_like(manga_id)? {
                Some(liked) => println!(
                    "{} {} ({} likes)",
                    if liked { "Liked" } else { "Unliked" },
                    manga_id,
                    db.like_count(manga_id)?
                ),
                None => bail!("Sign in first: mangaverse login <username>"),
            }
        }
        "comment" => {
            let manga_id = arg(args, 1, "manga-id")?;
            let text = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            match db.add_comment(manga_id, &text)? {
                Some(comment) => println!("Comment #{} posted", comment.id),
                None if db.get_user()?.is_none() => bail!("Sign in first: mangaverse login <username>"),
                None => bail!("Comment is empty"),
            }
        }
        "comments" => {
            let manga_id = arg(args, 1, "manga-id")?;
            let comments = db.get_comments(manga_id)?;
            if comments.is_empty() {
                println!("No comments yet");
            }
            for c in comments {
                println!("#{} {} at {}:\n  {}", c.id, c.username, c.created_at, c.content);
            }
        }
        "uncomment" => {
            let id: i64 = arg(args, 1, "comment-id")?
                .parse()
                .context("Comment id must be a number")?;
            if !db.remove_comment(id)? {
                bail!("No comment #{}", id);
            }
            println!("Deleted comment #{}", id);
        }
        "settings" => {
            let settings = parse_settings(db.get_reader_settings()?, &args[1..])?;
            db.save_reader_settings(&settings)?;
            println!(
                "speed={} infinite={} quality={}",
                settings.auto_scroll_speed,
                if settings.infinite_scroll { "on" } else { "off" },
                settings.image_quality
            );
        }
        "config" => {
            let path = config.save()?;
            println!("Wrote {}", path.display());
        }
        "help" | "-h" | "--help" => println!("{}", USAGE),
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
    Ok(None)
}

fn arg<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("Missing <{}>\n\n{}", name, USAGE))
}

fn parse_settings(mut settings: ReaderSettings, pairs: &[String]) -> Result<ReaderSettings> {
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Expected key=value, got '{}'", pair);
        };
        match key {
            "speed" => {
                let speed: i64 = value
                    .parse()
                    .with_context(|| format!("Invalid speed '{}'", value))?;
                settings = settings.with_speed(speed);
            }
            "infinite" => {
                settings.infinite_scroll = match value {
                    "on" | "true" | "1" => true,
                    "off" | "false" | "0" => false,
                    _ => bail!("infinite must be on or off"),
                }
            }
            "quality" => settings.image_quality = value.parse().map_err(anyhow::Error::msg)?,
            _ => bail!("Unknown setting '{}'", key),
        }
    }
    Ok(settings)
}

fn report(app: &mut App, result: Result<()>) {
    if let Err(e) = result {
        log::error!("{:#}", e);
        app.notify(format!("Error: {:#}", e));
    }
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut events: UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal
            .draw(|f| ui::render(f, &mut app))
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        while let Ok(ev) = events.try_recv() {
            app.handle_event(ev);
        }

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(&mut app, key),
                Event::Mouse(mouse) => match (app.view, mouse.kind) {
                    (AppView::Reader, MouseEventKind::ScrollDown) => app.scroll_rows(3),
                    (AppView::Reader, MouseEventKind::ScrollUp) => app.scroll_rows(-3),
                    (AppView::Library, MouseEventKind::ScrollDown) => app.select_next(),
                    (AppView::Library, MouseEventKind::ScrollUp) => app.select_prev(),
                    _ => {}
                },
                _ => {}
            }
        }

        app.tick();
        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.should_quit = true;
        return;
    }

    match app.view {
        AppView::Help => match key.code {
            KeyCode::Char('?') | KeyCode::Char('q') | KeyCode::Esc => app.toggle_help(),
            _ => {}
        },
        AppView::Library => match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Char('?') => app.toggle_help(),
            KeyCode::Down | KeyCode::Char('j') => app.select_next(),
            KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Enter => app.open_selected(),
            KeyCode::Char('s') => {
                let result = app.cycle_selected_status();
                report(app, result);
            }
            KeyCode::Char('d') => {
                let result = app.remove_selected();
                report(app, result);
            }
            KeyCode::Char('r') => {
                let result = app.refresh_library();
                report(app, result);
            }
            _ => {}
        },
        AppView::Reader if app.settings_open() => match key.code {
            KeyCode::Esc | KeyCode::Char('o') | KeyCode::Char('q') => app.set_settings_open(false),
            KeyCode::Down | KeyCode::Char('j') => app.move_settings_row(true),
            KeyCode::Up | KeyCode::Char('k') => app.move_settings_row(false),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter => {
                let result = app.adjust_setting(true);
                report(app, result);
            }
            KeyCode::Left | KeyCode::Char('h') => {
                let result = app.adjust_setting(false);
                report(app, result);
            }
            _ => {}
        },
        AppView::Reader => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                let result = app.close_reader();
                report(app, result);
            }
            KeyCode::Char('?') => app.toggle_help(),
            KeyCode::Down | KeyCode::Char('j') => app.scroll_rows(3),
            KeyCode::Up | KeyCode::Char('k') => app.scroll_rows(-3),
            KeyCode::PageDown | KeyCode::Char(' ') => app.scroll_screen(1),
            KeyCode::PageUp | KeyCode::Char('b') => app.scroll_screen(-1),
            KeyCode::Home | KeyCode::Char('g') => app.scroll_to_top(),
            KeyCode::End | KeyCode::Char('G') => app.scroll_to_bottom(),
            KeyCode::Char(']') => app.step_page(true),
            KeyCode::Char('[') => app.step_page(false),
            KeyCode::Right | KeyCode::Char('n') => app.navigate(Direction::Next),
            KeyCode::Left | KeyCode::Char('p') => app.navigate(Direction::Prev),
            KeyCode::Char('a') => app.toggle_auto_scroll(),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let result = app.nudge_speed(true);
                report(app, result);
            }
            KeyCode::Char('-') => {
                let result = app.nudge_speed(false);
                report(app, result);
            }
            KeyCode::Char('o') => app.set_settings_open(true),
            KeyCode::Char('r') => app.retry_load(),
            _ => {}
        },
    }
}
