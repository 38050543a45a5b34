use crate::api::CatalogClient;
use crate::config::AppConfig;
use crate::db::{Db, ImageQuality, LibraryEntry, PreferenceStore, ReaderSettings, User};
use crate::reader::images::{spawn_page_loader, PageFetched, PageStrip};
use crate::reader::{
    current_page, load_chapter, resolve_chapter_pages, AutoScrollDriver, AutoScrollTick,
    Direction, LoadOutcome, Navigation, PageError, PageLayout, ReadRequest, ReaderSession,
    SessionState, Viewport,
};
use anyhow::Result;
use ratatui_image::picker::Picker;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

const NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Everything background tasks report back to the UI loop.
#[derive(Debug)]
pub enum AppEvent {
    ChapterLoaded {
        session_id: u64,
        outcome: LoadOutcome,
    },
    PagesResolved {
        session_id: u64,
        result: Result<Vec<String>, PageError>,
    },
    PageFetched(PageFetched),
    AutoScroll(AutoScrollTick),
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum AppView {
    Library,
    Reader,
    Help,
}

/// Rows of the reader settings panel.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum SettingsRow {
    Speed,
    InfiniteScroll,
    Quality,
}

impl SettingsRow {
    pub const ALL: [SettingsRow; 3] = [SettingsRow::Speed, SettingsRow::InfiniteScroll, SettingsRow::Quality];
}

pub struct Notice {
    pub text: String,
    until: Instant,
}

/// A mounted reader: the session plus the terminal-side state hanging off it.
/// Dropping it cancels the auto-scroll loop and the page downloads.
pub struct ReaderView {
    pub session: ReaderSession,
    pub strip: PageStrip,
    pub layout: PageLayout,
    pub viewport: Viewport,
    pub layout_cols: u16,
    pub driver: AutoScrollDriver,
    loader: Option<JoinHandle<()>>,
    resume_page: Option<usize>,
}

impl Drop for ReaderView {
    fn drop(&mut self) {
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
    }
}

impl ReaderView {
    /// Rebuilds page geometry at `cols` wide, keeping the page being read
    /// where it was on screen.
    fn relayout(&mut self, cols: u16, cell_height: u32) {
        if cols == 0 {
            return;
        }
        // First layout: put the page the session already points at on top.
        let anchor = if self.layout.is_empty() {
            Some((self.session.current_page(), 0))
        } else {
            current_page(&self.layout, &self.viewport).and_then(|i| {
                let top = self.layout.page_top(i)?;
                Some((i, self.viewport.scroll_top.saturating_sub(top)))
            })
        };

        let heights = self
            .strip
            .row_heights(cols)
            .into_iter()
            .map(|rows| rows.saturating_mul(cell_height));
        self.layout = PageLayout::new(heights, cell_height);
        self.layout_cols = cols;
        self.viewport
            .resize(self.viewport.client_height, self.layout.total_height());

        if let Some((i, offset)) = anchor {
            if let Some((top, bottom)) = self.layout.page_span(i) {
                self.viewport.scroll_to(top.saturating_add(offset).min(bottom));
            }
        }
    }
}

pub struct App {
    pub view: AppView,
    pub previous_view: Option<AppView>,
    pub config: AppConfig,
    pub db: Db,
    pub client: CatalogClient,
    pub user: Option<User>,
    pub library: Vec<LibraryEntry>,
    pub selected_index: usize,
    pub settings: ReaderSettings,
    pub settings_row: usize,
    pub reader: Option<ReaderView>,
    pub notice: Option<Notice>,
    /// Terminal image protocol. Half blocks until the terminal is queried.
    pub picker: Picker,
    pub should_quit: bool,
    events: UnboundedSender<AppEvent>,
    next_session_id: u64,
}

impl App {
    pub fn new(config: AppConfig, db: Db, events: UnboundedSender<AppEvent>) -> Result<Self> {
        let client = CatalogClient::new(&config)?;
        let library = db.get_library()?;
        let settings = db.reader_settings()?;
        let user = db.current_user()?;
        Ok(Self {
            view: AppView::Library,
            previous_view: None,
            config,
            db,
            client,
            user,
            library,
            selected_index: 0,
            settings,
            settings_row: 0,
            reader: None,
            notice: None,
            picker: Picker::halfblocks(),
            should_quit: false,
            events,
            next_session_id: 0,
        })
    }

    fn cell_height(&self) -> u32 {
        self.config.cell_height_px.max(1)
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            until: Instant::now() + NOTICE_DURATION,
        });
    }

    /// Housekeeping between frames.
    pub fn tick(&mut self) {
        if self.notice.as_ref().is_some_and(|n| n.until <= Instant::now()) {
            self.notice = None;
        }
    }

    pub fn toggle_help(&mut self) {
        if self.view == AppView::Help {
            self.view = self.previous_view.take().unwrap_or(AppView::Library);
        } else {
            self.previous_view = Some(self.view);
            self.view = AppView::Help;
        }
    }

    // Library

    pub fn refresh_library(&mut self) -> Result<()> {
        self.library = self.db.get_library()?;
        if self.selected_index >= self.library.len() {
            self.selected_index = self.library.len().saturating_sub(1);
        }
        Ok(())
    }

    pub fn select_next(&mut self) {
        if !self.library.is_empty() {
            self.selected_index = (self.selected_index + 1) % self.library.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.library.is_empty() {
            self.selected_index = self
                .selected_index
                .checked_sub(1)
                .unwrap_or(self.library.len() - 1);
        }
    }

    pub fn open_selected(&mut self) {
        let Some(entry) = self.library.get(self.selected_index) else {
            return;
        };
        let request = ReadRequest {
            manga_id: entry.manga_id.clone(),
            chapter_id: entry.last_read_chapter.clone(),
        };
        let resume = entry
            .last_read_chapter
            .as_ref()
            .and(entry.last_read_page);
        self.open_reader(request, resume);
    }

    pub fn cycle_selected_status(&mut self) -> Result<()> {
        let Some(entry) = self.library.get(self.selected_index) else {
            return Ok(());
        };
        let status = entry.status.cycle();
        self.db.update_status(&entry.manga_id, status)?;
        let title = entry.title.clone();
        self.refresh_library()?;
        self.notify(format!("{} marked {}", title, status.label()));
        Ok(())
    }

    pub fn remove_selected(&mut self) -> Result<()> {
        let Some(entry) = self.library.get(self.selected_index) else {
            return Ok(());
        };
        let title = entry.title.clone();
        self.db.remove_from_library(&entry.manga_id)?;
        self.refresh_library()?;
        self.notify(format!("Removed {}", title));
        Ok(())
    }

    // Reader lifecycle

    /// Tears down any open reader and mounts a new session for `request`.
    pub fn open_reader(&mut self, request: ReadRequest, resume_page: Option<usize>) {
        self.reader = None;
        self.next_session_id += 1;
        let session_id = self.next_session_id;
        log::info!(
            "Opening session {} for {} / {:?}",
            session_id,
            request.manga_id,
            request.chapter_id
        );

        let client = self.client.clone();
        let events = self.events.clone();
        let language = self.config.language.clone();
        let quality = self.settings.image_quality;
        let policy = self.config.retry_policy();
        let task_request = request.clone();
        tokio::spawn(async move {
            let outcome = load_chapter(&client, &task_request, &language, quality, policy).await;
            let _ = events.send(AppEvent::ChapterLoaded { session_id, outcome });
        });

        let ticks = self.events.clone();
        let driver = AutoScrollDriver::new(
            Duration::from_millis(self.config.frame_interval_ms),
            move |tick| ticks.send(AppEvent::AutoScroll(tick)).is_ok(),
        );

        self.reader = Some(ReaderView {
            session: ReaderSession::new(session_id, request, self.config.infinite_scroll_threshold_px),
            strip: PageStrip::new(0),
            layout: PageLayout::default(),
            viewport: Viewport::default(),
            layout_cols: 0,
            driver,
            loader: None,
            resume_page,
        });
        self.view = AppView::Reader;
    }

    pub fn close_reader(&mut self) -> Result<()> {
        self.reader = None;
        self.view = AppView::Library;
        self.refresh_library()
    }

    /// Opens the same chapter again, e.g. after the image quality changed.
    pub fn reload_reader(&mut self) {
        let Some(reader) = self.reader.as_ref() else {
            return;
        };
        let request = ReadRequest {
            manga_id: reader.session.manga_id().to_string(),
            chapter_id: reader
                .session
                .chapter()
                .map(|c| c.id.clone())
                .or_else(|| reader.session.request().chapter_id.clone()),
        };
        let page = Some(reader.session.current_page()).filter(|p| *p > 0);
        self.open_reader(request, page);
    }

    pub fn retry_load(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let Some(chapter_id) = reader.session.retry_load() else {
            return;
        };
        let session_id = reader.session.id();
        let client = self.client.clone();
        let events = self.events.clone();
        let quality = self.settings.image_quality;
        let policy = self.config.retry_policy();
        tokio::spawn(async move {
            let result = resolve_chapter_pages(&client, &chapter_id, quality, policy).await;
            let _ = events.send(AppEvent::PagesResolved { session_id, result });
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ChapterLoaded { session_id, outcome } => {
                let Some(reader) = self.reader.as_mut() else {
                    return;
                };
                if reader.session.apply_load(session_id, outcome) {
                    self.on_session_settled();
                }
            }
            AppEvent::PagesResolved { session_id, result } => {
                let Some(reader) = self.reader.as_mut() else {
                    return;
                };
                if reader.session.apply_pages(session_id, result) {
                    self.on_session_settled();
                }
            }
            AppEvent::PageFetched(page) => {
                let cell_height = self.cell_height();
                let Some(reader) = self.reader.as_mut() else {
                    return;
                };
                if page.session_id != reader.session.id() {
                    log::debug!("Dropping page {} of stale session {}", page.index, page.session_id);
                    return;
                }
                if reader.strip.apply(page.index, page.result) {
                    let cols = reader.layout_cols;
                    reader.relayout(cols, cell_height);
                }
            }
            AppEvent::AutoScroll(tick) => self.apply_auto_scroll(tick),
        }
    }

    /// Runs once a load or retry has finished, whatever the outcome.
    fn on_session_settled(&mut self) {
        let cell_height = self.cell_height();
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        if reader.session.state() != SessionState::Ready {
            reader.driver.stop();
            return;
        }

        let pages = reader.session.pages().to_vec();
        reader.strip = PageStrip::new(pages.len());
        let events = self.events.clone();
        reader.loader = Some(spawn_page_loader(
            self.client.clone(),
            reader.session.id(),
            pages,
            move |page| events.send(AppEvent::PageFetched(page)).is_ok(),
        ));
        let cols = reader.layout_cols;
        reader.relayout(cols, cell_height);

        if let Some(page) = reader.resume_page.take() {
            self.go_to_page(page);
        }
    }

    /// Fits the reader to the area it is drawn in. Called by the view each
    /// frame; resizing is not a scroll.
    pub fn sync_viewport(&mut self, cols: u16, rows: u16) {
        let cell_height = self.cell_height();
        let page_cols = cols.min(self.config.page_width).max(1);
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if page_cols != reader.layout_cols {
            reader.relayout(page_cols, cell_height);
        }
        let client_height = u32::from(rows).saturating_mul(cell_height);
        let content_height = reader.layout.total_height();
        reader.viewport.resize(client_height, content_height);
    }

    // Scrolling

    fn after_scroll(&mut self) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let navigation = reader.session.on_scroll(
            &reader.layout,
            &reader.viewport,
            self.settings.infinite_scroll,
            &self.db,
        );
        if let Some(navigation) = navigation {
            self.follow(navigation);
        }
    }

    pub fn scroll_rows(&mut self, rows: i64) {
        let step = i64::from(self.cell_height());
        let moved = self
            .reader
            .as_mut()
            .is_some_and(|r| r.viewport.scroll_by(rows * step));
        if moved {
            self.after_scroll();
        }
    }

    pub fn scroll_screen(&mut self, screens: i64) {
        let Some(reader) = self.reader.as_ref() else {
            return;
        };
        let rows = (reader.viewport.client_height / self.cell_height()).saturating_sub(1).max(1);
        self.scroll_rows(screens * i64::from(rows));
    }

    pub fn scroll_to_top(&mut self) {
        let moved = self.reader.as_mut().is_some_and(|r| r.viewport.scroll_to(0));
        if moved {
            self.after_scroll();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        let moved = self
            .reader
            .as_mut()
            .is_some_and(|r| r.viewport.scroll_to(u32::MAX));
        if moved {
            self.after_scroll();
        }
    }

    fn apply_auto_scroll(&mut self, tick: AutoScrollTick) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if !reader.driver.accepts(&tick) {
            log::debug!("Ignoring auto-scroll tick from loop {}", tick.token);
            return;
        }
        if reader.viewport.scroll_by(i64::from(tick.delta)) {
            self.after_scroll();
        }
    }

    // Navigation

    fn follow(&mut self, navigation: Navigation) {
        match navigation {
            Navigation::Chapter {
                manga_id,
                chapter_id,
            } => self.open_reader(
                ReadRequest {
                    manga_id,
                    chapter_id: Some(chapter_id),
                },
                None,
            ),
            Navigation::Boundary(notice) => self.notify(notice.message()),
        }
    }

    pub fn navigate(&mut self, direction: Direction) {
        let navigation = self
            .reader
            .as_ref()
            .and_then(|r| r.session.navigate_to_chapter(direction));
        if let Some(navigation) = navigation {
            self.follow(navigation);
        }
    }

    pub fn go_to_page(&mut self, index: usize) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if !reader.session.navigate_to_page(index, &self.db) {
            return;
        }
        let Some(page) = reader.session.take_scroll_request() else {
            return;
        };
        let moved = reader
            .layout
            .page_top(page)
            .is_some_and(|top| reader.viewport.scroll_to(top));
        if moved {
            self.after_scroll();
        }
    }

    pub fn step_page(&mut self, forward: bool) {
        let Some(reader) = self.reader.as_ref() else {
            return;
        };
        let current = reader.session.current_page();
        let target = if forward {
            current + 1
        } else {
            match current.checked_sub(1) {
                Some(page) => page,
                None => return,
            }
        };
        self.go_to_page(target);
    }

    pub fn toggle_auto_scroll(&mut self) {
        let speed = self.settings.auto_scroll_speed;
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        if reader.session.toggle_auto_scroll() {
            reader.driver.start(speed);
        } else {
            reader.driver.stop();
        }
    }

    pub fn nudge_speed(&mut self, faster: bool) -> Result<()> {
        let delta = if faster { 1 } else { -1 };
        let settings = self
            .settings
            .with_speed(i64::from(self.settings.auto_scroll_speed) + delta);
        if settings != self.settings {
            self.apply_settings(settings)?;
        }
        self.notify(format!("Auto-scroll speed {}", settings.auto_scroll_speed));
        Ok(())
    }

    // Settings panel

    pub fn settings_open(&self) -> bool {
        self.reader.as_ref().is_some_and(|r| r.session.show_settings())
    }

    pub fn set_settings_open(&mut self, open: bool) {
        if let Some(reader) = self.reader.as_mut() {
            reader.session.set_show_settings(open);
        }
    }

    pub fn move_settings_row(&mut self, forward: bool) {
        let len = SettingsRow::ALL.len();
        self.settings_row = if forward {
            (self.settings_row + 1) % len
        } else {
            (self.settings_row + len - 1) % len
        };
    }

    /// Changes the highlighted setting by one step and persists it.
    pub fn adjust_setting(&mut self, increase: bool) -> Result<()> {
        let mut settings = self.settings;
        match SettingsRow::ALL[self.settings_row % SettingsRow::ALL.len()] {
            SettingsRow::Speed => {
                let delta = if increase { 1 } else { -1 };
                settings = settings.with_speed(i64::from(settings.auto_scroll_speed) + delta);
            }
            SettingsRow::InfiniteScroll => settings.infinite_scroll = !settings.infinite_scroll,
            SettingsRow::Quality => {
                settings.image_quality = if increase {
                    settings.image_quality.cycle()
                } else {
                    previous_quality(settings.image_quality)
                };
            }
        }
        self.apply_settings(settings)
    }

    pub fn apply_settings(&mut self, settings: ReaderSettings) -> Result<()> {
        let previous = self.settings;
        self.db.save_reader_settings(&settings)?;
        self.settings = settings;
        log::info!("Reader settings now {:?}", settings);

        if let Some(reader) = self.reader.as_mut() {
            reader.driver.set_speed(settings.auto_scroll_speed);
        }
        if previous.image_quality != settings.image_quality {
            let reloadable = self
                .reader
                .as_ref()
                .is_some_and(|r| r.session.state() != SessionState::ChapterNotFound);
            if reloadable {
                self.reload_reader();
                self.set_settings_open(true);
            }
        }
        Ok(())
    }
}

fn previous_quality(quality: ImageQuality) -> ImageQuality {
    let i = ImageQuality::ALL
        .iter()
        .position(|q| *q == quality)
        .unwrap_or(0);
    ImageQuality::ALL[(i + ImageQuality::ALL.len() - 1) % ImageQuality::ALL.len()]
}
