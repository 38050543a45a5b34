use super::pages::{resolve_chapter_pages, PageError};
use super::retry::RetryPolicy;
use super::tracker::{PageLayout, ScrollTracker, Viewport};
use crate::api::{Chapter, ChapterSource, Manga};
use crate::db::{ImageQuality, PreferenceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Ready,
    ChapterNotFound,
    PagesUnavailable,
}

/// Reading direction through the story. Chapters are listed newest-first,
/// so `Next` walks towards index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryNotice {
    FirstChapter,
    LastChapter,
}

impl BoundaryNotice {
    pub fn message(self) -> &'static str {
        match self {
            BoundaryNotice::FirstChapter => "This is the first chapter",
            BoundaryNotice::LastChapter => "You've reached the latest chapter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Open a new session on this chapter.
    Chapter { manga_id: String, chapter_id: String },
    Boundary(BoundaryNotice),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub manga_id: String,
    /// `None` starts from the oldest chapter available.
    pub chapter_id: Option<String>,
}

#[derive(Debug)]
pub enum LoadOutcome {
    ChapterNotFound {
        manga: Option<Manga>,
        chapters: Vec<Chapter>,
    },
    PagesUnavailable {
        manga: Option<Manga>,
        chapters: Vec<Chapter>,
        chapter: Chapter,
        error: PageError,
    },
    Ready {
        manga: Option<Manga>,
        chapters: Vec<Chapter>,
        chapter: Chapter,
        pages: Vec<String>,
    },
}

/// Loads everything a reader session needs, in order: manga metadata, the
/// chapter list, then (once the chapter is known to exist) its pages.
pub async fn load_chapter<S>(
    source: &S,
    request: &ReadRequest,
    language: &str,
    quality: ImageQuality,
    policy: RetryPolicy,
) -> LoadOutcome
where
    S: ChapterSource + Sync,
{
    let manga = match source.manga(&request.manga_id).await {
        Ok(manga) => Some(manga),
        Err(e) => {
            log::warn!("Failed to fetch manga {}: {}", request.manga_id, e);
            None
        }
    };

    let chapters = match source.list_chapters(&request.manga_id, language).await {
        Ok(chapters) => chapters,
        Err(e) => {
            log::error!("Failed to fetch chapters for {}: {}", request.manga_id, e);
            Vec::new()
        }
    };

    let chapter = match request.chapter_id {
        Some(ref id) => chapters.iter().find(|c| &c.id == id),
        None => chapters.last(),
    }
    .cloned();

    let Some(chapter) = chapter else {
        log::warn!(
            "Chapter {:?} not found among {} chapters of {}",
            request.chapter_id,
            chapters.len(),
            request.manga_id
        );
        return LoadOutcome::ChapterNotFound { manga, chapters };
    };

    match resolve_chapter_pages(source, &chapter.id, quality, policy).await {
        Ok(pages) => LoadOutcome::Ready {
            manga,
            chapters,
            chapter,
            pages,
        },
        Err(error) => {
            log::error!("Failed to fetch chapter pages: {}", error);
            LoadOutcome::PagesUnavailable {
                manga,
                chapters,
                chapter,
                error,
            }
        }
    }
}

/// State of one mounted reader: which chapter, which pages, where the reader
/// is. Async results are applied through `apply_*` and are ignored unless
/// they carry this session's id.
#[derive(Debug)]
pub struct ReaderSession {
    id: u64,
    request: ReadRequest,
    state: SessionState,
    manga: Option<Manga>,
    chapter: Option<Chapter>,
    chapters: Vec<Chapter>,
    pages: Vec<String>,
    current_page: usize,
    auto_scrolling: bool,
    show_settings: bool,
    error: Option<String>,
    error_is_transient: bool,
    scroll_request: Option<usize>,
    last_saved_page: Option<usize>,
    tracker: ScrollTracker,
}

impl ReaderSession {
    pub fn new(id: u64, request: ReadRequest, advance_threshold_px: u32) -> Self {
        Self {
            id,
            request,
            state: SessionState::Loading,
            manga: None,
            chapter: None,
            chapters: Vec::new(),
            pages: Vec::new(),
            current_page: 0,
            auto_scrolling: false,
            show_settings: false,
            error: None,
            error_is_transient: true,
            scroll_request: None,
            last_saved_page: None,
            tracker: ScrollTracker::new(advance_threshold_px),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &ReadRequest {
        &self.request
    }

    pub fn manga_id(&self) -> &str {
        &self.request.manga_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn chapter(&self) -> Option<&Chapter> {
        self.chapter.as_ref()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn auto_scrolling(&self) -> bool {
        self.auto_scrolling
    }

    pub fn show_settings(&self) -> bool {
        self.show_settings
    }

    /// Why the pages could not be shown, for the fallback view.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// False when the upstream says the chapter has no pages at all.
    pub fn error_is_transient(&self) -> bool {
        self.error_is_transient
    }

    pub fn title(&self) -> &str {
        self.manga
            .as_ref()
            .map(|m| m.title())
            .unwrap_or(&self.request.manga_id)
    }

    pub fn chapter_index(&self) -> Option<usize> {
        let chapter = self.chapter.as_ref()?;
        self.chapters.iter().position(|c| c.id == chapter.id)
    }

    pub fn has_next_chapter(&self) -> bool {
        self.chapter_index().is_some_and(|i| i > 0)
    }

    pub fn has_prev_chapter(&self) -> bool {
        self.chapter_index()
            .is_some_and(|i| i + 1 < self.chapters.len())
    }

    fn owns(&self, session_id: u64, what: &str) -> bool {
        if session_id != self.id {
            log::debug!(
                "Discarding stale {} for session {} (current {})",
                what,
                session_id,
                self.id
            );
            return false;
        }
        true
    }

    /// Applies the result of `load_chapter`. Returns false for a stale result.
    pub fn apply_load(&mut self, session_id: u64, outcome: LoadOutcome) -> bool {
        if !self.owns(session_id, "chapter load") || self.state != SessionState::Loading {
            return false;
        }
        match outcome {
            LoadOutcome::ChapterNotFound { manga, chapters } => {
                self.manga = manga;
                self.chapters = chapters;
                self.chapter = None;
                self.state = SessionState::ChapterNotFound;
            }
            LoadOutcome::PagesUnavailable {
                manga,
                chapters,
                chapter,
                error,
            } => {
                self.manga = manga;
                self.chapters = chapters;
                self.chapter = Some(chapter);
                self.fail_pages(error);
            }
            LoadOutcome::Ready {
                manga,
                chapters,
                chapter,
                pages,
            } => {
                self.manga = manga;
                self.chapters = chapters;
                self.chapter = Some(chapter);
                self.show_pages(pages);
            }
        }
        log::info!("Session {} is now {:?}", self.id, self.state);
        true
    }

    /// Applies a page re-resolution started by `retry_load`.
    pub fn apply_pages(&mut self, session_id: u64, result: Result<Vec<String>, PageError>) -> bool {
        if !self.owns(session_id, "page retry") || self.state != SessionState::Loading {
            return false;
        }
        match result {
            Ok(pages) => self.show_pages(pages),
            Err(error) => self.fail_pages(error),
        }
        log::info!("Session {} is now {:?}", self.id, self.state);
        true
    }

    fn show_pages(&mut self, pages: Vec<String>) {
        if pages.is_empty() {
            self.error = Some("No pages found in chapter data".to_string());
            self.error_is_transient = false;
            self.state = SessionState::PagesUnavailable;
            return;
        }
        self.pages = pages;
        self.current_page = 0;
        self.error = None;
        self.state = SessionState::Ready;
    }

    fn fail_pages(&mut self, error: PageError) {
        self.pages.clear();
        self.error_is_transient = error.is_transient();
        self.error = Some(error.to_string());
        self.auto_scrolling = false;
        self.state = SessionState::PagesUnavailable;
    }

    /// Goes back to `Loading` from the fallback view. Returns the chapter
    /// whose pages should be fetched again.
    pub fn retry_load(&mut self) -> Option<String> {
        if self.state != SessionState::PagesUnavailable {
            return None;
        }
        let chapter_id = self.chapter.as_ref()?.id.clone();
        self.state = SessionState::Loading;
        self.error = None;
        log::info!("Session {} retrying chapter {}", self.id, chapter_id);
        Some(chapter_id)
    }

    /// `None` while there is no chapter to navigate from.
    pub fn navigate_to_chapter(&self, direction: Direction) -> Option<Navigation> {
        let index = self.chapter_index()?;
        let target = match direction {
            Direction::Next => index.checked_sub(1),
            Direction::Prev => Some(index + 1).filter(|i| *i < self.chapters.len()),
        };

        Some(match target {
            Some(i) => Navigation::Chapter {
                manga_id: self.request.manga_id.clone(),
                chapter_id: self.chapters[i].id.clone(),
            },
            None => Navigation::Boundary(match direction {
                Direction::Next => BoundaryNotice::LastChapter,
                Direction::Prev => BoundaryNotice::FirstChapter,
            }),
        })
    }

    /// Jumps to `index` and asks the view to bring that page into sight.
    pub fn navigate_to_page(&mut self, index: usize, store: &dyn PreferenceStore) -> bool {
        if index >= self.pages.len() {
            return false;
        }
        self.set_current_page(index, store);
        self.scroll_request = Some(index);
        true
    }

    /// Pending "scroll page into view" request, consumed by the view.
    pub fn take_scroll_request(&mut self) -> Option<usize> {
        self.scroll_request.take()
    }

    fn set_current_page(&mut self, index: usize, store: &dyn PreferenceStore) {
        if index == self.current_page {
            return;
        }
        self.current_page = index;
        self.save_progress(store);
    }

    fn save_progress(&mut self, store: &dyn PreferenceStore) {
        if self.state != SessionState::Ready || self.pages.is_empty() || self.current_page == 0 {
            return;
        }
        if self.last_saved_page == Some(self.current_page) {
            return;
        }
        let Some(ref chapter) = self.chapter else {
            return;
        };
        match store.current_user() {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(e) => {
                log::warn!("Could not read current user: {}", e);
                return;
            }
        }

        match store.update_last_read(&self.request.manga_id, &chapter.id, self.current_page) {
            Ok(merged) => {
                self.last_saved_page = Some(self.current_page);
                log::debug!(
                    "Progress {} / {} page {} (in library: {})",
                    self.request.manga_id,
                    chapter.id,
                    self.current_page,
                    merged
                );
            }
            Err(e) => log::warn!("Failed to save reading progress: {}", e),
        }
    }

    pub fn toggle_auto_scroll(&mut self) -> bool {
        self.auto_scrolling = !self.auto_scrolling && self.state == SessionState::Ready;
        self.auto_scrolling
    }

    pub fn set_show_settings(&mut self, show: bool) {
        self.show_settings = show;
    }

    /// Scroll handler: updates the current page from the viewport and
    /// returns the next chapter when infinite scroll should roll over.
    pub fn on_scroll(
        &mut self,
        layout: &PageLayout,
        viewport: &Viewport,
        infinite_scroll: bool,
        store: &dyn PreferenceStore,
    ) -> Option<Navigation> {
        let can_advance = self.state == SessionState::Ready && self.has_next_chapter();
        let observation = self
            .tracker
            .on_scroll(layout, viewport, infinite_scroll, can_advance);

        if !self.pages.is_empty() {
            if let Some(page) = observation.current_page {
                self.set_current_page(page, store);
            }
        }

        if observation.advance {
            log::info!("Infinite scroll: moving on from session {}", self.id);
            return self.navigate_to_chapter(Direction::Next);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CatalogError, ChapterPageSet};
    use crate::reader::fake::{chapter, FakeCatalog, RecordingStore};
    use reqwest::StatusCode;

    fn chapters() -> Vec<Chapter> {
        vec![chapter("c3", Some("3")), chapter("c2", Some("2")), chapter("c1", Some("1"))]
    }

    fn ready_session(current: &str, pages: usize) -> ReaderSession {
        let mut session = ReaderSession::new(
            1,
            ReadRequest {
                manga_id: "m1".to_string(),
                chapter_id: Some(current.to_string()),
            },
            200,
        );
        let all = chapters();
        let chapter = all.iter().find(|c| c.id == current).cloned().unwrap();
        let pages = (0..pages).map(|i| format!("https://x/data/h/{}.png", i)).collect();
        assert!(session.apply_load(
            1,
            LoadOutcome::Ready {
                manga: None,
                chapters: all,
                chapter,
                pages,
            },
        ));
        session
    }

    fn page_set() -> ChapterPageSet {
        ChapterPageSet {
            base_url: "https://x".to_string(),
            hash: "h".to_string(),
            data: vec!["1.png".to_string(), "2.png".to_string()],
            data_saver: vec![],
        }
    }

    fn request(chapter_id: Option<&str>) -> ReadRequest {
        ReadRequest {
            manga_id: "m1".to_string(),
            chapter_id: chapter_id.map(str::to_string),
        }
    }

    #[test]
    fn next_walks_towards_newer_chapters() {
        let session = ready_session("c2", 3);
        assert_eq!(
            session.navigate_to_chapter(Direction::Next),
            Some(Navigation::Chapter {
                manga_id: "m1".to_string(),
                chapter_id: "c3".to_string()
            })
        );

        let newest = ready_session("c3", 3);
        assert_eq!(
            newest.navigate_to_chapter(Direction::Prev),
            Some(Navigation::Chapter {
                manga_id: "m1".to_string(),
                chapter_id: "c2".to_string()
            })
        );
    }

    #[test]
    fn prev_walks_towards_older_chapters() {
        let session = ready_session("c2", 3);
        assert_eq!(
            session.navigate_to_chapter(Direction::Prev),
            Some(Navigation::Chapter {
                manga_id: "m1".to_string(),
                chapter_id: "c1".to_string()
            })
        );
    }

    #[test]
    fn boundaries_produce_notices_without_state_change() {
        let newest = ready_session("c3", 3);
        assert_eq!(
            newest.navigate_to_chapter(Direction::Next),
            Some(Navigation::Boundary(BoundaryNotice::LastChapter))
        );
        assert_eq!(newest.chapter().unwrap().id, "c3");

        let oldest = ready_session("c1", 3);
        assert_eq!(
            oldest.navigate_to_chapter(Direction::Prev),
            Some(Navigation::Boundary(BoundaryNotice::FirstChapter))
        );
        assert_eq!(oldest.chapter().unwrap().id, "c1");
        assert!(!oldest.has_prev_chapter());
        assert!(oldest.has_next_chapter());
        // the oldest chapter is not a boundary going forward
        assert_eq!(
            oldest.navigate_to_chapter(Direction::Next),
            Some(Navigation::Chapter {
                manga_id: "m1".to_string(),
                chapter_id: "c2".to_string()
            })
        );
    }

    #[test]
    fn navigate_to_page_is_bounded_and_idempotent() {
        let store = RecordingStore::logged_in();
        let mut session = ready_session("c2", 3);

        assert!(!session.navigate_to_page(3, &store));
        assert_eq!(session.current_page(), 0);

        assert!(session.navigate_to_page(2, &store));
        assert!(session.navigate_to_page(2, &store));
        assert_eq!(session.current_page(), 2);
        assert_eq!(store.writes(), vec![("m1".to_string(), "c2".to_string(), 2)]);
        assert_eq!(session.take_scroll_request(), Some(2));
        assert_eq!(session.take_scroll_request(), None);
    }

    #[test]
    fn progress_needs_a_user_and_a_page_past_the_first() {
        let anonymous = RecordingStore::default();
        let mut session = ready_session("c2", 3);
        session.navigate_to_page(1, &anonymous);
        assert!(anonymous.writes().is_empty());

        let store = RecordingStore::logged_in();
        let mut session = ready_session("c2", 3);
        session.navigate_to_page(0, &store);
        assert!(store.writes().is_empty());
        session.navigate_to_page(1, &store);
        session.navigate_to_page(0, &store);
        assert_eq!(store.writes().len(), 1);
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut session = ReaderSession::new(7, request(Some("c2")), 200);
        let applied = session.apply_load(
            6,
            LoadOutcome::ChapterNotFound {
                manga: None,
                chapters: Vec::new(),
            },
        );
        assert!(!applied);
        assert_eq!(session.state(), SessionState::Loading);
        assert!(!session.apply_pages(6, Ok(vec!["https://x/1.png".to_string()])));
    }

    #[test]
    fn failed_pages_can_be_retried() {
        let mut session = ReaderSession::new(1, request(Some("c2")), 200);
        session.apply_load(
            1,
            LoadOutcome::PagesUnavailable {
                manga: None,
                chapters: chapters(),
                chapter: chapter("c2", Some("2")),
                error: PageError::ChapterResolution {
                    chapter_id: "c2".to_string(),
                    attempts: 3,
                    source: None,
                },
            },
        );
        assert_eq!(session.state(), SessionState::PagesUnavailable);
        assert!(session.error().is_some());
        assert!(!session.toggle_auto_scroll());

        assert_eq!(session.retry_load(), Some("c2".to_string()));
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(session.retry_load(), None);

        assert!(session.apply_pages(1, Ok(vec!["https://x/data/h/1.png".to_string()])));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.pages().len(), 1);
    }

    #[test]
    fn chapter_not_found_offers_no_retry() {
        let mut session = ReaderSession::new(1, request(Some("zz")), 200);
        session.apply_load(
            1,
            LoadOutcome::ChapterNotFound {
                manga: None,
                chapters: chapters(),
            },
        );
        assert_eq!(session.state(), SessionState::ChapterNotFound);
        assert_eq!(session.retry_load(), None);
        assert_eq!(session.navigate_to_chapter(Direction::Next), None);
    }

    #[test]
    fn infinite_scroll_rolls_over_once() {
        let store = RecordingStore::logged_in();
        let mut session = ready_session("c2", 3);
        let layout = PageLayout::new([1000, 1000, 1000], 0);
        let near_end = Viewport {
            scroll_top: 2100,
            client_height: 800,
            scroll_height: 3000,
        };

        let first = session.on_scroll(&layout, &near_end, true, &store);
        assert_eq!(
            first,
            Some(Navigation::Chapter {
                manga_id: "m1".to_string(),
                chapter_id: "c3".to_string()
            })
        );
        assert_eq!(session.current_page(), 2);
        assert_eq!(session.on_scroll(&layout, &near_end, true, &store), None);
    }

    #[test]
    fn infinite_scroll_stops_at_newest_chapter() {
        let store = RecordingStore::default();
        let mut session = ready_session("c3", 3);
        let layout = PageLayout::new([1000, 1000, 1000], 0);
        let near_end = Viewport {
            scroll_top: 2200,
            client_height: 800,
            scroll_height: 3000,
        };
        assert_eq!(session.on_scroll(&layout, &near_end, true, &store), None);
    }

    #[test]
    fn auto_scroll_only_toggles_when_ready() {
        let mut loading = ReaderSession::new(1, request(Some("c2")), 200);
        assert!(!loading.toggle_auto_scroll());

        let mut session = ready_session("c2", 2);
        assert!(session.toggle_auto_scroll());
        assert!(!session.toggle_auto_scroll());
        session.set_show_settings(true);
        assert!(session.show_settings());
    }

    #[tokio::test(start_paused = true)]
    async fn load_resolves_chapter_then_pages() {
        let catalog = FakeCatalog::with_chapters(chapters());
        catalog.script_pages(vec![Ok(Some(page_set()))]);

        let outcome = load_chapter(
            &catalog,
            &request(Some("c2")),
            "en",
            ImageQuality::High,
            RetryPolicy::default(),
        )
        .await;
        match outcome {
            LoadOutcome::Ready { chapter, pages, .. } => {
                assert_eq!(chapter.id, "c2");
                assert_eq!(pages, vec!["https://x/data/h/1.png", "https://x/data/h/2.png"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(catalog.requested_pages(), vec!["c2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn load_without_chapter_starts_at_the_oldest() {
        let catalog = FakeCatalog::with_chapters(chapters());
        catalog.script_pages(vec![Ok(Some(page_set()))]);

        let outcome = load_chapter(
            &catalog,
            &request(None),
            "en",
            ImageQuality::Low,
            RetryPolicy::default(),
        )
        .await;
        assert!(matches!(outcome, LoadOutcome::Ready { ref chapter, .. } if chapter.id == "c1"));
    }

    #[tokio::test(start_paused = true)]
    async fn manga_metadata_names_the_session() {
        let manga = Manga {
            id: "m1".to_string(),
            titles: [("en".to_string(), "Blue Period".to_string())].into(),
            alt_titles: Vec::new(),
            descriptions: Default::default(),
            status: None,
            year: None,
        };
        let catalog = FakeCatalog::with_chapters(chapters()).with_manga(manga);
        catalog.script_pages(vec![Ok(Some(page_set()))]);

        let outcome = load_chapter(
            &catalog,
            &request(Some("c3")),
            "en",
            ImageQuality::High,
            RetryPolicy::default(),
        )
        .await;
        let mut session = ReaderSession::new(2, request(Some("c3")), 200);
        assert_eq!(session.title(), "m1");
        session.apply_load(2, outcome);
        assert_eq!(session.title(), "Blue Period");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_chapter_never_asks_for_pages() {
        let catalog = FakeCatalog::with_chapters(chapters());

        let outcome = load_chapter(
            &catalog,
            &request(Some("nope")),
            "en",
            ImageQuality::Low,
            RetryPolicy::default(),
        )
        .await;
        assert!(matches!(outcome, LoadOutcome::ChapterNotFound { .. }));
        assert_eq!(catalog.page_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_pages_end_unavailable() {
        let catalog = FakeCatalog::with_chapters(chapters());
        catalog.script_pages(vec![
            Err(CatalogError::Status {
                url: "https://x".to_string(),
                status: StatusCode::BAD_GATEWAY,
            }),
            Ok(None),
            Ok(None),
        ]);

        let outcome = load_chapter(
            &catalog,
            &request(Some("c1")),
            "en",
            ImageQuality::Low,
            RetryPolicy::default(),
        )
        .await;
        let mut session = ReaderSession::new(3, request(Some("c1")), 200);
        session.apply_load(3, outcome);
        assert_eq!(session.state(), SessionState::PagesUnavailable);
        assert!(session.error_is_transient());
        assert_eq!(session.chapter().unwrap().id, "c1");
    }
}
