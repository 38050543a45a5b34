//! In-memory stand-ins for the catalog and the preference store.

use crate::api::{CatalogError, Chapter, ChapterPageSet, ChapterSource, Manga};
use crate::db::{PreferenceStore, ReaderSettings, User};
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn chapter(id: &str, number: Option<&str>) -> Chapter {
    Chapter {
        id: id.to_string(),
        number: number.map(str::to_string),
        volume: None,
        title: None,
        group: None,
        pages: 0,
        published_at: None,
    }
}

type PageScript = VecDeque<Result<Option<ChapterPageSet>, CatalogError>>;

#[derive(Default)]
pub struct FakeCatalog {
    manga: Option<Manga>,
    chapters: Vec<Chapter>,
    pages: Mutex<PageScript>,
    requested: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with_chapters(chapters: Vec<Chapter>) -> Self {
        Self {
            chapters,
            ..Self::default()
        }
    }

    pub fn with_manga(mut self, manga: Manga) -> Self {
        self.manga = Some(manga);
        self
    }

    /// Answers for successive `chapter_pages` calls. Once used up, every
    /// call comes back empty.
    pub fn script_pages(&self, answers: Vec<Result<Option<ChapterPageSet>, CatalogError>>) {
        *self.pages.lock().unwrap() = answers.into();
    }

    pub fn page_calls(&self) -> usize {
        self.requested.lock().unwrap().len()
    }

    pub fn requested_pages(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn not_found(what: &str) -> CatalogError {
        CatalogError::Status {
            url: format!("fake://{}", what),
            status: StatusCode::NOT_FOUND,
        }
    }
}

impl ChapterSource for FakeCatalog {
    async fn manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
        self.manga
            .clone()
            .filter(|m| m.id == manga_id)
            .ok_or_else(|| Self::not_found(manga_id))
    }

    async fn list_chapters(&self, _manga_id: &str, _language: &str) -> Result<Vec<Chapter>, CatalogError> {
        Ok(self.chapters.clone())
    }

    async fn chapter_pages(&self, chapter_id: &str) -> Result<Option<ChapterPageSet>, CatalogError> {
        self.requested.lock().unwrap().push(chapter_id.to_string());
        self.pages.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
pub struct RecordingStore {
    user: Option<User>,
    settings: ReaderSettings,
    writes: Mutex<Vec<(String, String, usize)>>,
}

impl RecordingStore {
    pub fn logged_in() -> Self {
        Self {
            user: Some(User {
                id: "user-1".to_string(),
                username: "reader".to_string(),
                name: "reader".to_string(),
                email: None,
            }),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(String, String, usize)> {
        self.writes.lock().unwrap().clone()
    }
}

impl PreferenceStore for RecordingStore {
    fn reader_settings(&self) -> anyhow::Result<ReaderSettings> {
        Ok(self.settings)
    }

    fn current_user(&self) -> anyhow::Result<Option<User>> {
        Ok(self.user.clone())
    }

    fn update_last_read(&self, manga_id: &str, chapter_id: &str, page: usize) -> anyhow::Result<bool> {
        self.writes
            .lock()
            .unwrap()
            .push((manga_id.to_string(), chapter_id.to_string(), page));
        Ok(true)
    }
}
