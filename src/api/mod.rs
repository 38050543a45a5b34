pub mod models;

pub use models::{Chapter, ChapterPageSet, Manga};

use crate::config::AppConfig;
use models::{AtHomeResponse, ChapterData, CollectionResponse, EntityResponse, MangaData};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("mangaverse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("unexpected payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The two catalog calls the reader depends on, plus manga metadata.
///
/// `chapter_pages` returns `Ok(None)` when the upstream answered with a
/// well-formed but empty payload; callers treat that as a failed attempt.
pub trait ChapterSource {
    fn manga(&self, manga_id: &str) -> impl Future<Output = Result<Manga, CatalogError>> + Send;

    fn list_chapters(
        &self,
        manga_id: &str,
        language: &str,
    ) -> impl Future<Output = Result<Vec<Chapter>, CatalogError>> + Send;

    fn chapter_pages(
        &self,
        chapter_id: &str,
    ) -> impl Future<Output = Result<Option<ChapterPageSet>, CatalogError>> + Send;
}

#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    feed_limit: u32,
}

impl CatalogClient {
    pub fn new(config: &AppConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key().map(str::to_string),
            feed_limit: config.feed_limit,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key {
            Some(ref key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        log::debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(url))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Catalog error: {} {}", status, url);
            return Err(CatalogError::Status {
                url: url.to_string(),
                status,
            });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get_manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
        let url = format!("{}/manga/{}", self.base_url, manga_id);
        let query = [
            ("includes[]", "cover_art".to_string()),
            ("includes[]", "author".to_string()),
            ("includes[]", "artist".to_string()),
        ];
        let body: EntityResponse<MangaData> = self.get_json(&url, &query).await?;
        Ok(body.data.into())
    }

    /// Chapters newest-first, the order the reader navigates in.
    pub async fn get_chapters(
        &self,
        manga_id: &str,
        language: &str,
    ) -> Result<Vec<Chapter>, CatalogError> {
        let url = format!("{}/manga/{}/feed", self.base_url, manga_id);
        let query = [
            ("translatedLanguage[]", language.to_string()),
            ("order[volume]", "desc".to_string()),
            ("order[chapter]", "desc".to_string()),
            ("includes[]", "scanlation_group".to_string()),
            ("limit", self.feed_limit.to_string()),
        ];
        let body: CollectionResponse<ChapterData> = self.get_json(&url, &query).await?;
        Ok(body.data.into_iter().map(Chapter::from).collect())
    }

    /// Asks the at-home server for a chapter's page files. An authenticated
    /// request that is refused is repeated once without credentials.
    pub async fn get_chapter_pages(
        &self,
        chapter_id: &str,
    ) -> Result<Option<ChapterPageSet>, CatalogError> {
        let url = format!("{}/at-home/server/{}", self.base_url, chapter_id);

        let mut response = self.authorized(self.client.get(&url)).send().await?;
        if !response.status().is_success() && self.api_key.is_some() {
            log::warn!(
                "Authenticated request failed for chapter {} ({}), trying without auth",
                chapter_id,
                response.status()
            );
            response = self.client.get(&url).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status { url, status });
        }
        let text = response.text().await?;
        let body: AtHomeResponse = serde_json::from_str(&text)?;
        Ok(body.into_page_set())
    }

    pub async fn fetch_page_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl ChapterSource for CatalogClient {
    async fn manga(&self, manga_id: &str) -> Result<Manga, CatalogError> {
        self.get_manga(manga_id).await
    }

    async fn list_chapters(
        &self,
        manga_id: &str,
        language: &str,
    ) -> Result<Vec<Chapter>, CatalogError> {
        self.get_chapters(manga_id, language).await
    }

    async fn chapter_pages(&self, chapter_id: &str) -> Result<Option<ChapterPageSet>, CatalogError> {
        self.get_chapter_pages(chapter_id).await
    }
}
