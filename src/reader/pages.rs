use super::retry::{retry_with_backoff, RetryPolicy};
use crate::api::{CatalogError, ChapterPageSet, ChapterSource};
use crate::db::ImageQuality;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PageError {
    /// `source` is the last failure, or `None` when every attempt came
    /// back without chapter data.
    #[error("could not resolve pages for chapter {chapter_id} after {attempts} attempts: {}", last_failure(.source))]
    ChapterResolution {
        chapter_id: String,
        attempts: u32,
        #[source]
        source: Option<CatalogError>,
    },
    #[error("chapter {chapter_id} has no pages")]
    EmptyChapter { chapter_id: String },
}

fn last_failure(source: &Option<CatalogError>) -> String {
    match source {
        Some(e) => e.to_string(),
        None => "exhausted retries, no chapter data returned".to_string(),
    }
}

impl PageError {
    /// False when the chapter itself has no pages; asking again won't help.
    pub fn is_transient(&self) -> bool {
        !matches!(self, PageError::EmptyChapter { .. })
    }
}

/// One of the two filename lists the at-home server publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageList {
    Data,
    DataSaver,
}

impl PageList {
    pub fn path_segment(self) -> &'static str {
        match self {
            PageList::Data => "data",
            PageList::DataSaver => "data-saver",
        }
    }

    fn other(self) -> Self {
        match self {
            PageList::Data => PageList::DataSaver,
            PageList::DataSaver => PageList::Data,
        }
    }
}

impl ImageQuality {
    pub fn preferred_list(self) -> PageList {
        match self {
            ImageQuality::Low | ImageQuality::Medium => PageList::DataSaver,
            ImageQuality::High => PageList::Data,
        }
    }
}

impl ChapterPageSet {
    pub fn filenames(&self, list: PageList) -> &[String] {
        match list {
            PageList::Data => &self.data,
            PageList::DataSaver => &self.data_saver,
        }
    }
}

/// The preferred list for `quality`, or the other one when the preferred
/// list is empty. `None` when both are empty.
pub fn select_pages(set: &ChapterPageSet, quality: ImageQuality) -> Option<(PageList, &[String])> {
    let preferred = quality.preferred_list();
    [preferred, preferred.other()]
        .into_iter()
        .map(|list| (list, set.filenames(list)))
        .find(|(_, filenames)| !filenames.is_empty())
}

/// `{base}/{data|data-saver}/{hash}/{filename}` in list order.
pub fn build_page_urls(set: &ChapterPageSet, list: PageList) -> Vec<String> {
    set.filenames(list)
        .iter()
        .map(|filename| {
            format!(
                "{}/{}/{}/{}",
                set.base_url,
                list.path_segment(),
                set.hash,
                filename
            )
        })
        .collect()
}

pub fn page_urls_for(
    chapter_id: &str,
    set: &ChapterPageSet,
    quality: ImageQuality,
) -> Result<Vec<String>, PageError> {
    let (list, _) = select_pages(set, quality).ok_or_else(|| PageError::EmptyChapter {
        chapter_id: chapter_id.to_string(),
    })?;
    if list != quality.preferred_list() {
        log::info!(
            "Chapter {} has no {} pages, using {}",
            chapter_id,
            quality.preferred_list().path_segment(),
            list.path_segment()
        );
    }
    Ok(build_page_urls(set, list))
}

/// Fetches the page set for `chapter_id` under `policy` and turns it into
/// ready-to-load image URLs.
pub async fn resolve_chapter_pages<S>(
    source: &S,
    chapter_id: &str,
    quality: ImageQuality,
    policy: RetryPolicy,
) -> Result<Vec<String>, PageError>
where
    S: ChapterSource + Sync,
{
    let label = format!("chapter {}", chapter_id);
    let set = retry_with_backoff(policy, &label, move |_| source.chapter_pages(chapter_id))
        .await
        .map_err(|exhausted| PageError::ChapterResolution {
            chapter_id: chapter_id.to_string(),
            attempts: exhausted.attempts,
            source: exhausted.last_error,
        })?;

    page_urls_for(chapter_id, &set, quality)
}
