use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Locale keys tried, in order, before falling back to any available entry.
pub const PREFERRED_LOCALES: &[&str] = &["en", "ja-ro"];

pub type LocalizedString = BTreeMap<String, String>;

/// Picks the first non-empty string for the preferred locales, then any
/// remaining non-empty entry.
pub fn pick_localized<'a>(map: &'a LocalizedString, preferred: &[&str]) -> Option<&'a str> {
    preferred
        .iter()
        .filter_map(|locale| map.get(*locale))
        .chain(map.values())
        .map(|s| s.as_str())
        .find(|s| !s.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manga {
    pub id: String,
    pub titles: LocalizedString,
    pub alt_titles: Vec<LocalizedString>,
    pub descriptions: LocalizedString,
    pub status: Option<String>,
    pub year: Option<i32>,
}

impl Manga {
    pub fn title(&self) -> &str {
        pick_localized(&self.titles, PREFERRED_LOCALES)
            .or_else(|| {
                self.alt_titles
                    .iter()
                    .find_map(|alt| pick_localized(alt, PREFERRED_LOCALES))
            })
            .unwrap_or(&self.id)
    }

    pub fn description(&self) -> Option<&str> {
        pick_localized(&self.descriptions, PREFERRED_LOCALES)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub id: String,
    /// Ordinal as published, e.g. `"12.5"`. `None` for oneshots and extras.
    pub number: Option<String>,
    pub volume: Option<String>,
    pub title: Option<String>,
    pub group: Option<String>,
    pub pages: u32,
    pub published_at: Option<DateTime<Utc>>,
}

impl Chapter {
    pub fn number_label(&self) -> &str {
        self.number.as_deref().unwrap_or("N/A")
    }

    pub fn display_title(&self) -> String {
        match self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(title) => title.to_string(),
            None => format!("Chapter {}", self.number_label()),
        }
    }
}

/// The at-home server answer for one chapter. Either list may be empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterPageSet {
    pub base_url: String,
    pub hash: String,
    pub data: Vec<String>,
    pub data_saver: Vec<String>,
}

// Wire types

#[derive(Deserialize)]
pub(crate) struct EntityResponse<T> {
    pub data: T,
}

#[derive(Deserialize)]
pub(crate) struct CollectionResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Deserialize)]
pub(crate) struct MangaData {
    id: String,
    attributes: MangaAttributes,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MangaAttributes {
    #[serde(default, deserialize_with = "localized")]
    title: LocalizedString,
    #[serde(default)]
    alt_titles: Vec<LocalizedString>,
    #[serde(default, deserialize_with = "localized")]
    description: LocalizedString,
    status: Option<String>,
    year: Option<i32>,
}

impl From<MangaData> for Manga {
    fn from(raw: MangaData) -> Self {
        Manga {
            id: raw.id,
            titles: raw.attributes.title,
            alt_titles: raw.attributes.alt_titles,
            descriptions: raw.attributes.description,
            status: raw.attributes.status,
            year: raw.attributes.year,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChapterAttributes {
    volume: Option<String>,
    chapter: Option<String>,
    title: Option<String>,
    #[serde(default)]
    pages: u32,
    publish_at: Option<String>,
}

#[derive(Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    kind: String,
    attributes: Option<serde_json::Value>,
}

impl From<ChapterData> for Chapter {
    fn from(raw: ChapterData) -> Self {
        let group = raw
            .relationships
            .iter()
            .find(|r| r.kind == "scanlation_group")
            .and_then(|r| r.attributes.as_ref())
            .and_then(|attrs| attrs.get("name"))
            .and_then(|name| name.as_str())
            .map(str::to_string);
        let published_at = raw
            .attributes
            .publish_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Chapter {
            id: raw.id,
            number: raw.attributes.chapter,
            volume: raw.attributes.volume,
            title: raw.attributes.title,
            group,
            pages: raw.attributes.pages,
            published_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AtHomeResponse {
    base_url: Option<String>,
    chapter: Option<AtHomeChapter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtHomeChapter {
    hash: String,
    data: Option<Vec<String>>,
    data_saver: Option<Vec<String>>,
}

impl AtHomeResponse {
    /// `None` when the payload parsed but carries no usable chapter data.
    pub(crate) fn into_page_set(self) -> Option<ChapterPageSet> {
        let base_url = self.base_url.filter(|u| !u.is_empty())?;
        let chapter = self.chapter?;
        Some(ChapterPageSet {
            base_url: base_url.trim_end_matches('/').to_string(),
            hash: chapter.hash,
            data: chapter.data.unwrap_or_default(),
            data_saver: chapter.data_saver.unwrap_or_default(),
        })
    }
}

/// MangaDex sends `[]` instead of `{}` for empty localized maps.
fn localized<'de, D>(deserializer: D) -> Result<LocalizedString, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let map = match value {
        serde_json::Value::Object(obj) => obj
            .into_iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
            .collect(),
        _ => LocalizedString::new(),
    };
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> LocalizedString {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn localized_prefers_english_then_romaji_then_anything() {
        let all = map(&[("ja", "ワンピース"), ("ja-ro", "Wan Piisu"), ("en", "One Piece")]);
        assert_eq!(pick_localized(&all, PREFERRED_LOCALES), Some("One Piece"));

        let romaji = map(&[("ja", "ワンピース"), ("ja-ro", "Wan Piisu")]);
        assert_eq!(pick_localized(&romaji, PREFERRED_LOCALES), Some("Wan Piisu"));

        let other = map(&[("ko", "원피스")]);
        assert_eq!(pick_localized(&other, PREFERRED_LOCALES), Some("원피스"));

        let blank_en = map(&[("en", " "), ("fr", "Une Pièce")]);
        assert_eq!(pick_localized(&blank_en, PREFERRED_LOCALES), Some("Une Pièce"));

        assert_eq!(pick_localized(&LocalizedString::new(), PREFERRED_LOCALES), None);
    }

    #[test]
    fn manga_title_falls_back_to_alt_titles_then_id() {
        let raw = r#"{
            "data": {
                "id": "m1",
                "attributes": {
                    "title": [],
                    "altTitles": [{"ja-ro": "Alt Romaji"}],
                    "description": [],
                    "status": "ongoing",
                    "year": null
                }
            }
        }"#;
        let parsed: EntityResponse<MangaData> = serde_json::from_str(raw).unwrap();
        let manga = Manga::from(parsed.data);
        assert_eq!(manga.title(), "Alt Romaji");
        assert_eq!(manga.description(), None);

        let bare = Manga {
            alt_titles: Vec::new(),
            ..manga
        };
        assert_eq!(bare.title(), "m1");
    }

    #[test]
    fn chapter_feed_keeps_upstream_order_and_group() {
        let raw = r#"{
            "result": "ok",
            "data": [
                {
                    "id": "c3",
                    "attributes": {"volume": "1", "chapter": "3", "title": "", "pages": 20,
                                   "publishAt": "2023-04-01T10:00:00+00:00"},
                    "relationships": [
                        {"id": "g1", "type": "scanlation_group", "attributes": {"name": "Team A"}}
                    ]
                },
                {
                    "id": "c2",
                    "attributes": {"volume": null, "chapter": null, "title": "Extra", "pages": 4},
                    "relationships": []
                }
            ]
        }"#;
        let parsed: CollectionResponse<ChapterData> = serde_json::from_str(raw).unwrap();
        let chapters: Vec<Chapter> = parsed.data.into_iter().map(Chapter::from).collect();

        assert_eq!(chapters[0].id, "c3");
        assert_eq!(chapters[0].group.as_deref(), Some("Team A"));
        assert_eq!(chapters[0].display_title(), "Chapter 3");
        assert!(chapters[0].published_at.is_some());
        assert_eq!(chapters[1].number_label(), "N/A");
        assert_eq!(chapters[1].display_title(), "Extra");
    }

    #[test]
    fn at_home_without_chapter_is_not_a_page_set() {
        let empty: AtHomeResponse =
            serde_json::from_str(r#"{"result": "ok", "baseUrl": "https://x"}"#).unwrap();
        assert!(empty.into_page_set().is_none());

        let partial: AtHomeResponse = serde_json::from_str(
            r#"{"baseUrl": "https://x/", "chapter": {"hash": "h", "data": ["1.png"]}}"#,
        )
        .unwrap();
        let set = partial.into_page_set().unwrap();
        assert_eq!(set.base_url, "https://x");
        assert_eq!(set.data, vec!["1.png"]);
        assert!(set.data_saver.is_empty());
    }
}
