use crate::api::{CatalogClient, CatalogError};
use image::imageops::FilterType;
use image::DynamicImage;
use ratatui::layout::Rect;
use ratatui_image::picker::Picker;
use ratatui_image::protocol::Protocol;
use ratatui_image::Resize;
use std::future::Future;
use tokio::task::JoinHandle;

/// Aspect ratio assumed for a page until its image arrives.
pub const PLACEHOLDER_SIZE: (u32, u32) = (800, 1200);

pub trait PageImageSource {
    fn fetch_image(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, CatalogError>> + Send;
}

impl PageImageSource for CatalogClient {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
        self.fetch_page_image(url).await
    }
}

/// The rows of a page that are on screen, in text cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub cols: u16,
    /// Height of the whole page.
    pub page_rows: u32,
    /// Rows scrolled off above the viewport.
    pub skip: u32,
    pub rows: u32,
}

impl Band {
    /// Source pixel rows `[top, bottom)` shown by this band on a page
    /// `height` pixels tall.
    pub fn source_rows(&self, height: u32) -> (u32, u32) {
        let page_rows = u64::from(self.page_rows.max(1));
        let height = u64::from(height);
        let top = (u64::from(self.skip) * height / page_rows).min(height);
        let bottom = (u64::from(self.skip + self.rows) * height)
            .div_ceil(page_rows)
            .min(height);
        (top as u32, bottom.max(top + 1) as u32)
    }
}

pub struct PageImage {
    source: DynamicImage,
    band: Option<(Band, Protocol)>,
}

impl PageImage {
    pub fn new(source: DynamicImage) -> Self {
        Self { source, band: None }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.source.width(), self.source.height())
    }

    /// Encodes the visible part of the page for the terminal. The last band
    /// is kept so an unmoved page is not encoded again.
    pub fn band(&mut self, picker: &Picker, band: Band) -> Option<&Protocol> {
        let stale = self.band.as_ref().is_none_or(|(key, _)| *key != band);
        if stale {
            let (top, bottom) = band.source_rows(self.source.height());
            let crop = self.source.crop_imm(0, top, self.source.width(), bottom - top);
            let rows = u16::try_from(band.rows).unwrap_or(u16::MAX);
            let area = Rect::new(0, 0, band.cols, rows);
            self.band = match picker.new_protocol(crop, area, Resize::Fit(Some(FilterType::Triangle))) {
                Ok(protocol) => Some((band, protocol)),
                Err(e) => {
                    log::debug!("Could not encode page band {:?}: {:?}", band, e);
                    None
                }
            };
        }
        self.band.as_ref().map(|(_, protocol)| protocol)
    }
}

pub enum PageSlot {
    Pending,
    Loaded(PageImage),
    Failed(String),
}

impl PageSlot {
    fn size(&self) -> (u32, u32) {
        match self {
            PageSlot::Loaded(image) => image.size(),
            _ => PLACEHOLDER_SIZE,
        }
    }
}

fn scaled_pixel_height(cols: u32, width: u32, height: u32) -> u32 {
    let width = width.max(1) as u64;
    ((cols as u64 * height as u64).div_ceil(width)).clamp(1, u32::MAX as u64) as u32
}

/// Text rows a page occupies when drawn `cols` wide, for cells twice as
/// tall as they are wide.
pub fn rows_for(cols: u16, (width, height): (u32, u32)) -> u32 {
    scaled_pixel_height(u32::from(cols.max(1)), width, height).div_ceil(2)
}

/// Decoded pages of the open chapter, in reading order.
pub struct PageStrip {
    slots: Vec<PageSlot>,
}

impl PageStrip {
    pub fn new(pages: usize) -> Self {
        Self {
            slots: (0..pages).map(|_| PageSlot::Pending).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut PageSlot> {
        self.slots.get_mut(index)
    }

    pub fn loaded(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, PageSlot::Loaded(_)))
            .count()
    }

    /// Stores a fetch result. Returns true when the page height may have
    /// changed and the layout needs rebuilding.
    pub fn apply(&mut self, index: usize, result: Result<DynamicImage, String>) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        *slot = match result {
            Ok(image) => PageSlot::Loaded(PageImage::new(image)),
            Err(e) => PageSlot::Failed(e),
        };
        matches!(slot, PageSlot::Loaded(_))
    }

    /// Row heights of every page in text rows at `cols` wide.
    pub fn row_heights(&self, cols: u16) -> Vec<u32> {
        self.slots.iter().map(|s| rows_for(cols, s.size())).collect()
    }
}

#[derive(Debug)]
pub struct PageFetched {
    pub session_id: u64,
    pub index: usize,
    pub result: Result<DynamicImage, String>,
}

/// Downloads and decodes `urls` one after another, handing each page to
/// `emit`. Returning false from `emit` stops the loader.
pub fn spawn_page_loader<S, F>(source: S, session_id: u64, urls: Vec<String>, emit: F) -> JoinHandle<()>
where
    S: PageImageSource + Send + Sync + 'static,
    F: Fn(PageFetched) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        for (index, url) in urls.into_iter().enumerate() {
            let result = load_page(&source, &url).await;
            if let Err(ref e) = result {
                log::warn!("Page {} of session {} failed: {}", index + 1, session_id, e);
            }
            if !emit(PageFetched {
                session_id,
                index,
                result,
            }) {
                break;
            }
        }
        log::debug!("Page loader for session {} finished", session_id);
    })
}

async fn load_page<S: PageImageSource>(source: &S, url: &str) -> Result<DynamicImage, String> {
    let bytes = source.fetch_image(url).await.map_err(|e| e.to_string())?;
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| format!("could not decode {}: {}", url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use reqwest::StatusCode;
    use std::io::Cursor;
    use tokio::sync::mpsc::unbounded_channel;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 10, 10]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    struct FakeImages;

    impl PageImageSource for FakeImages {
        async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, CatalogError> {
            match url {
                "wide" => Ok(png(20, 10)),
                "garbage" => Ok(b"not an image".to_vec()),
                _ => Err(CatalogError::Status {
                    url: url.to_string(),
                    status: StatusCode::NOT_FOUND,
                }),
            }
        }
    }

    #[test]
    fn rows_follow_aspect_ratio() {
        // 40 cols -> 60 pixel rows -> 30 text rows
        assert_eq!(rows_for(40, PLACEHOLDER_SIZE), 30);
        assert_eq!(rows_for(40, (200, 100)), 10);
        assert_eq!(rows_for(3, (3, 1)), 1);
        assert_eq!(rows_for(0, (0, 0)), 1);
    }

    #[test]
    fn strip_uses_placeholder_until_loaded() {
        let mut strip = PageStrip::new(2);
        assert_eq!(strip.row_heights(40), vec![30, 30]);

        let page = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        assert!(strip.apply(1, Ok(page)));
        assert_eq!(strip.row_heights(40), vec![30, 10]);
        assert_eq!(strip.loaded(), 1);

        assert!(!strip.apply(0, Err("gone".to_string())));
        assert!(!strip.apply(5, Err("out of range".to_string())));
        assert_eq!(strip.row_heights(40), vec![30, 10]);
    }

    #[test]
    fn band_maps_rows_onto_source_pixels() {
        let band = Band {
            cols: 40,
            page_rows: 30,
            skip: 10,
            rows: 5,
        };
        assert_eq!(band.source_rows(1200), (400, 600));

        let tail = Band { skip: 25, rows: 20, ..band };
        assert_eq!(tail.source_rows(1200), (1000, 1200));

        // never an empty crop
        let past = Band { skip: 40, rows: 1, ..band };
        assert_eq!(past.source_rows(1200), (1200, 1201));
    }

    #[test]
    fn band_is_encoded_once_per_position() {
        let picker = Picker::halfblocks();
        let mut page = PageImage::new(DynamicImage::ImageRgb8(RgbImage::new(80, 120)));
        let band = Band {
            cols: 40,
            page_rows: 30,
            skip: 0,
            rows: 10,
        };
        assert!(page.band(&picker, band).is_some());
        assert_eq!(page.band.as_ref().map(|(key, _)| *key), Some(band));

        let moved = Band { skip: 3, ..band };
        assert!(page.band(&picker, moved).is_some());
        assert_eq!(page.band.as_ref().map(|(key, _)| *key), Some(moved));
    }

    #[tokio::test]
    async fn loader_reports_every_page_in_order() {
        let (tx, mut rx) = unbounded_channel();
        let urls = vec!["wide".to_string(), "missing".to_string(), "garbage".to_string()];
        let handle = spawn_page_loader(FakeImages, 4, urls, move |page| tx.send(page).is_ok());
        handle.await.unwrap();

        let mut pages = Vec::new();
        while let Ok(page) = rx.try_recv() {
            pages.push(page);
        }
        assert_eq!(pages.len(), 3);
        assert!(pages.iter().all(|p| p.session_id == 4));
        assert_eq!(pages[0].result.as_ref().unwrap().width(), 20);
        assert!(pages[1].result.is_err());
        assert!(pages[2].result.as_ref().unwrap_err().contains("decode"));
    }

    #[tokio::test]
    async fn loader_stops_when_nobody_listens() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let urls = vec!["wide".to_string(), "wide".to_string()];
        let sent = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = sent.clone();
        let handle = spawn_page_loader(FakeImages, 1, urls, move |page| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tx.send(page).is_ok()
        });
        handle.await.unwrap();
        assert_eq!(sent.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
