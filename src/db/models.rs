use std::fmt;
use std::str::FromStr;

pub const MIN_SCROLL_SPEED: u32 = 1;
pub const MAX_SCROLL_SPEED: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageQuality {
    #[default]
    Low,
    Medium,
    High,
}

impl ImageQuality {
    pub const ALL: [ImageQuality; 3] = [ImageQuality::Low, ImageQuality::Medium, ImageQuality::High];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::Low => "low",
            ImageQuality::Medium => "medium",
            ImageQuality::High => "high",
        }
    }

    pub fn cycle(self) -> Self {
        match self {
            ImageQuality::Low => ImageQuality::Medium,
            ImageQuality::Medium => ImageQuality::High,
            ImageQuality::High => ImageQuality::Low,
        }
    }
}

impl fmt::Display for ImageQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageQuality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown image quality '{}' (low, medium, high)", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    /// Pixels per auto-scroll tick, 1 to 10.
    pub auto_scroll_speed: u32,
    pub infinite_scroll: bool,
    pub image_quality: ImageQuality,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            auto_scroll_speed: 1,
            infinite_scroll: true,
            image_quality: ImageQuality::Low,
        }
    }
}

impl ReaderSettings {
    pub fn with_speed(self, speed: i64) -> Self {
        Self {
            auto_scroll_speed: speed.clamp(MIN_SCROLL_SPEED as i64, MAX_SCROLL_SPEED as i64) as u32,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MangaStatus {
    Reading,
    OnHold,
    PlanToRead,
    Dropped,
    ReReading,
    Completed,
}

impl MangaStatus {
    pub const ALL: [MangaStatus; 6] = [
        MangaStatus::Reading,
        MangaStatus::OnHold,
        MangaStatus::PlanToRead,
        MangaStatus::Dropped,
        MangaStatus::ReReading,
        MangaStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MangaStatus::Reading => "reading",
            MangaStatus::OnHold => "on_hold",
            MangaStatus::PlanToRead => "plan_to_read",
            MangaStatus::Dropped => "dropped",
            MangaStatus::ReReading => "re_reading",
            MangaStatus::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MangaStatus::Reading => "Reading",
            MangaStatus::OnHold => "On Hold",
            MangaStatus::PlanToRead => "Plan to Read",
            MangaStatus::Dropped => "Dropped",
            MangaStatus::ReReading => "Re-reading",
            MangaStatus::Completed => "Completed",
        }
    }

    pub fn cycle(self) -> Self {
        let idx = MangaStatus::ALL.iter().position(|s| *s == self).unwrap_or(0);
        MangaStatus::ALL[(idx + 1) % MangaStatus::ALL.len()]
    }
}

impl FromStr for MangaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_lowercase();
        MangaStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub manga_id: String,
    pub title: String,
    pub status: MangaStatus,
    pub last_read_chapter: Option<String>,
    pub last_read_page: Option<usize>,
    pub date_added: String,
    pub date_updated: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub manga_id: String,
    pub content: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_is_clamped() {
        let s = ReaderSettings::default();
        assert_eq!(s.with_speed(0).auto_scroll_speed, 1);
        assert_eq!(s.with_speed(7).auto_scroll_speed, 7);
        assert_eq!(s.with_speed(42).auto_scroll_speed, 10);
    }

    #[test]
    fn quality_parses_case_insensitively() {
        assert_eq!("HIGH".parse::<ImageQuality>(), Ok(ImageQuality::High));
        assert!("ultra".parse::<ImageQuality>().is_err());
        assert_eq!(ImageQuality::High.cycle(), ImageQuality::Low);
    }

    #[test]
    fn status_accepts_dashes() {
        assert_eq!("plan-to-read".parse::<MangaStatus>(), Ok(MangaStatus::PlanToRead));
        assert_eq!(MangaStatus::Completed.cycle(), MangaStatus::Reading);
    }

    #[test]
    fn stored_text_reads_back() {
        for quality in ImageQuality::ALL {
            assert_eq!(quality.as_str().parse::<ImageQuality>(), Ok(quality));
        }
        for status in MangaStatus::ALL {
            assert_eq!(status.as_str().parse::<MangaStatus>(), Ok(status));
        }
    }
}
