//! Scroll geometry for the page strip and the two things derived from it:
//! which page is being read, and when to roll over into the next chapter.
//!
//! Everything is in virtual pixels, top of content = 0.

pub const DEFAULT_ADVANCE_THRESHOLD_PX: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub scroll_top: u32,
    pub client_height: u32,
    pub scroll_height: u32,
}

impl Viewport {
    pub fn max_scroll_top(&self) -> u32 {
        self.scroll_height.saturating_sub(self.client_height)
    }

    /// Space left below the visible area.
    pub fn distance_to_bottom(&self) -> u32 {
        self.scroll_height
            .saturating_sub(self.scroll_top.saturating_add(self.client_height))
    }

    /// Returns true when the position actually moved, which is when a
    /// scroll event is due.
    pub fn scroll_to(&mut self, top: u32) -> bool {
        let clamped = top.min(self.max_scroll_top());
        let moved = clamped != self.scroll_top;
        self.scroll_top = clamped;
        moved
    }

    pub fn scroll_by(&mut self, delta: i64) -> bool {
        let target = (self.scroll_top as i64 + delta).clamp(0, u32::MAX as i64) as u32;
        self.scroll_to(target)
    }

    /// Re-clamps after the content or the window changed size.
    pub fn resize(&mut self, client_height: u32, scroll_height: u32) {
        self.client_height = client_height;
        self.scroll_height = scroll_height;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }
}

/// Vertical extent of every page, stacked in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageLayout {
    tops: Vec<u32>,
    heights: Vec<u32>,
}

impl PageLayout {
    pub fn new<I: IntoIterator<Item = u32>>(heights: I, gap: u32) -> Self {
        let heights: Vec<u32> = heights.into_iter().collect();
        let mut tops = Vec::with_capacity(heights.len());
        let mut y = 0u32;
        for h in &heights {
            tops.push(y);
            y = y.saturating_add(*h).saturating_add(gap);
        }
        Self { tops, heights }
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    pub fn page_top(&self, index: usize) -> Option<u32> {
        self.tops.get(index).copied()
    }

    /// `(top, bottom)` of page `index` in content coordinates.
    pub fn page_span(&self, index: usize) -> Option<(u32, u32)> {
        let top = *self.tops.get(index)?;
        let height = *self.heights.get(index)?;
        Some((top, top.saturating_add(height)))
    }

    pub fn total_height(&self) -> u32 {
        match (self.tops.last(), self.heights.last()) {
            (Some(top), Some(height)) => top.saturating_add(*height),
            _ => 0,
        }
    }
}

/// First page, in reading order, whose top edge sits above the middle of the
/// viewport while its bottom edge is still below the viewport top.
pub fn current_page(layout: &PageLayout, viewport: &Viewport) -> Option<usize> {
    let midpoint = viewport.client_height as i64 / 2;
    (0..layout.len()).find(|&i| {
        layout.page_span(i).is_some_and(|(top, bottom)| {
            let rect_top = top as i64 - viewport.scroll_top as i64;
            let rect_bottom = bottom as i64 - viewport.scroll_top as i64;
            rect_top < midpoint && rect_bottom > 0
        })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollObservation {
    pub current_page: Option<usize>,
    /// Move on to the next chapter now.
    pub advance: bool,
}

/// Per-session scroll handler. Fires the chapter roll-over at most once.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    threshold: u32,
    advance_requested: bool,
}

impl Default for ScrollTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ADVANCE_THRESHOLD_PX)
    }
}

impl ScrollTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            advance_requested: false,
        }
    }

    /// Call on every scroll event. `can_advance` is whether the session is
    /// settled and an older-numbered next chapter exists.
    pub fn on_scroll(
        &mut self,
        layout: &PageLayout,
        viewport: &Viewport,
        infinite_scroll: bool,
        can_advance: bool,
    ) -> ScrollObservation {
        let near_end = viewport.distance_to_bottom() < self.threshold;
        let advance = infinite_scroll && can_advance && near_end && !self.advance_requested;
        if advance {
            self.advance_requested = true;
        }

        ScrollObservation {
            current_page: current_page(layout, viewport),
            advance,
        }
    }
}
