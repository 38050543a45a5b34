//! Reader core: page resolution, session state, scroll tracking and the
//! auto-scroll loop. Nothing here touches the terminal.

mod autoscroll;
pub mod images;
mod pages;
mod retry;
mod session;
mod tracker;

#[cfg(test)]
pub(crate) mod fake;

pub use autoscroll::{AutoScrollDriver, AutoScrollTick};
pub use pages::{resolve_chapter_pages, PageError};
pub use retry::RetryPolicy;
pub use session::{
    load_chapter, Direction, LoadOutcome, Navigation, ReadRequest, ReaderSession, SessionState,
};
pub use tracker::{current_page, PageLayout, Viewport, DEFAULT_ADVANCE_THRESHOLD_PX};
