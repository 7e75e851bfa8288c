//! Search types and errors.

use std::fmt;

use thiserror::Error;

use crate::listing::ListingError;

/// Internal search failures. Callers of `search_subtitles` only ever see
/// an empty list.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Listing unavailable: {0}")]
    Listing(#[from] ListingError),

    #[error("Search task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Who a search is for. Interactive searches are queued ahead of preloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPriority {
    Interactive,
    Preload,
}

impl SearchPriority {
    pub fn queue_priority(&self) -> i32 {
        match self {
            SearchPriority::Interactive => 10,
            SearchPriority::Preload => 0,
        }
    }
}

impl fmt::Display for SearchPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchPriority::Interactive => write!(f, "interactive"),
            SearchPriority::Preload => write!(f, "preload"),
        }
    }
}

/// Counters for one acquisition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Stopped early on a failure ceiling.
    pub aborted: bool,
}
