//! Listing types and errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::Throttling;

/// Errors from fetching or parsing the listing page.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("Listing request failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Listing request timed out for {url}")]
    Timeout { url: String },

    #[error("Rate limited by upstream (HTTP 429) for {url}")]
    Throttled { url: String },

    #[error("Failed to parse listing: {0}")]
    Parse(String),
}

impl ListingError {
    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Fetch {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

impl Throttling for ListingError {
    fn is_throttled(&self) -> bool {
        matches!(self, ListingError::Throttled { .. })
    }
}

/// One row of the listing page, before download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSubtitle {
    /// `subsro_{row}_{seriesId}`, unique per row and media id.
    pub id: String,
    /// Absolute archive URL.
    pub source_url: String,
    pub language: String,
    pub title: String,
    /// Uploader's free-text note, usually the release names covered.
    pub comment: String,
    pub translator: Option<String>,
    /// Release name pulled from the comment, when one is recognisable.
    pub version: Option<String>,
}

impl CandidateSubtitle {
    /// Title and comment, upper-cased, for pattern checks.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.comment).to_uppercase()
    }
}
