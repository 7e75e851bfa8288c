//! Mock listing source for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::listing::{CandidateSubtitle, ListingError, ListingSource};
use crate::media::MediaReference;

/// Mock implementation of the ListingSource trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable candidates
/// - Record which media were listed
/// - Simulate failures, throttling and slow pages
pub struct MockListingSource {
    candidates: Arc<RwLock<Vec<CandidateSubtitle>>>,
    requests: Arc<RwLock<Vec<MediaReference>>>,
    /// Errors returned by the next calls, oldest first.
    errors: Arc<RwLock<Vec<ListingError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: AtomicUsize,
}

impl std::fmt::Debug for MockListingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockListingSource")
            .field("candidates", &"<candidates>")
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MockListingSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockListingSource {
    pub fn new() -> Self {
        Self {
            candidates: Arc::new(RwLock::new(Vec::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Candidates returned for every media id.
    pub async fn set_candidates(&self, candidates: Vec<CandidateSubtitle>) {
        *self.candidates.write().await = candidates;
    }

    /// Queue an error for the next call.
    pub async fn push_error(&self, error: ListingError) {
        self.errors.write().await.push(error);
    }

    /// Make the next call fail with a parse error.
    pub async fn fail_with_parse_error(&self, message: &str) {
        self.push_error(ListingError::Parse(message.to_string())).await;
    }

    /// Make the next call answer HTTP 429.
    pub async fn throttle_next(&self) {
        self.push_error(ListingError::Throttled {
            url: "mock://listing".to_string(),
        })
        .await;
    }

    /// Sleep before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub async fn requests(&self) -> Vec<MediaReference> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl ListingSource for MockListingSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn domain(&self) -> &str {
        "listing.mock"
    }

    fn referer(&self) -> Option<&str> {
        Some("https://listing.mock")
    }

    async fn fetch_candidates(
        &self,
        media: &MediaReference,
    ) -> Result<Vec<CandidateSubtitle>, ListingError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.requests.write().await.push(media.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut errors = self.errors.write().await;
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }

        Ok(self.candidates.read().await.clone())
    }
}
