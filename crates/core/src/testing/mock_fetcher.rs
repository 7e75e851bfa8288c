//! Mock archive fetcher for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::archive::{ArchiveError, ArchiveFetcher, FetchOptions};

/// Produces the error for a failing URL.
type FailureHandler = Box<dyn Fn(&str) -> ArchiveError + Send + Sync>;

/// A recorded download for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedFetch {
    pub url: String,
    pub options: FetchOptions,
}

/// Mock implementation of the ArchiveFetcher trait.
///
/// Returns configured file lists per URL without touching the network or
/// the disk. Unknown URLs yield an empty list.
pub struct MockArchiveFetcher {
    files: Arc<RwLock<HashMap<String, Vec<PathBuf>>>>,
    /// Per-URL errors consumed one per call, oldest first.
    errors: Arc<RwLock<HashMap<String, Vec<ArchiveError>>>>,
    failure: Arc<RwLock<Option<FailureHandler>>>,
    requests: Arc<RwLock<Vec<RecordedFetch>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockArchiveFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockArchiveFetcher")
            .field("files", &"<files>")
            .field("failure", &"<handler>")
            .finish()
    }
}

impl Default for MockArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArchiveFetcher {
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            failure: Arc::new(RwLock::new(None)),
            requests: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Files "extracted" from `url`, as scratch file names.
    pub async fn add_files(&self, url: &str, names: &[&str]) {
        let paths = names
            .iter()
            .map(|n| PathBuf::from("/scratch").join(n))
            .collect();
        self.files.write().await.insert(url.to_string(), paths);
    }

    /// Fail the next download of `url` with `error`.
    pub async fn push_error(&self, url: &str, error: ArchiveError) {
        self.errors
            .write()
            .await
            .entry(url.to_string())
            .or_default()
            .push(error);
    }

    /// Fail every download not covered by a queued error.
    pub async fn fail_all<F>(&self, handler: F)
    where
        F: Fn(&str) -> ArchiveError + Send + Sync + 'static,
    {
        *self.failure.write().await = Some(Box::new(handler));
    }

    /// Sleep inside every download.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn requests(&self) -> Vec<RecordedFetch> {
        self.requests.read().await.clone()
    }

    /// Highest number of downloads seen running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveFetcher for MockArchiveFetcher {
    async fn download_and_extract(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        self.requests.write().await.push(RecordedFetch {
            url: url.to_string(),
            options: options.clone(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut errors = self.errors.write().await;
            if let Some(queued) = errors.get_mut(url) {
                if !queued.is_empty() {
                    return Err(queued.remove(0));
                }
            }
        }
        if let Some(handler) = self.failure.read().await.as_ref() {
            return Err(handler(url));
        }

        Ok(self.files.read().await.get(url).cloned().unwrap_or_default())
    }
}
