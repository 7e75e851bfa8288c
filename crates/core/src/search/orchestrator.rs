//! Search orchestration.
//!
//! A search runs: cache → listing → pre-filter → batched archive
//! acquisition through the queue → episode filter, rank and cap → cache →
//! preload of the following episodes.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::config::SearchConfig;
use super::prefilter::prefilter_candidates;
use super::types::{AcquisitionSummary, SearchError, SearchPriority};
use crate::archive::{ArchiveError, ArchiveFetcher, FetchOptions};
use crate::cache::{CacheKey, PreloadSearch, ResultCache};
use crate::listing::{CandidateSubtitle, ListingSource};
use crate::matcher::MatchRanker;
use crate::media::{MediaReference, SubtitleResult};
use crate::metrics;
use crate::proxy::ProxyPool;
use crate::queue::AcquisitionQueue;

const ACCEPT_LANGUAGE: &str = "ro-RO,ro;q=0.9,en;q=0.8";

/// Composes listing, queue, fetcher, ranker and cache into one search.
///
/// Cheap to clone; clones share every component.
#[derive(Clone)]
pub struct SearchOrchestrator {
    inner: Arc<Inner>,
}

#[derive(Clone)]
struct Inner {
    config: SearchConfig,
    listing: Arc<dyn ListingSource>,
    fetcher: Arc<dyn ArchiveFetcher>,
    queue: Arc<AcquisitionQueue>,
    ranker: MatchRanker,
    cache: Option<ResultCache>,
    proxies: Option<Arc<ProxyPool>>,
    preload_count: u32,
}

impl SearchOrchestrator {
    pub fn new(
        config: SearchConfig,
        listing: Arc<dyn ListingSource>,
        fetcher: Arc<dyn ArchiveFetcher>,
        queue: Arc<AcquisitionQueue>,
    ) -> Self {
        let ranker = MatchRanker::new(config.max_per_tag);
        Self {
            inner: Arc::new(Inner {
                config,
                listing,
                fetcher,
                queue,
                ranker,
                cache: None,
                proxies: None,
                preload_count: 0,
            }),
        }
    }

    /// Use `cache` for lookups, storage and (when enabled there) preloading.
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        let preload_count = cache.config().preload_count;
        let inner = self.inner_mut();
        inner.cache = Some(cache);
        inner.preload_count = preload_count;
        self
    }

    /// Route archive downloads through `pool`.
    pub fn with_proxy_pool(mut self, pool: Arc<ProxyPool>) -> Self {
        self.inner_mut().proxies = Some(pool);
        self
    }

    /// Override how many following episodes are preloaded (0 disables).
    pub fn with_preload(mut self, count: u32) -> Self {
        self.inner_mut().preload_count = count;
        self
    }

    fn inner_mut(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.inner.cache.as_ref()
    }

    pub fn queue(&self) -> &Arc<AcquisitionQueue> {
        &self.inner.queue
    }

    /// Ranked subtitles for `media_id`, within the soft timeout.
    ///
    /// Never fails: errors and timeouts give an empty list. A search that
    /// outlives the timeout keeps running and fills the cache.
    pub async fn search_subtitles(
        &self,
        media_id: &str,
        filename_hint: Option<&str>,
    ) -> Vec<SubtitleResult> {
        let this = self.clone();
        let id = media_id.to_string();
        let hint = filename_hint.map(str::to_string);
        let mut task = tokio::spawn(async move {
            this.run_search(&id, hint.as_deref(), SearchPriority::Interactive)
                .await
        });

        match tokio::time::timeout(self.inner.config.soft_timeout(), &mut task).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                error!(media_id, "{}", SearchError::from(e));
                metrics::SEARCHES.with_label_values(&["error"]).inc();
                Vec::new()
            }
            Err(_) => {
                warn!(
                    media_id,
                    timeout_ms = self.inner.config.soft_timeout_ms,
                    "Search exceeded soft timeout, answering empty and continuing in background"
                );
                metrics::SEARCHES.with_label_values(&["timeout"]).inc();
                Vec::new()
            }
        }
    }

    /// Full search without the soft timeout. Errors give an empty list.
    pub async fn run_search(
        &self,
        media_id: &str,
        filename_hint: Option<&str>,
        priority: SearchPriority,
    ) -> Vec<SubtitleResult> {
        let started = Instant::now();
        let (outcome, results) = match self.search(media_id, filename_hint, priority).await {
            Ok((outcome, results)) => (outcome, results),
            Err(e) => {
                error!(media_id, %priority, "Search failed: {}", e);
                ("error", Vec::new())
            }
        };

        metrics::SEARCHES.with_label_values(&[outcome]).inc();
        metrics::SEARCH_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
        info!(
            media_id,
            %priority,
            outcome,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search finished"
        );
        results
    }

    async fn search(
        &self,
        media_id: &str,
        filename_hint: Option<&str>,
        priority: SearchPriority,
    ) -> Result<(&'static str, Vec<SubtitleResult>), SearchError> {
        let inner = &self.inner;
        let media = MediaReference::parse(media_id);

        let key = inner
            .cache
            .as_ref()
            .and_then(|_| CacheKey::for_request(&media, filename_hint));
        if let (Some(cache), Some(key)) = (&inner.cache, &key) {
            if let Some(hit) = cache.get(key).await {
                info!(media_id, key = %key, results = hit.len(), "Returning cached subtitles");
                return Ok(("cache_hit", hit));
            }
        }

        let candidates = self.fetch_listing(&media, priority).await?;
        metrics::CANDIDATES_FOUND
            .with_label_values(&[])
            .observe(candidates.len() as f64);

        let tag = inner.ranker.derive_episode(media_id, filename_hint);
        let candidates = prefilter_candidates(candidates, tag.as_ref());

        let (acquired, summary) = self.acquire_all(&candidates, priority).await;
        debug!(media_id, ?summary, "Acquisition finished");

        let results = inner.ranker.select(acquired, tag.as_ref(), filename_hint);

        if let (Some(cache), Some(key)) = (&inner.cache, &key) {
            if results.is_empty() {
                warn!(key = %key, "Not caching empty result");
            }
            if let Err(e) = cache.set(key, &results).await {
                warn!(key = %key, "Failed to cache results: {}", e);
            }

            let is_episode = matches!(key, CacheKey::Episode { .. });
            if !results.is_empty()
                && is_episode
                && priority == SearchPriority::Interactive
                && inner.preload_count > 0
            {
                if let Some(tag) = tag {
                    let search: Arc<dyn PreloadSearch> = Arc::new(self.clone());
                    cache.schedule_preload(search, &media.series_id, tag, inner.preload_count);
                }
            }
        }

        let outcome = if results.is_empty() { "empty" } else { "completed" };
        Ok((outcome, results))
    }

    async fn fetch_listing(
        &self,
        media: &MediaReference,
        priority: SearchPriority,
    ) -> Result<Vec<CandidateSubtitle>, SearchError> {
        let listing = Arc::clone(&self.inner.listing);
        let domain = listing.domain().to_string();
        let media = media.clone();

        let candidates = self
            .inner
            .queue
            .submit(&domain, priority.queue_priority(), move || {
                let listing = Arc::clone(&listing);
                let media = media.clone();
                async move { listing.fetch_candidates(&media).await }
            })
            .await?;
        Ok(candidates)
    }

    /// Acquire candidates in batches, stopping early on a failure ceiling.
    async fn acquire_all(
        &self,
        candidates: &[CandidateSubtitle],
        priority: SearchPriority,
    ) -> (Vec<SubtitleResult>, AcquisitionSummary) {
        let config = &self.inner.config;
        let batch_size = match config.batch_size {
            0 => self.inner.queue.config().max_concurrent.max(1),
            n => n,
        };

        let mut results = Vec::new();
        let mut summary = AcquisitionSummary::default();
        let mut consecutive_failures = 0u32;
        let mut total_failures = 0u32;
        let batches = candidates.len().div_ceil(batch_size);

        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if batch_index > 0 && !config.batch_delay().is_zero() {
                tokio::time::sleep(config.batch_delay()).await;
            }
            debug!(batch = batch_index + 1, batches, "Acquiring batch");

            let outcomes = join_all(batch.iter().enumerate().map(|(offset, candidate)| {
                self.acquire_one(candidate, batch_index * batch_size + offset, priority)
            }))
            .await;

            for (candidate, outcome) in batch.iter().zip(outcomes) {
                summary.attempted += 1;
                match outcome {
                    Ok(found) if !found.is_empty() => {
                        consecutive_failures = 0;
                        summary.succeeded += 1;
                        results.extend(found);
                    }
                    Ok(_) => {
                        consecutive_failures += 1;
                        total_failures += 1;
                        summary.failed += 1;
                        warn!(candidate = %candidate.id, "No subtitle files in archive");
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        total_failures += 1;
                        summary.failed += 1;
                        if total_failures <= 5 {
                            warn!(candidate = %candidate.id, "Candidate failed: {}", e);
                        }
                    }
                }
            }

            if consecutive_failures >= config.max_consecutive_failures {
                error!(
                    consecutive_failures,
                    "Stopping acquisition after consecutive failures (proxy issues or upstream blocking?)"
                );
                summary.aborted = true;
                break;
            }
            if total_failures >= config.max_total_failures {
                error!(total_failures, "Stopping acquisition after too many failures");
                summary.aborted = true;
                break;
            }
        }

        (results, summary)
    }

    /// Download one candidate through the queue and map its files to results.
    async fn acquire_one(
        &self,
        candidate: &CandidateSubtitle,
        index: usize,
        priority: SearchPriority,
    ) -> Result<Vec<SubtitleResult>, ArchiveError> {
        let inner = &self.inner;

        let mut options = FetchOptions::default()
            .with_header("Accept", "*/*")
            .with_header("Accept-Language", ACCEPT_LANGUAGE);
        if let Some(user_agent) = inner.config.user_agent(index) {
            options = options.with_header("User-Agent", user_agent);
        }
        if let Some(referer) = inner.listing.referer() {
            options = options.with_header("Referer", referer);
        }

        let fetcher = Arc::clone(&inner.fetcher);
        let proxies = inner.proxies.clone();
        let url = candidate.source_url.clone();
        let domain = host_of(&url).to_string();

        let files = inner
            .queue
            .submit(&domain, priority.queue_priority(), move || {
                let fetcher = Arc::clone(&fetcher);
                let proxies = proxies.clone();
                let url = url.clone();
                let mut options = options.clone();
                async move {
                    let proxy = proxies.as_ref().map(|pool| pool.next());
                    options.proxy = proxy.clone();

                    let result = fetcher.download_and_extract(&url, &options).await;

                    if let (Some(pool), Some(endpoint)) = (&proxies, &proxy) {
                        match &result {
                            Ok(_) => pool.mark_succeeded(endpoint),
                            Err(e) if e.is_proxy_failure() => pool.mark_failed(endpoint),
                            Err(_) => {}
                        }
                    }
                    result
                }
            })
            .await?;

        Ok(files
            .iter()
            .enumerate()
            .map(|(n, path)| SubtitleResult {
                id: format!("{}_{}", candidate.id, n),
                url: self.served_url(path),
                lang: candidate.language.clone(),
            })
            .collect())
    }

    /// `{public_url}/subtitle/{file name}`, percent-encoded.
    fn served_url(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{}/subtitle/{}",
            self.inner.config.public_url.trim_end_matches('/'),
            urlencoding::encode(&name)
        )
    }
}

#[async_trait]
impl PreloadSearch for SearchOrchestrator {
    async fn preload(&self, media_id: &str) {
        self.run_search(media_id, None, SearchPriority::Preload).await;
    }
}

/// Host part of a URL, used as the pacing domain.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = authority.rsplit('@').next().unwrap_or(authority);
    host.split(':').next().unwrap_or(host)
}
