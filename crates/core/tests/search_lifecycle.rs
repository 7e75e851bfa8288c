//! Search lifecycle integration tests.
//!
//! These tests run the orchestrator against mock listing and archive
//! sources with a real on-disk cache:
//! listing -> acquisition -> ranking -> cache -> preload

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use subscout_core::{
    testing::{fixtures, MockArchiveFetcher, MockListingSource},
    AcquisitionQueue, CacheConfig, CacheKey, MediaReference, QueueConfig, ResultCache,
    SearchConfig, SearchOrchestrator,
};

const EPISODE_ID: &str = "tt1234567:2:5";

/// Test helper wiring mocks, a fast queue and a temporary cache.
struct TestHarness {
    listing: Arc<MockListingSource>,
    fetcher: Arc<MockArchiveFetcher>,
    cache: ResultCache,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cache = ResultCache::new(CacheConfig {
            dir: temp_dir.path().join("cache"),
            preload_delay_ms: 10,
            ..Default::default()
        });

        let listing = Arc::new(MockListingSource::new());
        listing
            .set_candidates(vec![
                fixtures::candidate(0, "Show - Sezonul 2", "S02E05 1080p WEB-DL"),
                fixtures::candidate(1, "Show - Sezonul 2", "S02E05 HDTV"),
                fixtures::candidate(2, "Show", "Sezonul 1 COMPLET"),
            ])
            .await;

        let fetcher = Arc::new(MockArchiveFetcher::new());
        fetcher
            .add_files(
                &fixtures::candidate_url(0),
                &["extracted_11_0_Show.S02E05.1080p.WEB-DL.srt"],
            )
            .await;
        fetcher
            .add_files(
                &fixtures::candidate_url(1),
                &[
                    "extracted_12_0_Show.S02E05.720p.HDTV.srt",
                    "extracted_12_1_Show.S02E06.720p.HDTV.srt",
                ],
            )
            .await;
        fetcher
            .add_files(
                &fixtures::candidate_url(2),
                &["extracted_13_0_Show.S01E01.srt"],
            )
            .await;

        Self {
            listing,
            fetcher,
            cache,
            _temp_dir: temp_dir,
        }
    }

    fn create_orchestrator(&self, config: SearchConfig) -> SearchOrchestrator {
        let queue = Arc::new(AcquisitionQueue::new(QueueConfig {
            max_concurrent: 2,
            min_request_delay_ms: 0,
            retry_base_ms: 1,
            jitter_ms: 0,
            ..Default::default()
        }));

        SearchOrchestrator::new(
            config,
            self.listing.clone(),
            self.fetcher.clone(),
            queue,
        )
        .with_cache(self.cache.clone())
    }

    fn search_config() -> SearchConfig {
        SearchConfig {
            batch_delay_ms: 0,
            public_url: "http://subs.local".to_string(),
            ..Default::default()
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_search_then_cache_hit() {
    let harness = TestHarness::new().await;
    let orchestrator = harness
        .create_orchestrator(TestHarness::search_config())
        .with_preload(0);

    let first = orchestrator
        .search_subtitles(EPISODE_ID, Some("Show.S02E05.1080p.WEB-DL.mkv"))
        .await;

    // Only the two S02E05 files survive the episode filter, best match first.
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, "c0_0");
    assert_eq!(
        first[0].url,
        "http://subs.local/subtitle/extracted_11_0_Show.S02E05.1080p.WEB-DL.srt"
    );
    assert_eq!(first[1].id, "c1_0");
    assert!(first.iter().all(|r| r.lang == "ron"));

    // The season pack candidate was dropped before download.
    let requested: Vec<_> = harness
        .fetcher
        .requests()
        .await
        .into_iter()
        .map(|r| r.url)
        .collect();
    assert_eq!(requested.len(), 2);
    assert!(!requested.contains(&fixtures::candidate_url(2)));

    let key = CacheKey::for_request(&MediaReference::parse(EPISODE_ID), None).unwrap();
    assert!(harness.cache.path_for(&key).exists());

    let second = orchestrator
        .search_subtitles(EPISODE_ID, Some("Show.S02E05.1080p.WEB-DL.mkv"))
        .await;
    assert_eq!(second, first);
    assert_eq!(harness.listing.call_count(), 1);
    assert_eq!(harness.fetcher.requests().await.len(), 2);
}

#[tokio::test]
async fn test_soft_timeout_keeps_searching_in_background() {
    let harness = TestHarness::new().await;
    harness.listing.set_delay(Duration::from_millis(300)).await;

    let orchestrator = harness
        .create_orchestrator(SearchConfig {
            soft_timeout_ms: 50,
            ..TestHarness::search_config()
        })
        .with_preload(0);

    let results = orchestrator.search_subtitles(EPISODE_ID, None).await;
    assert!(results.is_empty());

    let key = CacheKey::for_request(&MediaReference::parse(EPISODE_ID), None).unwrap();
    let cache = harness.cache.clone();
    let filled = wait_until(Duration::from_secs(5), || {
        let cache = cache.clone();
        let key = key.clone();
        async move { cache.contains(&key).await }
    })
    .await;
    assert!(filled, "background search should fill the cache");

    // The retry is answered from the cache without another listing call.
    let retried = orchestrator.search_subtitles(EPISODE_ID, None).await;
    assert_eq!(retried.len(), 2);
    assert_eq!(harness.listing.call_count(), 1);
}

#[tokio::test]
async fn test_preload_searches_following_episodes() {
    let harness = TestHarness::new().await;
    let orchestrator = harness
        .create_orchestrator(TestHarness::search_config())
        .with_preload(2);

    let results = orchestrator.search_subtitles(EPISODE_ID, None).await;
    assert!(!results.is_empty());

    let listing = harness.listing.clone();
    let preloaded = wait_until(Duration::from_secs(5), || {
        let listing = listing.clone();
        async move { listing.call_count() >= 3 }
    })
    .await;
    assert!(preloaded, "two preload searches should follow");

    let ids: Vec<_> = harness
        .listing
        .requests()
        .await
        .into_iter()
        .map(|m| m.raw_id)
        .collect();
    assert_eq!(ids, vec![EPISODE_ID, "tt1234567:2:6", "tt1234567:2:7"]);

    // The S02E06 file inside the HDTV archive is cached for episode 6.
    let next_key = CacheKey::for_request(&MediaReference::parse("tt1234567:2:6"), None).unwrap();
    let cache = harness.cache.clone();
    let cached = wait_until(Duration::from_secs(5), || {
        let cache = cache.clone();
        let key = next_key.clone();
        async move { cache.contains(&key).await }
    })
    .await;
    assert!(cached);
}

#[tokio::test]
async fn test_movie_search_is_cached_by_id() {
    let harness = TestHarness::new().await;
    harness
        .listing
        .set_candidates(vec![fixtures::candidate(0, "Film", "1080p BluRay")])
        .await;
    harness
        .fetcher
        .add_files(
            &fixtures::candidate_url(0),
            &["extracted_21_0_Film.2020.1080p.BluRay.srt"],
        )
        .await;

    let orchestrator = harness.create_orchestrator(TestHarness::search_config());
    let results = orchestrator.search_subtitles("tt7654321", None).await;
    assert_eq!(results.len(), 1);

    assert!(harness.cache.contains(&CacheKey::movie("tt7654321")).await);
    // Movies never schedule preloads.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.listing.call_count(), 1);
}

#[tokio::test]
async fn test_throttled_listing_is_retried() {
    let harness = TestHarness::new().await;
    harness.listing.throttle_next().await;

    let orchestrator = harness
        .create_orchestrator(TestHarness::search_config())
        .with_preload(0);
    let results = orchestrator.search_subtitles(EPISODE_ID, None).await;

    assert_eq!(results.len(), 2);
    assert_eq!(harness.listing.call_count(), 2);
}

#[tokio::test]
async fn test_filename_hint_supplies_episode_for_cache_key() {
    let harness = TestHarness::new().await;
    let orchestrator = harness
        .create_orchestrator(TestHarness::search_config())
        .with_preload(0);

    let results = orchestrator
        .search_subtitles("tt1234567:2", Some("Show.S02E05.720p.HDTV.mkv"))
        .await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "c1_0");

    let key = CacheKey::for_request(&MediaReference::parse(EPISODE_ID), None).unwrap();
    assert!(harness.cache.contains(&key).await);
}
