//! Background preloading of upcoming episodes.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::store::ResultCache;
use super::types::CacheKey;
use crate::matcher::EpisodeTag;

/// Runs a full search for a media id, filling the cache as a side effect.
#[async_trait]
pub trait PreloadSearch: Send + Sync {
    async fn preload(&self, media_id: &str);
}

/// The `count` episodes following `current` in the same season.
///
/// Stops early rather than wrapping past the largest episode number.
pub fn next_episodes(current: EpisodeTag, count: u32) -> Vec<EpisodeTag> {
    (1..=count)
        .map_while(|offset| current.episode.checked_add(offset))
        .map(|episode| EpisodeTag::new(current.season, episode))
        .collect()
}

impl ResultCache {
    /// Search the next `count` episodes in the background, one every
    /// `preload_delay`, skipping episodes already cached.
    ///
    /// Returns immediately; `None` when preloading is disabled.
    pub fn schedule_preload(
        &self,
        search: Arc<dyn PreloadSearch>,
        series_id: &str,
        current: EpisodeTag,
        count: u32,
    ) -> Option<JoinHandle<()>> {
        if !self.config().enabled || !self.config().preload_enabled || count == 0 {
            return None;
        }

        let cache = self.clone();
        let series_id = series_id.to_string();
        let delay = self.config().preload_delay();

        Some(tokio::spawn(async move {
            for tag in next_episodes(current, count) {
                let key = CacheKey::episode(&series_id, tag);
                if cache.contains(&key).await {
                    debug!(key = %key, "Preload skipped, already cached");
                    continue;
                }

                tokio::time::sleep(delay).await;

                let media_id = format!("{}:{}:{}", series_id, tag.season, tag.episode);
                info!(media_id = %media_id, "Preloading episode");
                search.preload(&media_id).await;
            }
        }))
    }
}
