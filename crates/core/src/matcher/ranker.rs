//! Candidate filtering, ranking and per-tag capping.

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::episode::{derive_episode, EpisodeTag};
use super::quality::{is_exact_match, is_low_fidelity, quality_tag, tag_priority};
use crate::media::SubtitleResult;

/// Anything with a file name the ranker can inspect.
pub trait SubtitleName {
    fn subtitle_name(&self) -> Cow<'_, str>;
}

impl SubtitleName for SubtitleResult {
    fn subtitle_name(&self) -> Cow<'_, str> {
        Cow::Owned(self.member_name())
    }
}

impl SubtitleName for String {
    fn subtitle_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.as_str())
    }
}

impl SubtitleName for &str {
    fn subtitle_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(*self)
    }
}

/// Filters and orders subtitles for one video.
#[derive(Debug, Clone)]
pub struct MatchRanker {
    max_per_tag: usize,
}

impl MatchRanker {
    pub fn new(max_per_tag: usize) -> Self {
        Self { max_per_tag }
    }

    pub fn max_per_tag(&self) -> usize {
        self.max_per_tag
    }

    /// Target episode from the media id, falling back to the filename hint.
    pub fn derive_episode(&self, media_id: &str, filename_hint: Option<&str>) -> Option<EpisodeTag> {
        derive_episode(media_id, filename_hint)
    }

    /// Keep candidates for `tag`.
    ///
    /// Exact episode matches and complete-season packs win; failing that,
    /// anything mentioning the season; failing that, everything (fail open).
    pub fn filter_by_episode<C: SubtitleName>(&self, candidates: Vec<C>, tag: &EpisodeTag) -> Vec<C> {
        let total = candidates.len();

        let matches = |c: &C| tag.matches_name(&c.subtitle_name());
        if candidates.iter().any(matches) {
            let kept: Vec<C> = candidates.into_iter().filter(|c| matches(c)).collect();
            info!("Found {} of {} subtitles for {}", kept.len(), total, tag);
            return kept;
        }

        let season = |c: &C| tag.mentions_season(&c.subtitle_name());
        if candidates.iter().any(season) {
            let kept: Vec<C> = candidates.into_iter().filter(|c| season(c)).collect();
            info!(
                "Found {} season pack subtitles for {}",
                kept.len(),
                tag.season_token()
            );
            return kept;
        }

        if total > 0 {
            warn!("No subtitles found for {}, showing all {} available", tag, total);
        }
        candidates
    }

    /// Order candidates: exact filename match, then matching quality tag,
    /// then quality-tag priority. Ties keep their input order.
    pub fn rank<C: SubtitleName>(&self, mut candidates: Vec<C>, filename_hint: Option<&str>) -> Vec<C> {
        let hint_tag = filename_hint.and_then(quality_tag);
        if let Some(tag) = hint_tag {
            debug!("Video quality tag detected: {}", tag);
        }

        candidates.sort_by_cached_key(|c| {
            let name = c.subtitle_name();
            let exact = filename_hint.is_some_and(|hint| is_exact_match(&name, hint));
            let tag = quality_tag(&name);
            let same_tag = hint_tag.is_some() && tag == hint_tag;
            (!exact, !same_tag, tag_priority(tag))
        });
        candidates
    }

    /// Drop theater captures, then keep at most `max_per_tag` per quality
    /// tag (untagged names share one bucket), preserving order.
    pub fn cap_per_quality_tag<C: SubtitleName>(&self, candidates: Vec<C>, max_per_tag: usize) -> Vec<C> {
        let mut counts: HashMap<&'static str, usize> = HashMap::new();
        let mut low_fidelity = 0usize;
        let mut over_cap = 0usize;

        let kept: Vec<C> = candidates
            .into_iter()
            .filter(|c| {
                let name = c.subtitle_name();
                if is_low_fidelity(&name) {
                    low_fidelity += 1;
                    return false;
                }
                let bucket = quality_tag(&name).unwrap_or("UNKNOWN");
                let count = counts.entry(bucket).or_insert(0);
                if *count < max_per_tag {
                    *count += 1;
                    true
                } else {
                    over_cap += 1;
                    false
                }
            })
            .collect();

        if low_fidelity > 0 || over_cap > 0 {
            debug!(
                low_fidelity,
                over_cap,
                kept = kept.len(),
                "Capped subtitles per quality tag"
            );
        }
        kept
    }

    /// Filter (when a tag is known), rank and cap in one pass.
    pub fn select<C: SubtitleName>(
        &self,
        candidates: Vec<C>,
        tag: Option<&EpisodeTag>,
        filename_hint: Option<&str>,
    ) -> Vec<C> {
        let filtered = match tag {
            Some(tag) => self.filter_by_episode(candidates, tag),
            None => candidates,
        };
        let ranked = self.rank(filtered, filename_hint);
        self.cap_per_quality_tag(ranked, self.max_per_tag)
    }
}

impl Default for MatchRanker {
    fn default() -> Self {
        Self::new(15)
    }
}
