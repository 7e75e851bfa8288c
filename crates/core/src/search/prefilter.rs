//! Cheap candidate filtering before any archive is downloaded.

use tracing::{info, warn};

use crate::listing::CandidateSubtitle;
use crate::matcher::EpisodeTag;

const PACK_MARKERS: [&str; 2] = ["COMPLET", "PACK"];

/// Keep the candidates whose title or comment mention the episode.
///
/// Tries, in order: the episode (`S02E05`), its season (`S02`,
/// `SEASON 2`); then season packs (`COMPLET`, `PACK`); then everything.
pub fn prefilter_candidates(
    candidates: Vec<CandidateSubtitle>,
    tag: Option<&EpisodeTag>,
) -> Vec<CandidateSubtitle> {
    let Some(tag) = tag else {
        return candidates;
    };
    if candidates.is_empty() {
        return candidates;
    }

    let total = candidates.len();
    let episode = tag.to_string();
    let season = tag.season_token();
    let season_words = format!("SEASON {}", tag.season);

    let texts: Vec<String> = candidates.iter().map(|c| c.search_text()).collect();

    let mentions: Vec<bool> = texts
        .iter()
        .map(|t| t.contains(&episode) || t.contains(&season) || t.contains(&season_words))
        .collect();
    if mentions.iter().any(|&m| m) {
        let kept = keep(candidates, &mentions);
        info!(episode = %tag, kept = kept.len(), total, "Pre-filtered candidates");
        return kept;
    }

    let packs: Vec<bool> = texts
        .iter()
        .map(|t| PACK_MARKERS.iter().any(|m| t.contains(m)))
        .collect();
    if packs.iter().any(|&p| p) {
        let kept = keep(candidates, &packs);
        info!(episode = %tag, kept = kept.len(), total, "Using season pack candidates");
        return kept;
    }

    warn!(episode = %tag, total, "No candidate mentions the episode, keeping all");
    candidates
}

fn keep(candidates: Vec<CandidateSubtitle>, mask: &[bool]) -> Vec<CandidateSubtitle> {
    candidates
        .into_iter()
        .zip(mask)
        .filter_map(|(c, &keep)| keep.then_some(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::candidate;

    fn ids(candidates: &[CandidateSubtitle]) -> Vec<&str> {
        candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_episode_and_season_mentions() {
        let candidates = vec![
            candidate(0, "Show", "Show.S02E05.WEB-DL"),
            candidate(1, "Show", "S01 complet"),
            candidate(2, "Show - Season 2", ""),
            candidate(3, "Show", "s02 toate episoadele"),
        ];
        let kept = prefilter_candidates(candidates, Some(&EpisodeTag::new(2, 5)));
        assert_eq!(ids(&kept), vec!["c0", "c2", "c3"]);
    }

    #[test]
    fn test_pack_fallback() {
        let candidates = vec![
            candidate(0, "Show", "S01E01"),
            candidate(1, "Show", "Pack integral"),
        ];
        let kept = prefilter_candidates(candidates, Some(&EpisodeTag::new(3, 1)));
        assert_eq!(ids(&kept), vec!["c1"]);
    }

    #[test]
    fn test_fail_open() {
        let candidates = vec![candidate(0, "Show", "1080p"), candidate(1, "Show", "720p")];
        let kept = prefilter_candidates(candidates, Some(&EpisodeTag::new(3, 1)));
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_no_tag_keeps_all() {
        let candidates = vec![candidate(0, "Movie", "BluRay")];
        assert_eq!(prefilter_candidates(candidates, None).len(), 1);
    }
}
