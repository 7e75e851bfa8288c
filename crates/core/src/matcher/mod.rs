//! Episode matching and quality ranking.
//!
//! Subtitle names are matched against a target episode (derived from the
//! media id or the video filename), ordered by how well they fit the video
//! file, and capped per quality tag.

mod episode;
mod quality;
mod ranker;

pub use episode::{derive_episode, EpisodeTag};
pub use quality::{
    is_exact_match, is_low_fidelity, normalize_name, quality_tag, tag_priority, QUALITY_TAGS,
};
pub use ranker::{MatchRanker, SubtitleName};
