//! Episode tag derivation.

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::media::MediaReference;

static SXXEXX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[sS](\d{1,2})\.?[eE](\d{1,2})").unwrap());

static NXN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d])(\d{1,2})x(\d{1,2})(?:[^\d]|$)").unwrap());

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)season[\s._-]?(\d{1,2})[\s._-]?episode[\s._-]?(\d{1,2})").unwrap()
});

static BARE_THREE_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d])(\d)(\d{2})(?:[^\d]|$)").unwrap());

/// Normalized `S##E##` episode identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeTag {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeTag {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }

    /// Extract a tag from a file or release name.
    ///
    /// Tries `S##E##`/`S##.E##`, `##x##`, `Season ## Episode ##`, then a
    /// bare three-digit `SEE` number.
    pub fn from_name(name: &str) -> Option<Self> {
        for pattern in [&*SXXEXX, &*NXN, &*SEASON_EPISODE] {
            if let Some(caps) = pattern.captures(name) {
                if let Some(tag) = Self::from_parts(caps.get(1)?.as_str(), caps.get(2)?.as_str()) {
                    return Some(tag);
                }
            }
        }
        Self::from_bare_digits(name)
    }

    /// `S02` style token for this tag's season.
    pub fn season_token(&self) -> String {
        format!("S{:02}", self.season)
    }

    /// Whether `name` is this exact episode or a complete pack of its season.
    pub fn matches_name(&self, name: &str) -> bool {
        if Self::from_name(name) == Some(*self) {
            return true;
        }
        if self.is_complete_season(name) {
            debug!("Matched complete season pattern: {}", name);
            return true;
        }
        false
    }

    /// `S04 Complete`, `Season 4 all episodes`, or a name ending in a bare `S04`.
    pub fn is_complete_season(&self, name: &str) -> bool {
        let ss = format!("{:02}", self.season);
        let n = self.season;
        let patterns = [
            format!(r"(?i)s{}.*complete", ss),
            format!(r"(?i)season.?{}(?:[^\d].*)?complete", n),
            format!(r"(?i)s{}.*all.*episodes", ss),
            format!(r"(?i)season.?{}(?:[^\d].*)?all.*episodes", n),
            format!(r"(?i)s{}[^\d]*$", ss),
        ];
        patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .any(|re| re.is_match(name))
    }

    /// Season-level match used when no episode matches: `S04` or `Season 4`.
    pub fn mentions_season(&self, name: &str) -> bool {
        name.contains(&self.season_token()) || name.contains(&format!("Season {}", self.season))
    }

    fn from_parts(season: &str, episode: &str) -> Option<Self> {
        Some(Self::new(season.parse().ok()?, episode.parse().ok()?))
    }

    /// `413` -> S04E13, skipping resolutions (`720p`) and codecs (`x264`, `H.265`).
    fn from_bare_digits(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        for caps in BARE_THREE_DIGITS.captures_iter(name) {
            let (Some(season), Some(episode)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let after = bytes.get(episode.end()).copied();
            if matches!(after, Some(b'p' | b'P')) {
                continue;
            }
            let start = season.start();
            let before = start.checked_sub(1).map(|i| bytes[i]);
            let before2 = start.checked_sub(2).map(|i| bytes[i]);
            let codec = matches!(before, Some(b'x' | b'X' | b'h' | b'H'))
                || (before == Some(b'.') && matches!(before2, Some(b'x' | b'X' | b'h' | b'H')));
            if codec {
                continue;
            }
            return Self::from_parts(season.as_str(), episode.as_str());
        }
        None
    }
}

impl fmt::Display for EpisodeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Derive the target episode, preferring the media id over the filename.
pub fn derive_episode(media_id: &str, filename_hint: Option<&str>) -> Option<EpisodeTag> {
    let media = MediaReference::parse(media_id);
    if let Some(tag) = media.episode_tag() {
        debug!("Extracted {} from media id", tag);
        return Some(tag);
    }

    let tag = filename_hint.and_then(EpisodeTag::from_name)?;
    debug!("Extracted {} from filename", tag);
    Some(tag)
}
