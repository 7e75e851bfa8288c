//! Cache types and errors.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::EpisodeTag;
use crate::media::{MediaReference, SubtitleResult};

/// Errors from cache file access.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unparseable or poisoned entry.
    #[error("Corrupt cache entry {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Identity of a cached search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheKey {
    Episode {
        series_id: String,
        season: u32,
        episode: u32,
    },
    Movie {
        media_id: String,
    },
}

impl CacheKey {
    pub fn episode(series_id: impl Into<String>, tag: EpisodeTag) -> Self {
        Self::Episode {
            series_id: series_id.into(),
            season: tag.season,
            episode: tag.episode,
        }
    }

    pub fn movie(media_id: impl Into<String>) -> Self {
        Self::Movie {
            media_id: media_id.into(),
        }
    }

    /// Key for a search request.
    ///
    /// Movies are keyed by id. Series are keyed by episode, taken from the
    /// id or else from an `S##E##` in the filename; without one the search
    /// is not cacheable.
    pub fn for_request(media: &MediaReference, filename_hint: Option<&str>) -> Option<Self> {
        if media.is_movie() {
            return Some(Self::movie(&media.series_id));
        }
        let tag = media
            .episode_tag()
            .or_else(|| filename_hint.and_then(EpisodeTag::from_name))?;
        Some(Self::episode(&media.series_id, tag))
    }

    /// File name stem, restricted to filesystem-safe characters.
    pub fn file_stem(&self) -> String {
        match self {
            CacheKey::Episode {
                series_id,
                season,
                episode,
            } => format!("{}_S{:02}_E{:02}", safe(series_id), season, episode),
            CacheKey::Movie { media_id } => format!("movie_{}", safe(media_id)),
        }
    }
}

fn safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}

/// One persisted search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: CacheKey,
    pub subtitles: Vec<SubtitleResult>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// What a maintenance sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub poisoned: usize,
    pub corrupt: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.expired + self.poisoned + self.corrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stems() {
        let key = CacheKey::episode("tt1234567", EpisodeTag::new(2, 5));
        assert_eq!(key.file_stem(), "tt1234567_S02_E05");
        assert_eq!(CacheKey::movie("tt7654321").to_string(), "movie_tt7654321");
        assert_eq!(CacheKey::movie("../etc").file_stem(), "movie____etc");
    }

    #[test]
    fn test_key_for_request() {
        let series = MediaReference::parse("tt1234567:2:5");
        assert_eq!(
            CacheKey::for_request(&series, None),
            Some(CacheKey::episode("tt1234567", EpisodeTag::new(2, 5)))
        );

        let movie = MediaReference::parse("tt7654321");
        assert_eq!(
            CacheKey::for_request(&movie, Some("Movie.S01E01.mkv")),
            Some(CacheKey::movie("tt7654321"))
        );

        let bare = MediaReference::parse("tt1234567:");
        assert_eq!(
            CacheKey::for_request(&bare, Some("Show.S03E07.mkv")),
            Some(CacheKey::episode("tt1234567", EpisodeTag::new(3, 7)))
        );
        assert_eq!(CacheKey::for_request(&bare, Some("Show.mkv")), None);
    }

    #[test]
    fn test_entry_json_shape() {
        let now = Utc::now();
        let entry = CacheEntry {
            key: CacheKey::episode("tt1", EpisodeTag::new(1, 2)),
            subtitles: vec![],
            created_at: now,
            expires_at: now,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["key"]["kind"], "episode");
        assert_eq!(json["key"]["season"], 1);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("expiresAt").is_some());
    }
}
