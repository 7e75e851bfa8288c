//! Media identifiers and subtitle results.
//!
//! Requests identify media with a composite id: `tt1234567` for a movie,
//! `tt1234567:2:5` for season 2 episode 5 of a series.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matcher::EpisodeTag;

const SEPARATOR: char = ':';

/// A media id split into its series and episode parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub raw_id: String,
    pub series_id: String,
    /// Two-digit zero-padded season.
    pub season: Option<String>,
    /// Two-digit zero-padded episode.
    pub episode: Option<String>,
}

impl MediaReference {
    pub fn parse(raw_id: &str) -> Self {
        let raw_id = raw_id.trim();
        let mut parts = raw_id.split(SEPARATOR);
        let series_id = parts.next().unwrap_or_default().to_string();
        let season = parts.next().filter(|s| !s.is_empty()).map(pad);
        let episode = parts.next().filter(|s| !s.is_empty()).map(pad);

        Self {
            raw_id: raw_id.to_string(),
            series_id,
            season,
            episode,
        }
    }

    /// Ids without a separator refer to movies.
    pub fn is_movie(&self) -> bool {
        !self.raw_id.contains(SEPARATOR)
    }

    /// Episode tag carried by the id itself.
    pub fn episode_tag(&self) -> Option<EpisodeTag> {
        let season = self.season.as_deref()?.parse().ok()?;
        let episode = self.episode.as_deref()?.parse().ok()?;
        Some(EpisodeTag::new(season, episode))
    }

    /// The series id with any `tt` prefix removed, as the listing site expects.
    pub fn numeric_id(&self) -> &str {
        self.series_id
            .strip_prefix("tt")
            .unwrap_or(&self.series_id)
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_id)
    }
}

/// A served subtitle file, the unit returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleResult {
    pub id: String,
    pub url: String,
    pub lang: String,
}

impl SubtitleResult {
    /// Decoded last path segment of the served URL.
    pub fn file_name(&self) -> String {
        let segment = self.url.rsplit('/').next().unwrap_or_default();
        urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string())
    }

    /// Original archive member name, without the scratch-file prefix
    /// (`extracted_{extractId}_{index}_`).
    pub fn member_name(&self) -> String {
        let file_name = self.file_name();
        let mut parts = file_name.splitn(4, '_');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("extracted"), Some(id), Some(index), Some(rest))
                if is_digits(id) && is_digits(index) && !rest.is_empty() =>
            {
                rest.to_string()
            }
            _ => file_name,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn pad(part: &str) -> String {
    format!("{:0>2}", part.trim())
}
