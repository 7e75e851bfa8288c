//! Quality tags and filename normalization.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Quality tags in priority order (earlier is better).
pub const QUALITY_TAGS: &[&str] = &[
    "BluRay", "BRRip", "BDRip", "WEB-DL", "WEBDLRip", "WEBRip", "HDTV", "HDRip", "DVDRip", "REMUX",
    "WEB", "NF", "AMZN", "DSNP", "HMAX", "HULU", "APLTV", "iTunes", "HBO", "HBO MAX",
];

/// Theater-capture release tokens; such subtitles are never returned.
const LOW_FIDELITY_TOKENS: &[&str] = &["cam", "hdcam", "camrip", "hdts", "telesync"];

static MEDIA_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp4|mkv|avi|mov|srt|sub|ass|ssa|vtt)$").unwrap());

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._\-\s]+").unwrap());

/// First quality tag found in `name` (case-insensitive substring).
pub fn quality_tag(name: &str) -> Option<&'static str> {
    let upper = name.to_uppercase();
    QUALITY_TAGS
        .iter()
        .copied()
        .find(|tag| upper.contains(&tag.to_uppercase()))
}

/// Position of `tag` in the priority list; unknown tags sort last.
pub fn tag_priority(tag: Option<&str>) -> usize {
    tag.and_then(|t| QUALITY_TAGS.iter().position(|known| known.eq_ignore_ascii_case(t)))
        .unwrap_or(usize::MAX)
}

/// Whether `name` is a theater capture (CAM, HDCAM, TS...).
pub fn is_low_fidelity(name: &str) -> bool {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            LOW_FIDELITY_TOKENS
                .iter()
                .any(|low| token.eq_ignore_ascii_case(low))
        })
}

/// Strip a media extension, collapse separators to single spaces, lowercase.
pub fn normalize_name(name: &str) -> String {
    let stripped = MEDIA_EXTENSION.replace(name, "");
    SEPARATORS
        .replace_all(&stripped, " ")
        .to_lowercase()
        .trim()
        .to_string()
}

/// Normalized names are equal, or one contains the other.
pub fn is_exact_match(name: &str, hint: &str) -> bool {
    let name = normalize_name(name);
    let hint = normalize_name(hint);
    if name.is_empty() || hint.is_empty() {
        return false;
    }
    name == hint || name.contains(&hint) || hint.contains(&name)
}
