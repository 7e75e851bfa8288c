//! Text encoding recovery for subtitle files.
//!
//! Subtitles on the source site come in a mix of UTF-8, UTF-16 and the
//! Central European legacy code pages. Valid UTF-16 (BOM or zero high bytes)
//! and valid UTF-8 are taken as they are. Otherwise each legacy code page is
//! tried in order; the first one that decodes cleanly and yields a Romanian
//! diacritic wins.

use std::borrow::Cow;

use encoding_rs::{Encoding, ISO_8859_2, UTF_16LE, UTF_8, WINDOWS_1250};
use tracing::{debug, warn};

use crate::metrics;

const LEGACY_CANDIDATES: [&Encoding; 2] = [WINDOWS_1250, ISO_8859_2];

const FALLBACK: &Encoding = WINDOWS_1250;

const DIACRITICS: &[char] = &[
    'ă', 'â', 'î', 'ș', 'ş', 'ț', 'ţ', 'Ă', 'Â', 'Î', 'Ș', 'Ş', 'Ț', 'Ţ',
];

/// Result of encoding recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding that was applied.
    pub encoding: &'static str,
    /// False when no candidate produced a diacritic and a fallback was used.
    pub confident: bool,
}

/// Decode subtitle bytes, guessing the encoding.
///
/// Already-clean UTF-8 comes back unchanged, diacritics or not.
pub fn recover_text(bytes: &[u8]) -> DecodedText {
    if looks_like_utf16le(bytes) {
        if let Some(text) = decode_strict(UTF_16LE, bytes) {
            return accept(text.into_owned(), UTF_16LE);
        }
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return accept(text.to_string(), UTF_8);
    }

    for encoding in LEGACY_CANDIDATES {
        let Some(text) = decode_strict(encoding, bytes) else {
            continue;
        };
        if !text.contains('\u{FFFD}') && text.contains(DIACRITICS) {
            return DecodedText {
                text: text.into_owned(),
                encoding: encoding.name(),
                confident: true,
            };
        }
    }

    metrics::LOW_CONFIDENCE_DECODES.inc();
    warn!(
        "Could not detect subtitle encoding, falling back to {}",
        FALLBACK.name()
    );
    let (text, _) = FALLBACK.decode_without_bom_handling(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding: FALLBACK.name(),
        confident: false,
    }
}

/// A Unicode decode is kept as is; confidence comes from the diacritic check.
fn accept(text: String, encoding: &'static Encoding) -> DecodedText {
    let confident = text.contains(DIACRITICS);
    if !confident {
        metrics::LOW_CONFIDENCE_DECODES.inc();
        debug!(
            "No diacritics found, keeping {} ({} bytes)",
            encoding.name(),
            text.len()
        );
    }
    DecodedText {
        text,
        encoding: encoding.name(),
        confident,
    }
}

fn decode_strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    if encoding == UTF_16LE {
        let body = bytes.strip_prefix(b"\xFF\xFE").unwrap_or(bytes);
        return encoding.decode_without_bom_handling_and_without_replacement(body);
    }
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// UTF-16LE needs a BOM or mostly-zero high bytes to be considered at all;
/// any even-length input would otherwise "decode".
fn looks_like_utf16le(bytes: &[u8]) -> bool {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return false;
    }
    if bytes.starts_with(b"\xFF\xFE") {
        return true;
    }
    let high = bytes.iter().skip(1).step_by(2);
    let zeros = high.clone().filter(|&&b| b == 0).count();
    zeros * 2 >= high.count()
}
