//! Testing utilities and mock implementations.
//!
//! Mocks for the listing source and the archive fetcher let the search
//! pipeline run without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use subscout_core::testing::{fixtures, MockArchiveFetcher, MockListingSource};
//!
//! let listing = MockListingSource::new();
//! listing.set_candidates(vec![fixtures::candidate(0, "Show", "S02E05")]).await;
//!
//! let fetcher = MockArchiveFetcher::new();
//! fetcher.add_files(&fixtures::candidate_url(0), &["extracted_1_0_Show.S02E05.srt"]).await;
//! ```

mod mock_fetcher;
mod mock_listing;

pub use mock_fetcher::{MockArchiveFetcher, RecordedFetch};
pub use mock_listing::MockListingSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::io::{Cursor, Write};

    use crate::listing::CandidateSubtitle;
    use crate::media::SubtitleResult;

    /// Archive URL of the `index`-th fixture candidate.
    pub fn candidate_url(index: usize) -> String {
        format!("https://subs.ro/subtitrare/descarca/{}", 100 + index)
    }

    /// A Romanian candidate with id `c{index}`.
    pub fn candidate(index: usize, title: &str, comment: &str) -> CandidateSubtitle {
        CandidateSubtitle {
            id: format!("c{}", index),
            source_url: candidate_url(index),
            language: "ron".to_string(),
            title: title.to_string(),
            comment: comment.to_string(),
            translator: None,
            version: None,
        }
    }

    /// `count` distinct served subtitles.
    pub fn subtitle_results(count: usize) -> Vec<SubtitleResult> {
        (0..count)
            .map(|i| SubtitleResult {
                id: format!("subsro_{}_tt1234567_0", i),
                url: format!(
                    "http://localhost:7000/subtitle/extracted_1700000000000{}_0_Show.S02E05.{}.srt",
                    i, i
                ),
                lang: "ron".to_string(),
            })
            .collect()
    }

    /// An in-memory ZIP with deflated members, in the given order.
    pub fn zip_archive(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in members {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// A stored (uncompressed) RAR with `Show.S02E05.srt` (UTF-8, CRLF),
    /// `readme.txt` and `Show.S02E06.srt` (windows-1250, CRLF), in that order.
    pub const RAR_TWO_EPISODES: &[u8] = include_bytes!("../../tests/data/two_episodes.rar");

    /// A listing page with five rows: two Romanian rows, one English row,
    /// one row without an archive link and one untitled Romanian row.
    pub const LISTING_HTML: &str = r#"<!DOCTYPE html>
<html>
<body>
  <div class="grid grid-cols-12 gap-4">
    <h1><a href="/subtitrare/show-2020/101">Show (2020)</a></h1>
    <img src="/flags/ro.png" alt="Subtitrare - ro">
    <div class="bg-[#f4f3e9] p-2"><p>Show.S02E05.1080p.WEB-DL, Show.S02E05.720p.HDTV</p></div>
    <p>Traducător: Ion</p>
    <a href="/subtitrare/descarca/101">Descarcă</a>
  </div>
  <div class="grid grid-cols-12 gap-4">
    <h1><a href="/subtitrare/show-2020/102" title="Show Season 2"></a></h1>
    <div class="bg-[#f4f3e9] p-2"><p>S02 complet</p></div>
    <a href="https://cdn.subs.ro/subtitrare/descarca/102">Descarcă</a>
  </div>
  <div class="grid grid-cols-12 gap-4">
    <h1><a href="/subtitrare/show-2020/103">Show (2020)</a></h1>
    <img src="/flags/en.png" alt="Subtitrare - en">
    <a href="/subtitrare/descarca/103">Download</a>
  </div>
  <div class="grid grid-cols-12 gap-4">
    <h1><a href="/subtitrare/show-2020/104">Show (2020)</a></h1>
    <img src="/flags/ro.png" alt="Subtitrare - ro">
  </div>
  <div class="grid grid-cols-12 gap-4">
    <img src="/flags/ro.png" alt="Subtitrare - ro">
    <a href="/subtitrare/descarca/105">Descarcă</a>
  </div>
</body>
</html>
"#;
}
