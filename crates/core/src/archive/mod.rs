//! Archive download and subtitle extraction.
//!
//! Archives are streamed to the scratch directory. The format is sniffed
//! from the first four bytes:
//! - **ZIP**: members are extracted from local headers while the download
//!   is still being written, falling back to the central directory when a
//!   member's size is only known after its data
//! - **RAR**: extracted once the whole archive is on disk
//!
//! Every subtitle member is decoded (encoding recovery), repaired (line
//! endings, BOM, cue numbering) and written back as UTF-8.

mod config;
mod detect;
mod encoding;
mod extractor;
mod fetcher;
mod rar;
mod repair;
mod types;
mod zip_progressive;

pub use config::ExtractionConfig;
pub use detect::detect_format;
pub use encoding::{recover_text, DecodedText};
pub use extractor::{is_subtitle_name, ArchiveExtractor};
pub use fetcher::{ArchiveFetcher, DownloadState, StreamingFetcher};
pub use repair::repair_subtitle;
pub use types::{ArchiveError, ArchiveFormat, ArchiveMember, FetchOptions};
pub use zip_progressive::{ProgressiveZipReader, ZipPoll};
