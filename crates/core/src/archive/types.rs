//! Archive types and errors.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::proxy::ProxyEndpoint;
use crate::queue::Throttling;

/// Errors that can occur while downloading or extracting an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Network-level failure or unexpected HTTP status.
    #[error("Download failed for {url}: {message}")]
    Fetch {
        url: String,
        message: String,
        /// The connection itself failed (DNS, refused, proxy rejected).
        connect: bool,
    },

    /// The download did not finish in time.
    #[error("Download timed out for {url}")]
    Timeout { url: String },

    /// Upstream answered with HTTP 429.
    #[error("Rate limited by upstream (HTTP 429) for {url}")]
    Throttled { url: String },

    /// The first bytes match no supported archive signature.
    #[error("Unknown archive format (magic bytes {magic})")]
    UnknownFormat { magic: String },

    /// Extraction did not finish within the configured bound.
    #[error("Archive extraction timed out after {after_secs}s")]
    ExtractionTimeout { after_secs: u64 },

    /// The archive could not be read.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Scratch file I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArchiveError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Fetch {
                url: url.to_string(),
                message: error.to_string(),
                connect: error.is_connect(),
            }
        }
    }

    /// Whether the egress proxy is the likely culprit.
    pub fn is_proxy_failure(&self) -> bool {
        matches!(
            self,
            ArchiveError::Fetch { connect: true, .. } | ArchiveError::Timeout { .. }
        )
    }

    /// Whether a later attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ArchiveError::Fetch { .. } | ArchiveError::Timeout { .. } | ArchiveError::Throttled { .. }
        )
    }
}

impl Throttling for ArchiveError {
    fn is_throttled(&self) -> bool {
        matches!(self, ArchiveError::Throttled { .. })
    }
}

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Rar,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Rar => "rar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw bytes of one archive member.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Path inside the archive.
    pub name: String,
    pub data: Vec<u8>,
}

/// Per-request download options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub proxy: Option<ProxyEndpoint>,
}

impl FetchOptions {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyEndpoint) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_predicates() {
        let throttled = ArchiveError::Throttled {
            url: "u".to_string(),
        };
        assert!(throttled.is_throttled());
        assert!(throttled.is_retryable());
        assert!(!throttled.is_proxy_failure());

        let refused = ArchiveError::Fetch {
            url: "u".to_string(),
            message: "connection refused".to_string(),
            connect: true,
        };
        assert!(refused.is_proxy_failure());
        assert!(!refused.is_throttled());

        let unknown = ArchiveError::UnknownFormat {
            magic: "3c68746d".to_string(),
        };
        assert!(!unknown.is_retryable());
        assert!(!unknown.is_proxy_failure());
    }

    #[test]
    fn test_fetch_options_builder() {
        let options = FetchOptions::default()
            .with_header("Referer", "https://subs.ro/")
            .with_proxy(ProxyEndpoint::parse("10.0.0.1:8080").unwrap());
        assert_eq!(options.headers.len(), 1);
        assert!(options.proxy.is_some());
    }
}
