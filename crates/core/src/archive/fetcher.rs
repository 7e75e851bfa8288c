//! Streaming archive download.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, Proxy, StatusCode};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::config::ExtractionConfig;
use super::detect::{detect_format, MAGIC_LEN};
use super::extractor::{is_subtitle_name, ArchiveExtractor};
use super::types::{ArchiveError, ArchiveFormat, FetchOptions};
use super::zip_progressive::{ProgressiveZipReader, ZipPoll};
use crate::metrics;
use crate::proxy::ProxyEndpoint;

/// Downloads an archive and returns the extracted subtitle files.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Paths are returned in archive member order.
    async fn download_and_extract(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<PathBuf>, ArchiveError>;
}

/// Progress of the download half, observed by the extraction half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    InProgress,
    Complete,
    Failed,
}

/// HTTP archive fetcher that writes to disk as bytes arrive.
///
/// ZIP archives are extracted while the download is still running when
/// `progressive` is enabled. RAR archives (and ZIP with `progressive`
/// disabled) are extracted once the file is complete.
pub struct StreamingFetcher {
    config: ExtractionConfig,
    extractor: Arc<ArchiveExtractor>,
    client: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl StreamingFetcher {
    pub fn new(config: ExtractionConfig, extractor: Arc<ArchiveExtractor>) -> Self {
        let client = Client::builder()
            .timeout(config.download_timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            extractor,
            client,
            proxied: Mutex::new(HashMap::new()),
        }
    }

    pub fn extractor(&self) -> &Arc<ArchiveExtractor> {
        &self.extractor
    }

    /// Client routed through `proxy`, built once per endpoint.
    fn client_for(&self, url: &str, proxy: Option<&ProxyEndpoint>) -> Result<Client, ArchiveError> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let mut cache = self.proxied.lock().unwrap();
        if let Some(client) = cache.get(&proxy.url) {
            return Ok(client.clone());
        }

        let proxy_error = |message: String| ArchiveError::Fetch {
            url: url.to_string(),
            message,
            connect: true,
        };

        let mut route = Proxy::all(&proxy.url)
            .map_err(|e| proxy_error(format!("invalid proxy {}: {}", proxy, e)))?;
        if let Some(credentials) = &proxy.credentials {
            route = route.basic_auth(&credentials.username, &credentials.password);
        }

        let client = Client::builder()
            .timeout(self.config.download_timeout())
            .proxy(route)
            .build()
            .map_err(|e| proxy_error(format!("proxy client for {}: {}", proxy, e)))?;

        cache.insert(proxy.url.clone(), client.clone());
        Ok(client)
    }

    async fn download(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let client = self.client_for(url, options.proxy.as_ref())?;

        let mut request = client.get(url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ArchiveError::from_reqwest(url, e))?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ArchiveError::Throttled {
                    url: url.to_string(),
                })
            }
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => {
                return Err(ArchiveError::Fetch {
                    url: url.to_string(),
                    message: "proxy authentication rejected".to_string(),
                    connect: true,
                })
            }
            status if !status.is_success() => {
                return Err(ArchiveError::Fetch {
                    url: url.to_string(),
                    message: format!("HTTP {}", status),
                    connect: false,
                })
            }
            _ => {}
        }

        let total = response.content_length();
        let mut stream = Box::pin(response.bytes_stream());

        let mut head = Vec::with_capacity(MAGIC_LEN);
        while head.len() < MAGIC_LEN {
            match stream.next().await {
                Some(chunk) => {
                    head.extend_from_slice(&chunk.map_err(|e| ArchiveError::from_reqwest(url, e))?)
                }
                None => break,
            }
        }
        let format = detect_format(&head)?;

        let id = self.extractor.next_extract_id();
        let archive_path = self.extractor.temp_archive_path(&id, format);
        debug!(url = %url, format = %format, path = %archive_path.display(), "Streaming archive");

        let started = Instant::now();
        let result = self
            .stream_and_extract(url, stream, head, total, format, &id, &archive_path)
            .await;
        self.extractor.discard_archive(&archive_path).await;

        let mode = if format == ArchiveFormat::Zip && self.config.progressive {
            "progressive"
        } else {
            "buffered"
        };
        if let Ok(files) = &result {
            metrics::ARCHIVES_EXTRACTED
                .with_label_values(&[format.extension(), mode])
                .inc();
            metrics::EXTRACTION_DURATION
                .with_label_values(&[format.extension()])
                .observe(started.elapsed().as_secs_f64());
            metrics::MEMBERS_EXTRACTED
                .with_label_values(&[format.extension()])
                .inc_by(files.len() as u64);
            info!(
                url = %url,
                format = %format,
                mode,
                files = files.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Archive extracted"
            );
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn stream_and_extract<S, B>(
        &self,
        url: &str,
        stream: S,
        head: Vec<u8>,
        total: Option<u64>,
        format: ArchiveFormat,
        id: &str,
        archive_path: &Path,
    ) -> Result<Vec<PathBuf>, ArchiveError>
    where
        S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
        B: AsRef<[u8]>,
    {
        let file = File::create(archive_path)
            .await
            .map_err(|e| ArchiveError::io(archive_path, e))?;
        let (state_tx, state_rx) = watch::channel(DownloadState::InProgress);
        let download = write_stream(url, stream, head, total, file, archive_path, state_tx);

        let timeout = self.config.extraction_timeout();
        let timed_out = || ArchiveError::ExtractionTimeout {
            after_secs: self.config.extraction_timeout_secs,
        };

        if format == ArchiveFormat::Zip && self.config.progressive {
            let extraction = async {
                tokio::time::timeout(timeout, self.extract_progressively(archive_path, id, state_rx))
                    .await
                    .map_err(|_| timed_out())?
            };
            let (_, files) = tokio::try_join!(download, extraction)?;
            Ok(files)
        } else {
            download.await?;
            tokio::time::timeout(
                timeout,
                self.extractor.extract_file(archive_path, format, id, 0),
            )
            .await
            .map_err(|_| timed_out())?
        }
    }

    /// Poll the growing ZIP until every member is out, falling back to the
    /// central directory once the download completes when local headers
    /// are not enough.
    async fn extract_progressively(
        &self,
        archive_path: &Path,
        id: &str,
        mut state: watch::Receiver<DownloadState>,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let mut reader = ProgressiveZipReader::new(archive_path, is_subtitle_name);
        let mut files = Vec::new();
        let mut ticker = tokio::time::interval(self.config.poll_interval());

        loop {
            let finished = *state.borrow() != DownloadState::InProgress;

            match reader.try_open_next().await? {
                ZipPoll::Member(member) => {
                    files.push(self.extractor.write_member(id, files.len(), &member).await?);
                    continue;
                }
                ZipPoll::Exhausted => return Ok(files),
                ZipPoll::RequiresCentralDirectory => {
                    return self.finish_from_central_directory(archive_path, id, files, &mut state).await;
                }
                ZipPoll::NotReady if finished => {
                    debug!(
                        path = %archive_path.display(),
                        "Local headers ended early, reading central directory"
                    );
                    return self.finish_from_central_directory(archive_path, id, files, &mut state).await;
                }
                ZipPoll::NotReady => {}
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = state.changed() => {}
            }
        }
    }

    async fn finish_from_central_directory(
        &self,
        archive_path: &Path,
        id: &str,
        mut files: Vec<PathBuf>,
        state: &mut watch::Receiver<DownloadState>,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let outcome = *state
            .wait_for(|s| *s != DownloadState::InProgress)
            .await
            .map_err(|_| ArchiveError::Extraction("download ended without a result".to_string()))?;
        if outcome == DownloadState::Failed {
            return Err(ArchiveError::Extraction(
                "download failed before extraction finished".to_string(),
            ));
        }

        let rest = self
            .extractor
            .extract_file(archive_path, ArchiveFormat::Zip, id, files.len())
            .await?;
        files.extend(rest);
        Ok(files)
    }
}

#[async_trait]
impl ArchiveFetcher for StreamingFetcher {
    async fn download_and_extract(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let result = self.download(url, options).await;
        if let Err(e) = &result {
            warn!(url = %url, error = %e, "Archive acquisition failed");
        }
        result
    }
}

/// Write the response body to disk, flushing after every chunk so the
/// extraction side sees bytes as soon as they arrive.
async fn write_stream<S, B>(
    url: &str,
    mut stream: S,
    head: Vec<u8>,
    total: Option<u64>,
    mut file: File,
    path: &Path,
    state: watch::Sender<DownloadState>,
) -> Result<u64, ArchiveError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let result = async {
        let mut written = 0u64;
        let mut next_report = 10u64;

        let mut write = |chunk: &[u8]| {
            written += chunk.len() as u64;
            metrics::BYTES_DOWNLOADED.inc_by(chunk.len() as u64);
            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = written * 100 / total;
                if percent >= next_report {
                    debug!(url = %url, percent, written, total, "Download progress");
                    next_report = (percent / 10 + 1) * 10;
                }
            }
        };

        file.write_all(&head)
            .await
            .map_err(|e| ArchiveError::io(path, e))?;
        file.flush().await.map_err(|e| ArchiveError::io(path, e))?;
        write(&head);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ArchiveError::from_reqwest(url, e))?;
            let bytes = chunk.as_ref();
            file.write_all(bytes)
                .await
                .map_err(|e| ArchiveError::io(path, e))?;
            file.flush().await.map_err(|e| ArchiveError::io(path, e))?;
            write(bytes);
        }

        file.sync_data().await.map_err(|e| ArchiveError::io(path, e))?;
        Ok(written)
    }
    .await;

    state.send_replace(if result.is_ok() {
        DownloadState::Complete
    } else {
        DownloadState::Failed
    });
    result
}
