//! File-backed result cache.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::types::{CacheEntry, CacheError, CacheKey, SweepReport};
use crate::media::SubtitleResult;
use crate::metrics;

const EXTENSION: &str = "json";

/// Ranked results persisted per episode or movie, one JSON file per key.
///
/// Reads fail open: anything unreadable, expired or empty is deleted and
/// reported as a miss. An empty result list is never written.
#[derive(Clone)]
pub struct ResultCache {
    config: CacheConfig,
    tmp_seq: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

enum Verdict {
    Fresh(CacheEntry),
    Expired,
    Poisoned,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            tmp_seq: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.config
            .dir
            .join(format!("{}.{}", key.file_stem(), EXTENSION))
    }

    /// Cached results for `key`, or `None` on a miss of any kind.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<SubtitleResult>> {
        if !self.config.enabled {
            return None;
        }

        let path = self.path_for(key);
        let outcome = match read_entry(&path).await {
            Ok(None) => "miss",
            Ok(Some(entry)) => match self.judge(entry, Utc::now()) {
                Verdict::Fresh(entry) => {
                    debug!(key = %key, count = entry.subtitles.len(), "Cache hit");
                    record("get", "hit");
                    return Some(entry.subtitles);
                }
                Verdict::Expired => {
                    debug!(key = %key, "Cache entry expired");
                    remove_quietly(&path).await;
                    "expired"
                }
                Verdict::Poisoned => {
                    warn!(key = %key, "Removing cache entry with no subtitles");
                    remove_quietly(&path).await;
                    "poisoned"
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Unreadable cache entry, treating as miss");
                if matches!(e, CacheError::Corrupt { .. }) {
                    remove_quietly(&path).await;
                }
                "corrupt"
            }
        };

        record("get", outcome);
        None
    }

    /// Store results for `key`. An empty list removes the entry instead.
    pub async fn set(&self, key: &CacheKey, subtitles: &[SubtitleResult]) -> Result<(), CacheError> {
        if !self.config.enabled {
            return Ok(());
        }

        let path = self.path_for(key);
        if subtitles.is_empty() {
            if self.remove(key).await? {
                debug!(key = %key, "Dropped cache entry for empty result");
            }
            record("set", "skipped_empty");
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.config.dir)
            .await
            .map_err(|e| io_error(&self.config.dir, e))?;

        let now = Utc::now();
        let entry = CacheEntry {
            key: key.clone(),
            subtitles: subtitles.to_vec(),
            created_at: now,
            expires_at: now + self.config.ttl(),
        };
        let json = serde_json::to_vec_pretty(&entry)?;

        // Concurrent writers each use their own temp file; last rename wins.
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", EXTENSION, seq));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            remove_quietly(&tmp).await;
            return Err(io_error(&path, e));
        }

        debug!(key = %key, count = subtitles.len(), "Cached results");
        record("set", "written");
        Ok(())
    }

    /// Delete the entry for `key`. Returns whether one existed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    /// Whether a fresh, non-empty entry exists. Does not delete anything.
    pub async fn contains(&self, key: &CacheKey) -> bool {
        if !self.config.enabled {
            return false;
        }
        match read_entry(&self.path_for(key)).await {
            Ok(Some(entry)) => matches!(self.judge(entry, Utc::now()), Verdict::Fresh(_)),
            _ => false,
        }
    }

    /// Delete expired, empty and unreadable entries.
    pub async fn sweep(&self) -> Result<SweepReport, CacheError> {
        let mut report = SweepReport::default();
        let dir = &self.config.dir;

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(io_error(dir, e)),
        };

        let now = Utc::now();
        while let Some(item) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            report.scanned += 1;

            match read_entry(&path).await {
                Ok(Some(entry)) => match self.judge(entry, now) {
                    Verdict::Fresh(_) => {}
                    Verdict::Expired => {
                        remove_quietly(&path).await;
                        report.expired += 1;
                    }
                    Verdict::Poisoned => {
                        remove_quietly(&path).await;
                        report.poisoned += 1;
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    debug!("Sweeping unreadable cache file: {}", e);
                    remove_quietly(&path).await;
                    report.corrupt += 1;
                }
            }
        }

        if report.removed() > 0 {
            metrics::CACHE_OPERATIONS
                .with_label_values(&["sweep", "removed"])
                .inc_by(report.removed() as u64);
        }
        info!(
            scanned = report.scanned,
            expired = report.expired,
            poisoned = report.poisoned,
            corrupt = report.corrupt,
            "Cache sweep finished"
        );
        Ok(report)
    }

    /// Start the periodic sweep (runs once immediately).
    pub fn start_maintenance(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Cache maintenance already running");
            return;
        }

        let cache = self.clone();
        let interval = self.config.maintenance_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Cache maintenance loop started");
            loop {
                if !cache.running.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = cache.sweep().await {
                    warn!("Cache sweep failed: {}", e);
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cache maintenance received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Cache maintenance loop stopped");
        });
    }

    pub fn stop_maintenance(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_maintenance_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Expired by its own stamp or by the currently configured TTL.
    fn judge(&self, entry: CacheEntry, now: DateTime<Utc>) -> Verdict {
        if entry.is_expired(now) || now - entry.created_at >= self.config.ttl() {
            Verdict::Expired
        } else if entry.subtitles.is_empty() {
            Verdict::Poisoned
        } else {
            Verdict::Fresh(entry)
        }
    }
}

async fn read_entry(path: &Path) -> Result<Option<CacheEntry>, CacheError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove cache file {}: {}", path.display(), e);
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn record(operation: &str, result: &str) {
    metrics::CACHE_OPERATIONS
        .with_label_values(&[operation, result])
        .inc();
}
