//! Retention and size-cap enforcement for the scratch directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::config::ScratchConfig;
use crate::metrics;

/// Prefix of archives that may still be downloading.
const IN_PROGRESS_PREFIX: &str = "stream_";

/// A regular file found in the scratch directory.
#[derive(Debug, Clone)]
pub struct ScratchFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

/// Outcome of one janitor sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchReport {
    pub scanned: usize,
    /// Removed for exceeding the retention period.
    pub expired: usize,
    /// Removed to bring the directory under the size cap.
    pub evicted: usize,
    pub bytes_freed: u64,
}

/// Decide which files to delete.
///
/// Returns `(expired, evicted)`. Files at or past `retention` go first; then
/// the oldest remaining files go until the total is within `max_bytes`.
/// Archives still named `stream_*` are only ever removed by retention.
pub fn plan_removals(
    files: Vec<ScratchFile>,
    now: SystemTime,
    retention: Duration,
    max_bytes: u64,
) -> (Vec<ScratchFile>, Vec<ScratchFile>) {
    let (expired, mut kept): (Vec<_>, Vec<_>) = files.into_iter().partition(|file| {
        now.duration_since(file.modified).unwrap_or(Duration::ZERO) >= retention
    });

    let mut total: u64 = kept.iter().map(|f| f.len).sum();
    if total <= max_bytes {
        return (expired, Vec::new());
    }

    kept.sort_by_key(|f| f.modified);
    let mut evicted = Vec::new();
    for file in kept {
        if total <= max_bytes {
            break;
        }
        if is_in_progress(&file.path) {
            continue;
        }
        total = total.saturating_sub(file.len);
        evicted.push(file);
    }
    (expired, evicted)
}

fn is_in_progress(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(IN_PROGRESS_PREFIX))
}

/// Periodically clears old extracted files out of the scratch directory.
#[derive(Clone)]
pub struct ScratchJanitor {
    config: ScratchConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ScratchJanitor {
    pub fn new(config: ScratchConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &ScratchConfig {
        &self.config
    }

    /// Create the scratch directory if needed.
    pub async fn prepare(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.config.dir).await
    }

    /// One pass over the directory. A missing directory is an empty sweep.
    pub async fn sweep(&self) -> std::io::Result<ScratchReport> {
        let files = match list_files(&self.config.dir).await {
            Ok(files) => files,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ScratchReport::default())
            }
            Err(e) => return Err(e),
        };

        let mut report = ScratchReport {
            scanned: files.len(),
            ..Default::default()
        };
        let (expired, evicted) = plan_removals(
            files,
            SystemTime::now(),
            self.config.retention(),
            self.config.max_size_bytes(),
        );

        for file in expired {
            if remove(&file.path).await {
                report.expired += 1;
                report.bytes_freed += file.len;
            }
        }
        for file in evicted {
            if remove(&file.path).await {
                report.evicted += 1;
                report.bytes_freed += file.len;
            }
        }

        let removed = (report.expired + report.evicted) as u64;
        metrics::SCRATCH_FILES_REMOVED.inc_by(removed);
        if removed > 0 {
            info!(
                expired = report.expired,
                evicted = report.evicted,
                bytes_freed = report.bytes_freed,
                "Scratch sweep removed files"
            );
        } else {
            debug!(scanned = report.scanned, "Scratch sweep found nothing to remove");
        }
        Ok(report)
    }

    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scratch janitor already running");
            return;
        }

        let janitor = self.clone();
        let interval = self.config.sweep_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(dir = %janitor.config.dir.display(), "Scratch janitor started");
            loop {
                if !janitor.running.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = janitor.sweep().await {
                    warn!("Scratch sweep failed: {}", e);
                }
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Scratch janitor received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Scratch janitor stopped");
        });
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

async fn list_files(dir: &Path) -> std::io::Result<Vec<ScratchFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                debug!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        files.push(ScratchFile {
            path: entry.path(),
            modified,
            len: metadata.len(),
        });
    }
    Ok(files)
}

/// Delete one file; `false` if it could not be removed.
async fn remove(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed scratch file {}", path.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove scratch file {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn file(name: &str, age: Duration, len: u64, now: SystemTime) -> ScratchFile {
        ScratchFile {
            path: PathBuf::from(name),
            modified: now - age,
            len,
        }
    }

    fn names(files: &[ScratchFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_plan_expires_by_retention() {
        let now = SystemTime::now();
        let files = vec![
            file("old.srt", 50 * HOUR, 10, now),
            file("new.srt", HOUR, 10, now),
            file("edge.srt", 48 * HOUR, 10, now),
        ];

        let (expired, evicted) = plan_removals(files, now, 48 * HOUR, 1_000);

        assert_eq!(names(&expired), vec!["old.srt", "edge.srt"]);
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_plan_evicts_oldest_until_under_cap() {
        let now = SystemTime::now();
        let files = vec![
            file("c.srt", HOUR, 40, now),
            file("a.srt", 3 * HOUR, 40, now),
            file("b.srt", 2 * HOUR, 40, now),
        ];

        let (expired, evicted) = plan_removals(files, now, 48 * HOUR, 50);

        assert!(expired.is_empty());
        assert_eq!(names(&evicted), vec!["a.srt", "b.srt"]);
    }

    #[test]
    fn test_plan_never_evicts_in_progress_archive() {
        let now = SystemTime::now();
        let files = vec![
            file("stream_1.zip", 5 * HOUR, 100, now),
            file("extracted_1_0_a.srt", HOUR, 10, now),
        ];

        let (_, evicted) = plan_removals(files, now, 48 * HOUR, 50);

        assert_eq!(names(&evicted), vec!["extracted_1_0_a.srt"]);
    }

    #[test]
    fn test_plan_future_mtime_is_fresh() {
        let now = SystemTime::now();
        let files = vec![ScratchFile {
            path: PathBuf::from("skewed.srt"),
            modified: now + HOUR,
            len: 1,
        }];

        let (expired, evicted) = plan_removals(files, now, HOUR, 10);
        assert!(expired.is_empty());
        assert!(evicted.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_missing_dir_is_empty() {
        let janitor = ScratchJanitor::new(ScratchConfig {
            dir: PathBuf::from("/nonexistent/subscout-scratch"),
            ..Default::default()
        });
        assert_eq!(janitor.sweep().await.unwrap(), ScratchReport::default());
    }

    #[tokio::test]
    async fn test_sweep_removes_everything_with_zero_retention() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("extracted_1_0_a.srt"), b"1\nA\n").unwrap();
        std::fs::write(dir.path().join("extracted_1_1_b.srt"), b"1\nB\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let janitor = ScratchJanitor::new(ScratchConfig {
            dir: dir.path().to_path_buf(),
            retention_hours: 0,
            ..Default::default()
        });
        let report = janitor.sweep().await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.expired, 2);
        assert_eq!(report.bytes_freed, 8);
        assert!(dir.path().join("nested").exists());
        assert!(!dir.path().join("extracted_1_0_a.srt").exists());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("extracted_1_0_a.srt"), b"1\nA\n").unwrap();

        let janitor = ScratchJanitor::new(ScratchConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let report = janitor.sweep().await.unwrap();

        assert_eq!(report.scanned, 1);
        assert_eq!(report.expired + report.evicted, 0);
        assert!(dir.path().join("extracted_1_0_a.srt").exists());
    }

    #[tokio::test]
    async fn test_prepare_creates_dir() {
        let dir = TempDir::new().unwrap();
        let janitor = ScratchJanitor::new(ScratchConfig {
            dir: dir.path().join("a/b"),
            ..Default::default()
        });
        janitor.prepare().await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn test_start_stop() {
        let dir = TempDir::new().unwrap();
        let janitor = ScratchJanitor::new(ScratchConfig {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        assert!(!janitor.is_running());
        janitor.start();
        assert!(janitor.is_running());
        janitor.stop();
        assert!(!janitor.is_running());
    }
}
