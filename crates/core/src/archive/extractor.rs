//! Writes subtitle members into the scratch directory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use super::encoding::recover_text;
use super::rar::read_rar_members;
use super::repair::repair_subtitle;
use super::types::{ArchiveError, ArchiveFormat, ArchiveMember};

const SUBTITLE_EXTENSIONS: [&str; 5] = [".srt", ".sub", ".ass", ".ssa", ".vtt"];

/// Whether an archive member is a subtitle file, judged by extension.
pub fn is_subtitle_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    SUBTITLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Turns archive members into repaired UTF-8 files in the scratch directory.
///
/// Output names are `extracted_{id}_{index}_{member}`, where `id` is unique
/// per download and `index` is the member's position among the subtitle
/// members of that archive.
#[derive(Debug)]
pub struct ArchiveExtractor {
    scratch_dir: PathBuf,
    seq: AtomicU64,
}

impl ArchiveExtractor {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            seq: AtomicU64::new(0),
        }
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// A digits-only id, unique within this process.
    pub fn next_extract_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}{:04}", chrono::Utc::now().timestamp_millis(), seq % 10_000)
    }

    /// Where the raw archive for `id` is streamed to.
    pub fn temp_archive_path(&self, id: &str, format: ArchiveFormat) -> PathBuf {
        self.scratch_dir
            .join(format!("stream_{}.{}", id, format.extension()))
    }

    /// Decode, repair and write one member.
    pub async fn write_member(
        &self,
        id: &str,
        index: usize,
        member: &ArchiveMember,
    ) -> Result<PathBuf, ArchiveError> {
        let decoded = recover_text(&member.data);
        if !decoded.confident {
            debug!(
                member = %member.name,
                encoding = decoded.encoding,
                "Low-confidence encoding guess"
            );
        }
        let repaired = repair_subtitle(&decoded.text);

        let path = self.scratch_dir.join(format!(
            "extracted_{}_{}_{}",
            id,
            index,
            sanitize_member_name(&member.name)
        ));
        tokio::fs::write(&path, repaired.as_bytes())
            .await
            .map_err(|e| ArchiveError::io(&path, e))?;

        debug!("Extracted {} -> {}", member.name, path.display());
        Ok(path)
    }

    /// Extract the subtitle members of a completely written archive,
    /// skipping the first `skip` of them (already written progressively).
    pub async fn extract_file(
        &self,
        archive: &Path,
        format: ArchiveFormat,
        id: &str,
        skip: usize,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let path = archive.to_path_buf();
        let members = tokio::task::spawn_blocking(move || match format {
            ArchiveFormat::Zip => read_zip_members(&path, is_subtitle_name),
            ArchiveFormat::Rar => read_rar_members(&path, is_subtitle_name),
        })
        .await
        .map_err(|e| ArchiveError::Extraction(format!("extraction task failed: {}", e)))??;

        let mut written = Vec::with_capacity(members.len().saturating_sub(skip));
        for (index, member) in members.iter().enumerate().skip(skip) {
            written.push(self.write_member(id, index, member).await?);
        }
        Ok(written)
    }

    /// Remove the raw archive. Failures are logged only.
    pub async fn discard_archive(&self, archive: &Path) {
        match tokio::fs::remove_file(archive).await {
            Ok(()) => debug!("Removed temporary archive {}", archive.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove temporary archive {}: {}",
                archive.display(),
                e
            ),
        }
    }
}

/// Central-directory ZIP reading, members in directory order.
pub(crate) fn read_zip_members(
    path: &Path,
    wanted: fn(&str) -> bool,
) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let file = File::open(path).map_err(|e| ArchiveError::io(path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ArchiveError::Extraction(e.to_string()))?;

    let mut members = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ArchiveError::Extraction(e.to_string()))?;
        if entry.is_dir() || !wanted(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::Extraction(format!("cannot read {}: {}", name, e)))?;
        members.push(ArchiveMember { name, data });
    }
    Ok(members)
}

/// Basename of an archive path, limited to filesystem-safe characters.
fn sanitize_member_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "subtitle.srt".to_string()
    } else {
        cleaned
    }
}
