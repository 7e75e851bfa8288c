//! RAR member extraction.
//!
//! RAR needs the complete file on disk. The unrar library is blocking, so
//! callers run this inside `spawn_blocking`.

use std::path::Path;

use tracing::debug;

use super::types::{ArchiveError, ArchiveMember};

/// Read every file member whose name passes `wanted`, in archive order.
pub fn read_rar_members(
    path: &Path,
    wanted: fn(&str) -> bool,
) -> Result<Vec<ArchiveMember>, ArchiveError> {
    let mut archive = unrar::Archive::new(path)
        .open_for_processing()
        .map_err(|e| ArchiveError::Extraction(format!("cannot open RAR: {}", e)))?;

    let mut members = Vec::new();
    while let Some(header) = archive
        .read_header()
        .map_err(|e| ArchiveError::Extraction(format!("bad RAR header: {}", e)))?
    {
        let entry = header.entry();
        let name = entry.filename.to_string_lossy().replace('\\', "/");

        archive = if entry.is_file() && wanted(&name) {
            let (data, rest) = header
                .read()
                .map_err(|e| ArchiveError::Extraction(format!("cannot read {}: {}", name, e)))?;
            debug!("Read RAR member {} ({} bytes)", name, data.len());
            members.push(ArchiveMember { name, data });
            rest
        } else {
            header
                .skip()
                .map_err(|e| ArchiveError::Extraction(format!("cannot skip {}: {}", name, e)))?
        };
    }

    Ok(members)
}
