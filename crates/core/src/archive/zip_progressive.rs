//! Progressive ZIP reading from a file that is still being written.
//!
//! ZIP local headers carry each member's compressed size up front, so a
//! member can be extracted as soon as its bytes are on disk, without the
//! trailing central directory. The caller polls [`ProgressiveZipReader::try_open_next`]
//! on its own schedule.

use std::io::{Cursor, Read, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use super::types::{ArchiveError, ArchiveMember};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
const SPANNED_MARKER_SIG: u32 = 0x0807_4b50;

const LOCAL_HEADER_LEN: u64 = 30;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Outcome of one poll.
#[derive(Debug)]
pub enum ZipPoll {
    /// A complete member was read.
    Member(ArchiveMember),
    /// The next member is not fully written yet.
    NotReady,
    /// All members have been read.
    Exhausted,
    /// The next member's size is only known from the central directory;
    /// extract from the finished file instead.
    RequiresCentralDirectory,
}

/// Walks local headers of a growing ZIP file.
#[derive(Debug)]
pub struct ProgressiveZipReader {
    path: PathBuf,
    offset: u64,
    wanted: fn(&str) -> bool,
}

impl ProgressiveZipReader {
    /// Members whose name fails `wanted` are skipped without decompressing.
    pub fn new(path: impl Into<PathBuf>, wanted: fn(&str) -> bool) -> Self {
        Self {
            path: path.into(),
            offset: 0,
            wanted,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset of the next local header.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Try to read the next wanted member.
    pub async fn try_open_next(&mut self) -> Result<ZipPoll, ArchiveError> {
        let mut file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ZipPoll::NotReady),
            Err(e) => return Err(ArchiveError::io(&self.path, e)),
        };

        loop {
            let available = file
                .metadata()
                .await
                .map_err(|e| ArchiveError::io(&self.path, e))?
                .len();

            if available < self.offset + 4 {
                return Ok(ZipPoll::NotReady);
            }

            let mut sig = [0u8; 4];
            self.read_at(&mut file, self.offset, &mut sig).await?;
            match u32::from_le_bytes(sig) {
                LOCAL_HEADER_SIG => {}
                CENTRAL_DIR_SIG | END_OF_CENTRAL_DIR_SIG => return Ok(ZipPoll::Exhausted),
                SPANNED_MARKER_SIG => {
                    self.offset += 4;
                    continue;
                }
                other => {
                    return Err(ArchiveError::Extraction(format!(
                        "unexpected ZIP signature {:08x} at offset {}",
                        other, self.offset
                    )))
                }
            }

            if available < self.offset + LOCAL_HEADER_LEN {
                return Ok(ZipPoll::NotReady);
            }

            let mut header = [0u8; LOCAL_HEADER_LEN as usize];
            self.read_at(&mut file, self.offset, &mut header).await?;

            let flags = le16(&header, 6);
            let method = le16(&header, 8);
            let compressed_size = le32(&header, 18);
            let name_len = u64::from(le16(&header, 26));
            let extra_len = u64::from(le16(&header, 28));

            if flags & FLAG_DATA_DESCRIPTOR != 0 || compressed_size == u32::MAX {
                debug!(
                    offset = self.offset,
                    "ZIP member size not in local header, need central directory"
                );
                return Ok(ZipPoll::RequiresCentralDirectory);
            }

            let entry_len = LOCAL_HEADER_LEN + name_len + extra_len + u64::from(compressed_size);
            if available < self.offset + entry_len {
                return Ok(ZipPoll::NotReady);
            }

            let mut name_bytes = vec![0u8; name_len as usize];
            self.read_at(&mut file, self.offset + LOCAL_HEADER_LEN, &mut name_bytes)
                .await?;
            let name = String::from_utf8_lossy(&name_bytes).into_owned();

            let entry_offset = self.offset;
            self.offset += entry_len;

            if name.ends_with('/') || !(self.wanted)(&name) {
                continue;
            }
            if method != METHOD_STORED && method != METHOD_DEFLATED {
                warn!("Skipping {}: unsupported compression method {}", name, method);
                continue;
            }

            let mut entry = vec![0u8; entry_len as usize];
            self.read_at(&mut file, entry_offset, &mut entry).await?;
            let data = inflate_entry(entry)?;

            debug!("Read ZIP member {} ({} bytes)", name, data.len());
            return Ok(ZipPoll::Member(ArchiveMember { name, data }));
        }
    }

    async fn read_at(&self, file: &mut File, offset: u64, buf: &mut [u8]) -> Result<(), ArchiveError> {
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        file.read_exact(buf)
            .await
            .map_err(|e| ArchiveError::io(&self.path, e))?;
        Ok(())
    }
}

/// Decompress one complete local entry (header + name + extra + data).
fn inflate_entry(entry: Vec<u8>) -> Result<Vec<u8>, ArchiveError> {
    let mut cursor = Cursor::new(entry);
    let mut zip_file = zip::read::read_zipfile_from_stream(&mut cursor)
        .map_err(|e| ArchiveError::Extraction(e.to_string()))?
        .ok_or_else(|| ArchiveError::Extraction("empty ZIP entry".to_string()))?;

    let mut data = Vec::new();
    zip_file
        .read_to_end(&mut data)
        .map_err(|e| ArchiveError::Extraction(e.to_string()))?;
    Ok(data)
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
