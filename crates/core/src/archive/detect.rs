//! Archive format sniffing.

use super::types::{ArchiveError, ArchiveFormat};

/// Bytes needed to identify an archive.
pub const MAGIC_LEN: usize = 4;

const ZIP_LOCAL_HEADER: [u8; 4] = *b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: [u8; 4] = *b"PK\x05\x06";
const ZIP_SPANNED: [u8; 4] = *b"PK\x07\x08";
const RAR: [u8; 4] = *b"Rar!";

/// Identify the archive format from its first four bytes.
pub fn detect_format(header: &[u8]) -> Result<ArchiveFormat, ArchiveError> {
    let Some(magic) = header.get(..MAGIC_LEN) else {
        return Err(unknown(header));
    };

    if magic == ZIP_LOCAL_HEADER || magic == ZIP_EMPTY_ARCHIVE || magic == ZIP_SPANNED {
        Ok(ArchiveFormat::Zip)
    } else if magic == RAR {
        Ok(ArchiveFormat::Rar)
    } else {
        Err(unknown(magic))
    }
}

fn unknown(bytes: &[u8]) -> ArchiveError {
    let magic = bytes
        .iter()
        .take(MAGIC_LEN)
        .map(|b| format!("{:02x}", b))
        .collect::<String>();
    ArchiveError::UnknownFormat { magic }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_zip() {
        assert_eq!(detect_format(b"PK\x03\x04rest").unwrap(), ArchiveFormat::Zip);
        assert_eq!(detect_format(b"PK\x05\x06").unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn test_detect_rar() {
        assert_eq!(detect_format(b"Rar!\x1a\x07\x00").unwrap(), ArchiveFormat::Rar);
    }

    #[test]
    fn test_detect_unknown() {
        match detect_format(b"<htm") {
            Err(ArchiveError::UnknownFormat { magic }) => assert_eq!(magic, "3c68746d"),
            other => panic!("expected UnknownFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_detect_short_input() {
        assert!(matches!(
            detect_format(b"PK"),
            Err(ArchiveError::UnknownFormat { .. })
        ));
    }
}
