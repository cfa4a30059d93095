use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;
use crate::core::error::{Error, ErrorKind, Result};

/// Every on-disk container starts with the same fixed header:
/// magic, container kind, format version, payload checksum, payload length.
pub const MAGIC: [u8; 4] = *b"STRA";
pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 19;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Descriptor,
    Trie,
    Postings,
    DocTable,
}

impl ContainerKind {
    fn code(self) -> u8 {
        match self {
            ContainerKind::Descriptor => 0,
            ContainerKind::Trie => 1,
            ContainerKind::Postings => 2,
            ContainerKind::DocTable => 3,
        }
    }
}

/// Write a framed container file: header followed by the payload.
pub fn write_file(path: &Path, kind: ContainerKind, payload: &[u8]) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(&MAGIC);
    header[4] = kind.code();
    header[5..7].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header[7..11].copy_from_slice(&crc32fast::hash(payload).to_le_bytes());
    header[11..19].copy_from_slice(&(payload.len() as u64).to_le_bytes());

    let mut file = File::create(path)?;
    file.write_all(&header)?;
    file.write_all(payload)?;
    file.flush()?;
    Ok(())
}

/// Validate the header and checksum of an in-memory (or memory-mapped)
/// container image and return the payload byte range.
pub fn verify(bytes: &[u8], kind: ContainerKind) -> Result<Range<usize>> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::new(ErrorKind::Parse, "container truncated".to_string()));
    }
    if bytes[0..4] != MAGIC {
        return Err(Error::new(ErrorKind::Parse, "bad container magic".to_string()));
    }
    if bytes[4] != kind.code() {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("container kind mismatch: expected {:?}", kind),
        ));
    }
    let version = u16::from_le_bytes([bytes[5], bytes[6]]);
    if version != FORMAT_VERSION {
        return Err(Error::new(
            ErrorKind::Parse,
            format!("unsupported container format version {}", version),
        ));
    }
    let checksum = u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
    let payload_len = u64::from_le_bytes(bytes[11..19].try_into().unwrap()) as usize;
    if bytes.len() < HEADER_SIZE + payload_len {
        return Err(Error::new(ErrorKind::Parse, "container payload truncated".to_string()));
    }
    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];
    if crc32fast::hash(payload) != checksum {
        return Err(Error::new(ErrorKind::Parse, "container checksum mismatch".to_string()));
    }
    Ok(HEADER_SIZE..HEADER_SIZE + payload_len)
}

/// Read a whole container file and return its verified payload.
pub fn read_file(path: &Path, kind: ContainerKind) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    let range = verify(&bytes, kind)?;
    Ok(bytes[range].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn framed_payload_is_recovered() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.tc");
        write_file(&path, ContainerKind::Trie, b"payload bytes").unwrap();
        assert_eq!(read_file(&path, ContainerKind::Trie).unwrap(), b"payload bytes");
    }

    #[test]
    fn kind_mismatch_and_corruption_are_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.tdm");
        write_file(&path, ContainerKind::Postings, b"payload bytes").unwrap();

        let err = read_file(&path, ContainerKind::Trie).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);

        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = verify(&bytes, ContainerKind::Postings).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }
}
