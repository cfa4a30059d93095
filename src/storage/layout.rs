use std::fs;
use std::path::PathBuf;
use crate::core::error::Result;
use crate::storage::descriptor::SegmentVersion;

/// Flat directory of segment files, one file set per version:
/// `<v>.ix` descriptor, `<v>-<field>.tc` tries, `<v>-<shard>.tdm`
/// posting shards, `<v>.dtbl` document table.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub dir: PathBuf,
}

impl StorageLayout {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(StorageLayout { dir })
    }

    pub fn descriptor_path(&self, version: SegmentVersion) -> PathBuf {
        self.dir.join(format!("{}.ix", version.0))
    }

    pub fn trie_path(&self, version: SegmentVersion, field: &str) -> PathBuf {
        self.dir.join(format!("{}-{:08x}.tc", version.0, field_id(field)))
    }

    pub fn shard_path(&self, version: SegmentVersion, shard: u8) -> PathBuf {
        self.dir.join(format!("{}-{:02x}.tdm", version.0, shard))
    }

    pub fn doc_table_path(&self, version: SegmentVersion) -> PathBuf {
        self.dir.join(format!("{}.dtbl", version.0))
    }

    /// Versions with a descriptor on disk, ascending.
    pub fn descriptor_versions(&self) -> Result<Vec<SegmentVersion>> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("ix") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(version) = stem.parse::<u64>() {
                    versions.push(SegmentVersion(version));
                }
            }
        }
        versions.sort();
        Ok(versions)
    }
}

/// Stable identity of a field name in file names.
pub fn field_id(field: &str) -> u32 {
    crc32fast::hash(field.as_bytes())
}
