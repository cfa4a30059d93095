use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::storage::container::{self, ContainerKind};

/// Segment version, assigned at write time. Monotonically increasing;
/// a later version that re-indexes a document supersedes earlier versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentVersion(pub u64);

impl fmt::Display for SegmentVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-segment metadata, persisted as the `<version>.ix` container.
/// Segments are immutable once the descriptor is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDescriptor {
    pub version: SegmentVersion,
    pub created_at: DateTime<Utc>,
    pub doc_count: u32,
    /// Number of documents carrying each field in this segment.
    pub field_doc_counts: HashMap<String, u32>,
    /// Posting shard ids present in this segment, ascending.
    pub shards: Vec<u8>,
    /// Region offsets inside the `<version>.dtbl` document table file.
    pub key_index_offset: u64,
    pub block_table_offset: u64,
    pub presence_offset: u64,
}

impl SegmentDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let payload = container::read_file(path, ContainerKind::Descriptor)?;
        Ok(bincode::deserialize(&payload)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = bincode::serialize(self)?;
        container::write_file(path, ContainerKind::Descriptor, &payload)
    }

    /// Documents carrying `field` in this segment; 0 when the segment
    /// does not contain the field.
    pub fn field_doc_count(&self, field: &str) -> u32 {
        self.field_doc_counts.get(field).copied().unwrap_or(0)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.field_doc_counts.contains_key(field)
    }

    pub fn has_shard(&self, shard: u8) -> bool {
        self.shards.contains(&shard)
    }
}
