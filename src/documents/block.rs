use serde::{Deserialize, Serialize};

/// Location of one compressed document block inside the document table
/// file. `position` is an absolute file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub position: u64,
    pub length: u32,
}

impl BlockInfo {
    pub fn new(position: u64, length: u32) -> Self {
        BlockInfo { position, length }
    }
}
