use std::sync::Arc;
use crate::core::error::Result;
use crate::storage::descriptor::{SegmentDescriptor, SegmentVersion};
use crate::storage::layout::StorageLayout;

/// All published segments in a directory, in chronological (version) order.
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    segments: Vec<Arc<SegmentDescriptor>>,
}

impl SegmentCatalog {
    /// Scan the layout directory and load every descriptor.
    /// A corrupt descriptor is a hard failure, not an empty catalog.
    pub fn load(layout: &StorageLayout) -> Result<Self> {
        let mut segments = Vec::new();
        for version in layout.descriptor_versions()? {
            let descriptor = SegmentDescriptor::load(&layout.descriptor_path(version))?;
            segments.push(Arc::new(descriptor));
        }
        Ok(SegmentCatalog { segments })
    }

    pub fn segments(&self) -> &[Arc<SegmentDescriptor>] {
        &self.segments
    }

    pub fn descriptor(&self, version: SegmentVersion) -> Option<&Arc<SegmentDescriptor>> {
        self.segments.iter().find(|s| s.version == version)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Aggregate document count for `field` across all segments.
    pub fn field_doc_count(&self, field: &str) -> u32 {
        self.segments.iter().map(|s| s.field_doc_count(field)).sum()
    }

    /// Aggregate document count across all segments.
    pub fn doc_count(&self) -> u32 {
        self.segments.iter().map(|s| s.doc_count).sum()
    }

    pub fn latest_version(&self) -> Option<SegmentVersion> {
        self.segments.last().map(|s| s.version)
    }

    /// The version a writer should assign to the next segment.
    pub fn next_version(&self) -> SegmentVersion {
        SegmentVersion(self.latest_version().map(|v| v.0 + 1).unwrap_or(0))
    }
}
