use std::sync::Arc;
use crate::cache::container::SegmentCaches;
use crate::core::error::Result;
use crate::storage::descriptor::SegmentDescriptor;
use crate::storage::layout::StorageLayout;
use crate::trie::node::Trie;

/// Load the term dictionary for `field` through the container cache.
///
/// `Ok(None)` when this segment has no dictionary for the field — not
/// every segment contains every field, so callers treat it as an empty
/// match set. Only a real I/O or decode failure is an error.
pub fn load_field_trie(
    layout: &StorageLayout,
    descriptor: &SegmentDescriptor,
    caches: &SegmentCaches,
    field: &str,
) -> Result<Option<Arc<Trie>>> {
    if !descriptor.has_field(field) {
        return Ok(None);
    }
    let path = layout.trie_path(descriptor.version, field);
    if !path.exists() {
        return Ok(None);
    }
    caches
        .tries
        .get_or_load(&(descriptor.version, field.to_string()), || Trie::load(&path))
        .map(Some)
}
