use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use memmap2::Mmap;
use roaring::RoaringBitmap;
use crate::cache::container::SegmentCaches;
use crate::compression::compress::{CompressedBlock, CompressionType};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, Document};
use crate::documents::block::BlockInfo;
use crate::documents::key_index::KeyIndex;
use crate::storage::container::{self, ContainerKind, HEADER_SIZE};
use crate::storage::descriptor::SegmentDescriptor;
use crate::storage::layout::StorageLayout;

/// Region offsets produced when a document table is written; recorded in
/// the segment descriptor so readers can find them again.
#[derive(Debug, Clone, Copy)]
pub struct DocTableOffsets {
    pub key_index_offset: u64,
    pub block_table_offset: u64,
    pub presence_offset: u64,
}

/// Write the `<version>.dtbl` document table: one compressed block per
/// document, then the key index, the block-address table and the
/// presence bitmap.
pub fn write_doc_table(
    path: &Path,
    docs: &[Document],
    key_index: &KeyIndex,
    compression: CompressionType,
) -> Result<DocTableOffsets> {
    let base = HEADER_SIZE as u64;
    let mut payload = Vec::new();
    let mut blocks: BTreeMap<u32, BlockInfo> = BTreeMap::new();
    let mut presence = RoaringBitmap::new();

    for doc in docs {
        let mut row: Vec<(u16, String)> = Vec::with_capacity(doc.fields.len());
        for (field, value) in &doc.fields {
            let key = key_index.key(field).ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidArgument,
                    format!("field {:?} missing from key index", field),
                )
            })?;
            row.push((key, value.clone()));
        }
        row.sort();

        let row_bytes = bincode::serialize(&row)?;
        let block = CompressedBlock::compress(&row_bytes, compression)?;
        let block_bytes = bincode::serialize(&block)?;

        let position = base + payload.len() as u64;
        payload.extend_from_slice(&block_bytes);
        blocks.insert(doc.id.0, BlockInfo::new(position, block_bytes.len() as u32));
        presence.insert(doc.id.0);
    }

    let key_index_offset = base + payload.len() as u64;
    payload.extend_from_slice(&bincode::serialize(key_index)?);

    let block_table_offset = base + payload.len() as u64;
    payload.extend_from_slice(&bincode::serialize(&blocks)?);

    let presence_offset = base + payload.len() as u64;
    let mut presence_bytes = Vec::new();
    presence
        .serialize_into(&mut presence_bytes)
        .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?;
    payload.extend_from_slice(&presence_bytes);

    container::write_file(path, ContainerKind::DocTable, &payload)?;
    Ok(DocTableOffsets { key_index_offset, block_table_offset, presence_offset })
}

/// Read-only handle on one segment's document table. The file is
/// memory-mapped; key index, block table and presence bitmap are decoded
/// once at open, blocks are decompressed on demand.
pub struct DocContainer {
    mmap: Mmap,
    fields_by_key: HashMap<u16, String>,
    blocks: BTreeMap<u32, BlockInfo>,
    presence: Arc<RoaringBitmap>,
}

impl DocContainer {
    pub fn open(layout: &StorageLayout, descriptor: &SegmentDescriptor) -> Result<Self> {
        let path = layout.doc_table_path(descriptor.version);
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let payload = container::verify(&mmap, ContainerKind::DocTable)?;

        let key_index_start = descriptor.key_index_offset as usize;
        let block_table_start = descriptor.block_table_offset as usize;
        let presence_start = descriptor.presence_offset as usize;
        if key_index_start < payload.start
            || key_index_start > block_table_start
            || block_table_start > presence_start
            || presence_start > payload.end
        {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("descriptor offsets do not fit document table {:?}", path),
            ));
        }

        let key_index: KeyIndex = bincode::deserialize(&mmap[key_index_start..block_table_start])?;
        let blocks: BTreeMap<u32, BlockInfo> =
            bincode::deserialize(&mmap[block_table_start..presence_start])?;
        let presence = RoaringBitmap::deserialize_from(&mmap[presence_start..payload.end])
            .map_err(|e| Error::new(ErrorKind::Parse, e.to_string()))?;

        Ok(DocContainer {
            mmap,
            fields_by_key: key_index.reversed(),
            blocks,
            presence: Arc::new(presence),
        })
    }

    /// Every document id stored in this segment, matching or not.
    pub fn presence(&self) -> &Arc<RoaringBitmap> {
        &self.presence
    }

    pub fn contains(&self, id: DocId) -> bool {
        self.presence.contains(id.0)
    }

    pub fn doc_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn read_session(&self) -> ReadSession<'_> {
        ReadSession { container: self }
    }

    /// Decompress exactly the one block addressing `id`.
    fn decode(&self, id: DocId) -> Result<Option<Document>> {
        let info = match self.blocks.get(&id.0) {
            Some(info) => *info,
            None => return Ok(None),
        };
        let start = info.position as usize;
        let end = start + info.length as usize;
        if end > self.mmap.len() {
            return Err(Error::new(ErrorKind::Parse, "document block out of bounds".to_string()));
        }

        let block: CompressedBlock = bincode::deserialize(&self.mmap[start..end])?;
        let row_bytes = block.decompress()?;
        let row: Vec<(u16, String)> = bincode::deserialize(&row_bytes)?;

        let mut doc = Document::new(id);
        for (key, value) in row {
            let field = self.fields_by_key.get(&key).ok_or_else(|| {
                Error::new(ErrorKind::Parse, format!("unknown field key {}", key))
            })?;
            doc.add_field(field.clone(), value);
        }
        Ok(Some(doc))
    }
}

/// One read pass over a document container.
pub struct ReadSession<'a> {
    container: &'a DocContainer,
}

impl<'a> ReadSession<'a> {
    /// Lazy fetch of the given ids; ids not stored in this segment are
    /// omitted, not errors.
    pub fn read(&self, ids: &[DocId]) -> DocumentIter<'a> {
        DocumentIter {
            container: self.container,
            ids: ids.to_vec().into_iter(),
        }
    }
}

pub struct DocumentIter<'a> {
    container: &'a DocContainer,
    ids: std::vec::IntoIter<DocId>,
}

impl<'a> Iterator for DocumentIter<'a> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.ids.by_ref() {
            match self.container.decode(id) {
                Ok(Some(doc)) => return Some(Ok(doc)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Load a segment's document container through the container cache.
pub fn load_container(
    layout: &StorageLayout,
    descriptor: &SegmentDescriptor,
    caches: &SegmentCaches,
) -> Result<Arc<DocContainer>> {
    caches
        .documents
        .get_or_load(&descriptor.version, || DocContainer::open(layout, descriptor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use crate::storage::descriptor::SegmentVersion;

    fn descriptor_with(offsets: DocTableOffsets, doc_count: u32) -> SegmentDescriptor {
        SegmentDescriptor {
            version: SegmentVersion(0),
            created_at: Utc::now(),
            doc_count,
            field_doc_counts: HashMap::new(),
            shards: Vec::new(),
            key_index_offset: offsets.key_index_offset,
            block_table_offset: offsets.block_table_offset,
            presence_offset: offsets.presence_offset,
        }
    }

    #[test]
    fn reads_single_documents_by_id() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let docs = vec![
            Document::new(DocId(0)).with_field("title", "rambo").with_field("_id", "0"),
            Document::new(DocId(1)).with_field("title", "rocky").with_field("_id", "1"),
            Document::new(DocId(2)).with_field("title", "rocky 2").with_field("_id", "2"),
        ];
        let key_index = KeyIndex::build(docs.iter().flat_map(|d| d.fields.keys().map(|k| k.as_str())));
        let path = layout.doc_table_path(SegmentVersion(0));
        let offsets = write_doc_table(&path, &docs, &key_index, CompressionType::Lz4).unwrap();
        let descriptor = descriptor_with(offsets, docs.len() as u32);

        let table = DocContainer::open(&layout, &descriptor).unwrap();
        assert_eq!(table.doc_count(), 3);

        for (id, title) in [(2u32, "rocky 2"), (1, "rocky"), (0, "rambo")] {
            let session = table.read_session();
            let fetched: Vec<Document> =
                session.read(&[DocId(id)]).collect::<Result<_>>().unwrap();
            assert_eq!(fetched.len(), 1);
            assert_eq!(fetched[0].get_field("title"), Some(title));
        }
    }

    #[test]
    fn unknown_ids_are_omitted_not_errors() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let docs = vec![Document::new(DocId(7)).with_field("title", "alien")];
        let key_index = KeyIndex::build(["title"]);
        let path = layout.doc_table_path(SegmentVersion(0));
        let offsets = write_doc_table(&path, &docs, &key_index, CompressionType::Lz4).unwrap();
        let descriptor = descriptor_with(offsets, 1);

        let table = DocContainer::open(&layout, &descriptor).unwrap();
        let session = table.read_session();
        let fetched: Vec<Document> = session
            .read(&[DocId(5), DocId(7), DocId(9)])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, DocId(7));

        assert!(table.contains(DocId(7)));
        assert!(!table.contains(DocId(5)));
    }
}
