use std::collections::{BTreeMap, HashMap};
use chrono::Utc;
use tracing::debug;
use crate::compression::compress::CompressionType;
use crate::core::error::Result;
use crate::core::types::{DocId, Document, Term};
use crate::documents::container::write_doc_table;
use crate::documents::key_index::KeyIndex;
use crate::postings::posting::Posting;
use crate::postings::shard::{shard_id, write_shard};
use crate::storage::descriptor::{SegmentDescriptor, SegmentVersion};
use crate::storage::layout::StorageLayout;
use crate::trie::node::Trie;

/// Produces one complete, immutable segment: per-field tries, posting
/// shards, document table, and the descriptor last, so a segment only
/// becomes visible once all of its containers exist.
pub struct SegmentWriter<'a> {
    layout: &'a StorageLayout,
    version: SegmentVersion,
    compression: CompressionType,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(layout: &'a StorageLayout, version: SegmentVersion) -> Self {
        SegmentWriter { layout, version, compression: CompressionType::Lz4 }
    }

    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    /// Document ids must be unique within `docs`.
    pub fn write(&self, docs: &[Document]) -> Result<SegmentDescriptor> {
        let mut field_doc_counts: HashMap<String, u32> = HashMap::new();
        let mut tries: BTreeMap<String, Trie> = BTreeMap::new();
        let mut weights: BTreeMap<Term, BTreeMap<DocId, u32>> = BTreeMap::new();

        for doc in docs {
            for (field, value) in &doc.fields {
                *field_doc_counts.entry(field.clone()).or_insert(0) += 1;
                let trie = tries.entry(field.clone()).or_default();
                for token in tokenize(value) {
                    trie.insert(&token);
                    *weights
                        .entry(Term::new(field, &token))
                        .or_default()
                        .entry(doc.id)
                        .or_insert(0) += 1;
                }
            }
        }

        for (field, trie) in &tries {
            trie.save(&self.layout.trie_path(self.version, field))?;
        }

        let mut shards: BTreeMap<u8, BTreeMap<Term, Vec<Posting>>> = BTreeMap::new();
        for (term, by_doc) in weights {
            let postings: Vec<Posting> = by_doc
                .into_iter()
                .map(|(id, weight)| Posting::new(id, weight))
                .collect();
            shards.entry(shard_id(&term.token)).or_default().insert(term, postings);
        }
        for (shard, terms) in &shards {
            write_shard(&self.layout.shard_path(self.version, *shard), terms)?;
        }

        let key_index =
            KeyIndex::build(docs.iter().flat_map(|d| d.fields.keys().map(|k| k.as_str())));
        let offsets = write_doc_table(
            &self.layout.doc_table_path(self.version),
            docs,
            &key_index,
            self.compression,
        )?;

        let descriptor = SegmentDescriptor {
            version: self.version,
            created_at: Utc::now(),
            doc_count: docs.len() as u32,
            field_doc_counts,
            shards: shards.keys().copied().collect(),
            key_index_offset: offsets.key_index_offset,
            block_table_offset: offsets.block_table_offset,
            presence_offset: offsets.presence_offset,
        };
        descriptor.save(&self.layout.descriptor_path(self.version))?;

        debug!(segment = %self.version, docs = docs.len(), "wrote segment");
        Ok(descriptor)
    }
}

/// Lowercase whitespace split. A stand-in for the external analyzer,
/// shared by fixtures and callers that index pre-analyzed text.
pub fn tokenize(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split_whitespace().map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use crate::storage::catalog::SegmentCatalog;

    #[test]
    fn descriptor_reflects_fields_and_shards() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();

        let docs = vec![
            Document::new(DocId(0)).with_field("title", "Rambo").with_field("year", "1982"),
            Document::new(DocId(1)).with_field("title", "rocky"),
        ];
        let descriptor = SegmentWriter::new(&layout, SegmentVersion(4)).write(&docs).unwrap();

        assert_eq!(descriptor.doc_count, 2);
        assert_eq!(descriptor.field_doc_count("title"), 2);
        assert_eq!(descriptor.field_doc_count("year"), 1);
        assert_eq!(descriptor.field_doc_count("body"), 0);
        assert!(!descriptor.shards.is_empty());

        let catalog = SegmentCatalog::load(&layout).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.latest_version(), Some(SegmentVersion(4)));
        assert_eq!(catalog.next_version(), SegmentVersion(5));
    }

    #[test]
    fn tokens_are_lowercased() {
        let tokens: Vec<String> = tokenize("Rocky II  returns").collect();
        assert_eq!(tokens, vec!["rocky", "ii", "returns"]);
    }
}
