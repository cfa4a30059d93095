use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use roaring::RoaringBitmap;
use tracing::debug;
use crate::cache::container::SegmentCaches;
use crate::core::error::Result;
use crate::core::types::{DocId, Term};
use crate::documents::container as doc_container;
use crate::postings::shard;
use crate::query::context::QueryContext;
use crate::scoring::scheme::{DocumentScore, ScoringScheme};
use crate::storage::descriptor::{SegmentDescriptor, SegmentVersion};
use crate::storage::layout::StorageLayout;
use crate::trie::store::load_field_trie;

/// Deterministic per-segment score map: BTreeMap keeps document-id order
/// so ranking ties resolve the same way on every run.
pub type ScoreMap = BTreeMap<DocId, DocumentScore>;

/// Everything one segment contributes to a query.
pub struct SegmentHits {
    pub version: SegmentVersion,
    pub scores: ScoreMap,
    /// Every document id stored in the segment, matching or not; the
    /// reducer uses it to let newer versions supersede older matches.
    pub presence: Arc<RoaringBitmap>,
    /// Literal tokens that produced postings.
    pub matched_terms: BTreeSet<String>,
}

/// Evaluates a query tree against a single segment: expand approximate
/// terms through the field tries, scan posting shards, resolve the tree
/// into one score map. One collector per segment; collectors share only
/// the internally synchronized container caches.
pub struct Collector<'a> {
    layout: &'a StorageLayout,
    descriptor: &'a SegmentDescriptor,
    caches: &'a SegmentCaches,
    scheme: &'a dyn ScoringScheme,
    postings_cache: usize,
}

/// Private work tree mirroring the immutable query tree. Expansion flags
/// are cleared once expansion has run, so a second pass is a no-op and
/// every node is processed exactly once per scan.
pub(crate) struct ScanNode {
    field: String,
    value: String,
    fuzzy: bool,
    prefix: bool,
    edits: u8,
    children: Vec<ScanNode>,
    scores: ScoreMap,
}

impl ScanNode {
    pub(crate) fn mirror(query: &QueryContext) -> ScanNode {
        ScanNode {
            field: query.field.clone(),
            value: query.value.clone(),
            fuzzy: query.fuzzy,
            prefix: query.prefix,
            edits: query.edits,
            children: query.children.iter().map(ScanNode::mirror).collect(),
            scores: ScoreMap::new(),
        }
    }

    fn term(field: &str, value: &str) -> ScanNode {
        ScanNode {
            field: field.to_string(),
            value: value.to_string(),
            fuzzy: false,
            prefix: false,
            edits: 0,
            children: Vec::new(),
            scores: ScoreMap::new(),
        }
    }

    pub(crate) fn child_values(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.value.as_str()).collect()
    }
}

impl<'a> Collector<'a> {
    pub fn new(
        layout: &'a StorageLayout,
        descriptor: &'a SegmentDescriptor,
        caches: &'a SegmentCaches,
        scheme: &'a dyn ScoringScheme,
        postings_cache: usize,
    ) -> Self {
        Collector { layout, descriptor, caches, scheme, postings_cache }
    }

    pub fn collect(&self, query: &QueryContext) -> Result<SegmentHits> {
        let started = Instant::now();

        let mut root = ScanNode::mirror(query);
        self.expand(&mut root)?;

        let mut matched_terms = BTreeSet::new();
        self.scan(&mut root, &mut matched_terms)?;

        let scores = resolve(root);
        let documents = doc_container::load_container(self.layout, self.descriptor, self.caches)?;
        let presence = documents.presence().clone();

        debug!(
            segment = %self.descriptor.version,
            hits = scores.len(),
            elapsed = ?started.elapsed(),
            "collected segment"
        );

        Ok(SegmentHits {
            version: self.descriptor.version,
            scores,
            presence,
            matched_terms,
        })
    }

    /// Materialize one child per distinct token matching a fuzzy or
    /// prefix node, excluding the node's own literal value, then clear
    /// the flags. Pre-existing children are expanded too.
    pub(crate) fn expand(&self, node: &mut ScanNode) -> Result<()> {
        if node.fuzzy || node.prefix {
            if let Some(trie) = load_field_trie(self.layout, self.descriptor, self.caches, &node.field)? {
                let expanded: Vec<String> = if node.fuzzy {
                    trie.similar(&node.value, node.edits).collect()
                } else {
                    trie.prefixed(&node.value).collect()
                };
                for token in expanded {
                    if token != node.value {
                        node.children.push(ScanNode::term(&node.field, &token));
                    }
                }
            }
            node.fuzzy = false;
            node.prefix = false;
        }
        for child in &mut node.children {
            self.expand(child)?;
        }
        Ok(())
    }

    /// Pre-order scan; every child is scanned regardless of its parent's
    /// outcome.
    fn scan(&self, node: &mut ScanNode, matched_terms: &mut BTreeSet<String>) -> Result<()> {
        node.scores = self.scored_postings(&node.field, &node.value, matched_terms)?;
        for child in &mut node.children {
            self.scan(child, matched_terms)?;
        }
        Ok(())
    }

    /// A missing field dictionary, missing shard or absent term all
    /// contribute nothing; only I/O failures propagate.
    fn scored_postings(
        &self,
        field: &str,
        value: &str,
        matched_terms: &mut BTreeSet<String>,
    ) -> Result<ScoreMap> {
        let total_docs = self.descriptor.field_doc_count(field);
        if total_docs == 0 {
            return Ok(ScoreMap::new());
        }
        let trie = match load_field_trie(self.layout, self.descriptor, self.caches, field)? {
            Some(trie) => trie,
            None => return Ok(ScoreMap::new()),
        };
        if !trie.has_exact(value) {
            return Ok(ScoreMap::new());
        }
        let shard = match shard::load_shard(
            self.layout,
            self.descriptor,
            self.caches,
            value,
            self.postings_cache,
        )? {
            Some(shard) => shard,
            None => return Ok(ScoreMap::new()),
        };
        let term = Term::new(field, value);
        let postings = match shard.postings(&term)? {
            Some(postings) => postings,
            None => return Ok(ScoreMap::new()),
        };

        let scorer = self.scheme.create_scorer(total_docs, postings.len() as u32);
        let mut scores = ScoreMap::new();
        for posting in postings.iter() {
            let mut hit = DocumentScore::new(
                posting.document_id,
                posting.weight,
                total_docs,
                self.descriptor.version,
            );
            scorer.score(&mut hit);
            scores.insert(posting.document_id, hit);
        }
        matched_terms.insert(value.to_string());
        Ok(scores)
    }
}

/// Flatten the tree: union each node's map with its children's, a
/// document keeping the highest score observed under any node.
fn resolve(node: ScanNode) -> ScoreMap {
    let mut merged = node.scores;
    for child in node.children {
        for (id, hit) in resolve(child) {
            match merged.get(&id) {
                Some(existing) if existing.score >= hit.score => {}
                _ => {
                    merged.insert(id, hit);
                }
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Document;
    use crate::scoring::scheme::ScoringKind;
    use crate::storage::catalog::SegmentCatalog;
    use crate::storage::writer::SegmentWriter;
    use tempfile::tempdir;

    fn segment_fixture(layout: &StorageLayout) -> SegmentCatalog {
        let docs = vec![
            Document::new(DocId(0)).with_field("title", "rambo"),
            Document::new(DocId(1)).with_field("title", "rocky"),
            Document::new(DocId(2)).with_field("title", "rocky 2"),
        ];
        SegmentWriter::new(layout, SegmentVersion(0)).write(&docs).unwrap();
        SegmentCatalog::load(layout).unwrap()
    }

    #[test]
    fn expansion_is_idempotent() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let catalog = segment_fixture(&layout);
        let caches = SegmentCaches::new();
        let scheme = ScoringKind::TfIdf.scheme();
        let descriptor = catalog.segments()[0].as_ref();
        let collector = Collector::new(&layout, descriptor, &caches, scheme.as_ref(), 64);

        let query = QueryContext::fuzzy("title", "rock", 1);
        let mut node = ScanNode::mirror(&query);
        collector.expand(&mut node).unwrap();
        assert!(!node.fuzzy);
        let first = node.child_values().join(",");
        assert_eq!(first, "rocky");

        collector.expand(&mut node).unwrap();
        assert_eq!(node.child_values().join(","), first);
    }

    #[test]
    fn scan_unions_expanded_terms_with_max_score() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let catalog = segment_fixture(&layout);
        let caches = SegmentCaches::new();
        let scheme = ScoringKind::TfIdf.scheme();
        let descriptor = catalog.segments()[0].as_ref();
        let collector = Collector::new(&layout, descriptor, &caches, scheme.as_ref(), 64);

        let hits = collector.collect(&QueryContext::fuzzy("title", "rock", 1)).unwrap();
        // "rock" itself is absent; the expansion to "rocky" matches 1 and 2.
        let ids: Vec<u32> = hits.scores.keys().map(|d| d.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(!hits.scores.contains_key(&DocId(0)));
        assert!(hits.matched_terms.contains("rocky"));
        assert!(!hits.matched_terms.contains("rock"));
    }

    #[test]
    fn absent_field_and_absent_term_contribute_nothing() {
        let dir = tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let catalog = segment_fixture(&layout);
        let caches = SegmentCaches::new();
        let scheme = ScoringKind::TfIdf.scheme();
        let descriptor = catalog.segments()[0].as_ref();
        let collector = Collector::new(&layout, descriptor, &caches, scheme.as_ref(), 64);

        let by_field = collector.collect(&QueryContext::term("year", "1982")).unwrap();
        assert!(by_field.scores.is_empty());

        let by_term = collector.collect(&QueryContext::term("title", "alien")).unwrap();
        assert!(by_term.scores.is_empty());
    }
}
