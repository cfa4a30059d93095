use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use rayon::prelude::*;
use tracing::{debug, warn};
use crate::cache::container::SegmentCaches;
use crate::collect::collector::{Collector, SegmentHits};
use crate::collect::reducer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::DocId;
use crate::documents::container as doc_container;
use crate::query::context::QueryContext;
use crate::scoring::scheme::{DocumentScore, ScoringKind, ScoringScheme};
use crate::search::results::{ScoredDocument, SearchResult};
use crate::storage::catalog::SegmentCatalog;
use crate::storage::descriptor::SegmentVersion;
use crate::storage::layout::StorageLayout;

#[derive(Debug, Clone)]
pub struct SearcherConfig {
    pub scoring: ScoringKind,
    /// Decoded posting lists kept per shard handle.
    pub postings_cache_size: usize,
}

impl Default for SearcherConfig {
    fn default() -> Self {
        SearcherConfig { scoring: ScoringKind::TfIdf, postings_cache_size: 1024 }
    }
}

/// Thread-safe entry point to a directory of segments: drives
/// per-segment collection, the cross-segment reduce, pagination and the
/// grouped document fetch.
pub struct Searcher {
    layout: StorageLayout,
    catalog: SegmentCatalog,
    caches: Arc<SegmentCaches>,
    scheme: Arc<dyn ScoringScheme>,
    config: SearcherConfig,
}

impl Searcher {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(dir, SearcherConfig::default())
    }

    pub fn with_config(dir: impl AsRef<Path>, config: SearcherConfig) -> Result<Self> {
        let layout = StorageLayout::new(dir.as_ref().to_path_buf())?;
        let catalog = SegmentCatalog::load(&layout)?;
        Ok(Searcher {
            layout,
            catalog,
            caches: Arc::new(SegmentCaches::new()),
            scheme: config.scoring.scheme(),
            config,
        })
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    /// Re-scan the directory for newly published segments; containers of
    /// versions that disappeared (compaction) are evicted.
    pub fn refresh(&mut self) -> Result<()> {
        let catalog = SegmentCatalog::load(&self.layout)?;
        let live: HashSet<SegmentVersion> =
            catalog.segments().iter().map(|s| s.version).collect();
        for old in self.catalog.segments() {
            if !live.contains(&old.version) {
                self.caches.evict_segment(old.version);
            }
        }
        self.catalog = catalog;
        Ok(())
    }

    /// Compaction hook: the next access to the segment re-loads from disk
    /// and surfaces an I/O failure if its files are gone.
    pub fn evict_segment(&self, version: SegmentVersion) {
        self.caches.evict_segment(version);
    }

    /// Evaluate a parsed query tree. `page`/`size` select an offset-based
    /// window of the ranked result; pages past the end are empty, not
    /// errors. Segments whose backing files fail to open are skipped and
    /// reported in `skipped_segments`.
    pub fn search(&self, query: &QueryContext, page: usize, size: usize) -> Result<SearchResult> {
        query.validate()?;
        if self.catalog.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "segment catalog is empty".to_string(),
            ));
        }

        let started = Instant::now();
        let collected: Vec<(SegmentVersion, Result<SegmentHits>)> = self
            .catalog
            .segments()
            .par_iter()
            .map(|descriptor| {
                let collector = Collector::new(
                    &self.layout,
                    descriptor.as_ref(),
                    &self.caches,
                    self.scheme.as_ref(),
                    self.config.postings_cache_size,
                );
                (descriptor.version, collector.collect(query))
            })
            .collect();

        let mut hits = Vec::new();
        let mut skipped = Vec::new();
        for (version, outcome) in collected {
            match outcome {
                Ok(segment_hits) => hits.push(segment_hits),
                Err(e) => {
                    warn!(segment = %version, error = %e, "skipping segment: collection failed");
                    skipped.push(version);
                }
            }
        }

        let mut query_terms: BTreeSet<String> = BTreeSet::new();
        for segment_hits in &hits {
            query_terms.extend(segment_hits.matched_terms.iter().cloned());
        }

        let ranked = reducer::rank(reducer::combine(hits));
        let total = ranked.len();

        let skip = page.saturating_mul(size);
        let paged: Vec<DocumentScore> = ranked.into_iter().skip(skip).take(size).collect();

        let (mut docs, fetch_failures) = self.fetch(paged);
        for version in fetch_failures {
            if !skipped.contains(&version) {
                skipped.push(version);
            }
        }
        docs.sort_by(|a, b| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            total,
            returned = docs.len(),
            skipped = skipped.len(),
            elapsed = ?started.elapsed(),
            "search finished"
        );

        Ok(SearchResult {
            docs,
            total,
            query_terms: query_terms.into_iter().collect(),
            skipped_segments: skipped,
        })
    }

    /// Fetch surviving entries grouped by originating segment, one task
    /// per group; order is re-established by the caller's final sort.
    fn fetch(&self, paged: Vec<DocumentScore>) -> (Vec<ScoredDocument>, Vec<SegmentVersion>) {
        let mut groups: BTreeMap<SegmentVersion, Vec<DocumentScore>> = BTreeMap::new();
        for hit in paged {
            groups.entry(hit.segment).or_default().push(hit);
        }

        let fetched: Vec<(SegmentVersion, Result<Vec<ScoredDocument>>)> = groups
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(version, group)| {
                let outcome = self.fetch_group(version, &group);
                (version, outcome)
            })
            .collect();

        let mut docs = Vec::new();
        let mut failures = Vec::new();
        for (version, outcome) in fetched {
            match outcome {
                Ok(group_docs) => docs.extend(group_docs),
                Err(e) => {
                    warn!(segment = %version, error = %e, "skipping segment: document fetch failed");
                    failures.push(version);
                }
            }
        }
        (docs, failures)
    }

    fn fetch_group(
        &self,
        version: SegmentVersion,
        group: &[DocumentScore],
    ) -> Result<Vec<ScoredDocument>> {
        let descriptor = self.catalog.descriptor(version).ok_or_else(|| {
            Error::new(ErrorKind::InvalidState, format!("segment {} not in catalog", version))
        })?;
        let container = doc_container::load_container(&self.layout, descriptor.as_ref(), &self.caches)?;

        let ids: Vec<DocId> = group.iter().map(|hit| hit.document_id).collect();
        let scores: HashMap<DocId, f32> =
            group.iter().map(|hit| (hit.document_id, hit.score)).collect();

        let session = container.read_session();
        let mut docs = Vec::with_capacity(ids.len());
        for doc in session.read(&ids) {
            let doc = doc?;
            let score = scores.get(&doc.id).copied().unwrap_or(0.0);
            docs.push(ScoredDocument { document: doc, score });
        }
        Ok(docs)
    }
}
