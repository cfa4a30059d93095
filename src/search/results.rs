use crate::core::types::Document;
use crate::storage::descriptor::SegmentVersion;

/// Document with relevance score, in final presentation order.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Outcome of one search: the requested page of documents plus the
/// total match count across all pages.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub docs: Vec<ScoredDocument>,
    pub total: usize,
    /// Distinct literal tokens that produced postings, sorted.
    pub query_terms: Vec<String>,
    /// Segments skipped because their backing files failed to open;
    /// non-empty means the result is partial.
    pub skipped_segments: Vec<SegmentVersion>,
}
