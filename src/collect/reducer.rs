use std::cmp::Ordering;
use crate::collect::collector::{ScoreMap, SegmentHits};
use crate::scoring::scheme::DocumentScore;

/// Merge per-segment score maps, given in chronological (version) order.
///
/// Upsert semantics: when a document id appears in more than one
/// segment, the most recent segment's entry replaces the older one
/// entirely. A newer segment that re-indexed the document (its presence
/// bitmap has the id) without matching it suppresses the older match; a
/// segment that never saw the document leaves the older match standing.
pub fn combine(mut segments: Vec<SegmentHits>) -> ScoreMap {
    if segments.len() == 1 {
        return segments.pop().unwrap().scores;
    }
    segments.sort_by_key(|s| s.version);

    let mut merged = ScoreMap::new();
    for segment in segments {
        merged.retain(|id, _| !segment.presence.contains(id.0) || segment.scores.contains_key(id));
        for (id, hit) in segment.scores {
            merged.insert(id, hit);
        }
    }
    merged
}

/// Order for presentation: score descending; the stable sort keeps ties
/// in ascending document-id order.
pub fn rank(merged: ScoreMap) -> Vec<DocumentScore> {
    let mut ranked: Vec<DocumentScore> = merged.into_values().collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}
