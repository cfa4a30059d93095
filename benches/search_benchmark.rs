use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;
use strata::core::types::{DocId, Document};
use strata::query::context::QueryContext;
use strata::search::searcher::Searcher;
use strata::storage::descriptor::SegmentVersion;
use strata::storage::layout::StorageLayout;
use strata::storage::writer::SegmentWriter;
use tempfile::TempDir;

/// Helper to create test documents
fn create_test_document(id: u32, content_size: usize) -> Document {
    let mut rng = rand::thread_rng();
    let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog"];
    let content: String = (0..content_size)
        .map(|_| words[rng.gen_range(0..words.len())])
        .collect::<Vec<_>>()
        .join(" ");

    Document::new(DocId(id))
        .with_field("title", &format!("document {}", id))
        .with_field("content", &content)
}

fn build_index(doc_count: u32) -> (TempDir, Searcher) {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
    let docs: Vec<Document> = (0..doc_count).map(|id| create_test_document(id, 50)).collect();
    SegmentWriter::new(&layout, SegmentVersion(0)).write(&docs).unwrap();
    let searcher = Searcher::open(dir.path()).unwrap();
    (dir, searcher)
}

fn bench_exact_search(c: &mut Criterion) {
    let (_dir, searcher) = build_index(5_000);
    let query = QueryContext::term("content", "fox");

    c.bench_function("exact_search_5k_docs", |b| {
        b.iter(|| {
            let result = searcher.search(black_box(&query), 0, 10).unwrap();
            black_box(result.total);
        });
    });
}

fn bench_fuzzy_search(c: &mut Criterion) {
    let (_dir, searcher) = build_index(5_000);
    let query = QueryContext::fuzzy("content", "quik", 1);

    c.bench_function("fuzzy_search_5k_docs", |b| {
        b.iter(|| {
            let result = searcher.search(black_box(&query), 0, 10).unwrap();
            black_box(result.total);
        });
    });
}

fn bench_prefix_search(c: &mut Criterion) {
    let (_dir, searcher) = build_index(5_000);
    let query = QueryContext::prefix("content", "ju");

    c.bench_function("prefix_search_5k_docs", |b| {
        b.iter(|| {
            let result = searcher.search(black_box(&query), 0, 10).unwrap();
            black_box(result.total);
        });
    });
}

criterion_group!(benches, bench_exact_search, bench_fuzzy_search, bench_prefix_search);
criterion_main!(benches);
