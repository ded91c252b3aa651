use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pharma_news_pipeline::dedup::deduplicate;
use pharma_news_pipeline::model::{Article, Source};

/// Build a corpus where every fourth article is a near-duplicate of the
/// one before it (similar title, shorter content) so the dedup pass does
/// real grouping work rather than degenerating to all-singletons.
fn corpus(size: usize) -> Vec<Article> {
    let mut articles = Vec::with_capacity(size);
    for i in 0..size {
        let title = if i % 4 == 0 {
            format!("Phase 3 trial results for compound {}", i / 4)
        } else {
            format!("Phase 3 trial results for compound {}, updated", i / 4)
        };
        let content = "x".repeat(100 + (i % 7) * 50);
        let url = format!("https://example.com/article/{i}");
        articles.push(Article::new(title, content, url, Source::Pubmed, "bench"));
    }
    articles
}

fn bench_dedup(c: &mut Criterion) {
    let mut group = c.benchmark_group("dedup");
    for &size in &[100usize, 1_000] {
        group.bench_function(format!("deduplicate_{size}"), |b| {
            b.iter_batched(
                || corpus(size),
                |articles| black_box(deduplicate(articles, 0.75)),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_dedup);
criterion_main!(benches);
