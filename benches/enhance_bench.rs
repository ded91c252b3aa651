use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pharma_news_pipeline::enhance::enhance_all;
use pharma_news_pipeline::model::{Article, Source};

const KEYWORDS: &[&str] = &[
    "prostate cancer",
    "immunotherapy",
    "clinical trial",
    "FDA approval",
    "biomarker",
];

fn corpus(size: usize) -> Vec<Article> {
    let paragraph = "The study examined prostate cancer patients receiving immunotherapy \
        in a phase 3 clinical trial. Biomarker analysis preceded FDA approval review. \
        Results were consistent across cohorts and sites. ".repeat(10);
    (0..size)
        .map(|i| {
            Article::new(
                format!("Trial update {i}"),
                paragraph.clone(),
                format!("https://example.com/{i}"),
                Source::Exa,
                "bench",
            )
        })
        .collect()
}

fn bench_enhance(c: &mut Criterion) {
    let keywords: Vec<String> = KEYWORDS.iter().map(|s| (*s).to_string()).collect();
    let mut group = c.benchmark_group("enhance");
    for &size in &[100usize, 1_000] {
        group.bench_function(format!("enhance_all_{size}"), |b| {
            b.iter_batched(
                || corpus(size),
                |mut articles| {
                    enhance_all(&mut articles, black_box(&keywords));
                    articles
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_enhance);
criterion_main!(benches);
