//! Property-based tests (§8) over the pipeline's pure stages: dedup (C3),
//! relevance filtering (C7), and enhancement (C8). These exercise the
//! algorithms directly with generated input rather than driving a full
//! run, since the properties they check (soundness, idempotence, score
//! bounds) hold independent of any particular provider or model response.

use pharma_news_pipeline::dedup::deduplicate;
use pharma_news_pipeline::enhance::highlight;
use pharma_news_pipeline::model::{Article, Source};
use pharma_news_pipeline::relevance::filter_by_score;
use proptest::prelude::*;

fn arb_source() -> impl Strategy<Value = Source> {
    prop_oneof![
        Just(Source::Pubmed),
        Just(Source::Exa),
        Just(Source::Tavily),
        Just(Source::Newsapi),
    ]
}

/// Titles drawn from a small alphabet so near-duplicate and disjoint pairs
/// both occur often enough to exercise both branches of the grouping.
fn arb_title() -> impl Strategy<Value = String> {
    "[a-z ]{0,24}"
}

fn arb_article() -> impl Strategy<Value = Article> {
    (arb_title(), "[a-z]{0,40}", 0u32..500, arb_source()).prop_map(
        |(title, content, url_suffix, source)| {
            Article::new(
                title,
                content,
                format!("https://example.com/{url_suffix}"),
                source,
                "s1",
            )
        },
    )
}

proptest! {
    /// Property 1: dedup never loses or invents articles - every input
    /// lands in exactly one group (or passthrough), and the counters
    /// reconcile: `input.len() == kept.len() + duplicates_removed`.
    #[test]
    fn dedup_is_sound(articles in prop::collection::vec(arb_article(), 0..30)) {
        let input_len = articles.len();
        let outcome = deduplicate(articles, 0.75);
        let grouped_count: usize = outcome.groups.iter().map(|g| g.members.len()).sum();
        let passthrough_count = outcome.kept.len() - outcome.groups.len();
        prop_assert_eq!(grouped_count + passthrough_count, input_len);
        prop_assert_eq!(outcome.kept.len() + outcome.duplicates_removed, input_len);
    }

    /// Property 2: the representative kept for a group is always one of
    /// that group's own members, never a fabricated article.
    #[test]
    fn dedup_representative_is_drawn_from_its_group(articles in prop::collection::vec(arb_article(), 1..30)) {
        let outcome = deduplicate(articles, 0.75);
        for group in &outcome.groups {
            prop_assert!(group.members.iter().any(|m| m.id == group.representative.id
                && m.content == group.representative.content));
        }
    }

    /// Property 4: every kept or filtered article's relevance score stays
    /// within `[0, 100]` and the split is exhaustive (C7).
    #[test]
    fn filter_by_score_respects_bounds_and_is_exhaustive(
        scores in prop::collection::vec(0u8..=100, 0..40),
        min_score in 0u8..=100,
    ) {
        let articles: Vec<Article> = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                let mut a = Article::new(
                    format!("title {i}"),
                    "content",
                    format!("https://example.com/{i}"),
                    Source::Pubmed,
                    "s1",
                );
                a.relevance_score = score;
                a
            })
            .collect();
        let total = articles.len();
        let (kept, filtered_count, histogram) = filter_by_score(articles, min_score);
        prop_assert_eq!(kept.len() + filtered_count, total);
        prop_assert!(kept.iter().all(|a| a.relevance_score >= min_score));
        let band_total = histogram.high + histogram.mid_high + histogram.mid_low + histogram.low;
        prop_assert_eq!(band_total, total);
    }

    /// Property 7: highlighting is idempotent - applying it to already
    /// highlighted content never changes the result (C8).
    #[test]
    fn highlight_is_idempotent(
        content in "[a-zA-Z0-9 .,]{0,80}",
        keywords in prop::collection::vec("[a-zA-Z]{1,10}", 0..5),
    ) {
        let once = highlight(&content, &keywords);
        let twice = highlight(&once, &keywords);
        prop_assert_eq!(once, twice);
    }

    /// Highlighting never changes the underlying plain-text length beyond
    /// the marker characters it adds, and never drops input bytes other
    /// than by wrapping them - stripping the markers must recover the
    /// original content.
    #[test]
    fn highlight_preserves_content_modulo_markers(
        content in "[a-zA-Z0-9 .,]{0,80}",
        keywords in prop::collection::vec("[a-zA-Z]{1,10}", 0..5),
    ) {
        let marked = highlight(&content, &keywords);
        let stripped: String = marked.chars().filter(|&c| c != '\u{ab}' && c != '\u{bb}').collect();
        prop_assert_eq!(stripped, content);
    }
}
