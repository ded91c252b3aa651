//! C3 - near-duplicate detection and representative selection.
//!
//! Single-pass grouping: for each article, compare its title against the
//! current representative of every existing group; attach to the
//! highest-similarity group at or above the threshold, else start a new
//! group. Articles with empty titles bypass grouping entirely (§4.3).
//! Identical URLs always collapse via [`crate::model::fingerprint`]
//! regardless of title similarity, handled up front with a `HashMap`
//! before the O(n * groups) similarity pass runs on the remainder.

use crate::model::Article;
use crate::similarity::title_similarity;

/// One duplicate group: the chosen representative plus every member
/// (including the representative) in original input order.
#[derive(Debug)]
pub struct DuplicateGroup {
    pub representative: Article,
    pub members: Vec<Article>,
}

/// Output of the dedup pass: the kept representatives (input order
/// preserved, §5) and the full group breakdown for C10.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub kept: Vec<Article>,
    pub groups: Vec<DuplicateGroup>,
    pub duplicates_removed: usize,
}

/// Run the deduplicator over `articles`, consuming them.
///
/// Empty-title articles bypass grouping but are not simply appended at the
/// end: their original position is tracked alongside each group's so the
/// final `kept` order matches the order-stability invariant (§4.3, §5)
/// even when they're interspersed with titled articles.
#[must_use]
pub fn deduplicate(articles: Vec<Article>, threshold: f64) -> DedupOutcome {
    // Identical URLs collapse deterministically first, keyed by fingerprint.
    let mut by_id: std::collections::HashMap<String, Vec<Article>> =
        std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut passthrough: Vec<(usize, Article)> = Vec::new();

    for (pos, article) in articles.into_iter().enumerate() {
        if article.title.trim().is_empty() {
            passthrough.push((pos, article));
            continue;
        }
        if !by_id.contains_key(&article.id) {
            order.push(article.id.clone());
        }
        by_id.entry(article.id.clone()).or_default().push((pos, article));
    }

    // Each distinct id becomes a candidate "article" for the title
    // similarity pass, represented for now by its first member; title
    // grouping then merges across distinct ids whose titles are near-dupes.
    let mut groups: Vec<Vec<(usize, Article)>> = Vec::new();
    for id in order {
        let mut bucket: Vec<(usize, Article)> = by_id.remove(&id).unwrap();
        let probe_title = bucket[0].1.title.clone();

        let mut best: Option<(usize, f64)> = None;
        for (gi, group) in groups.iter().enumerate() {
            let rep_title = &representative_of(group.iter().map(|(_, a)| a)).title;
            let sim = title_similarity(&probe_title, rep_title);
            if sim >= threshold && best.map_or(true, |(_, b)| sim > b) {
                best = Some((gi, sim));
            }
        }

        match best {
            Some((gi, _)) => groups[gi].append(&mut bucket),
            None => groups.push(bucket),
        }
    }

    // Each group surfaces at the earliest original position among its
    // members, so the final ordering reflects first observation.
    let mut outcome = DedupOutcome::default();
    let mut positioned: Vec<(usize, Article)> = Vec::new();
    for group in groups {
        let first_pos = group.iter().map(|(pos, _)| *pos).min().unwrap();
        let members: Vec<Article> = group.into_iter().map(|(_, a)| a).collect();
        let representative = representative_of(members.iter()).clone();
        outcome.duplicates_removed += members.len() - 1;
        positioned.push((first_pos, representative.clone()));
        outcome.groups.push(DuplicateGroup {
            representative,
            members,
        });
    }
    positioned.extend(passthrough);
    positioned.sort_by_key(|(pos, _)| *pos);
    outcome.kept = positioned.into_iter().map(|(_, a)| a).collect();
    outcome
}

/// Representative selection: (1) longest `content`, then (2) most author
/// metadata present, then (3) longest URL (§4.3).
fn representative_of<'a>(group: impl IntoIterator<Item = &'a Article>) -> &'a Article {
    group
        .into_iter()
        .max_by(|a, b| {
            a.content
                .len()
                .cmp(&b.content.len())
                .then(a.authors.len().cmp(&b.authors.len()))
                .then(a.url.len().cmp(&b.url.len()))
        })
        .expect("duplicate group is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn article(title: &str, content: &str, url: &str) -> Article {
        Article::new(title, content, url, Source::Pubmed, "s1")
    }

    #[test]
    fn identical_urls_collapse_regardless_of_title() {
        let a = article("Title A", "short", "https://x.com/a");
        let b = article("Totally different headline", "much longer content body", "https://x.com/a");
        let outcome = deduplicate(vec![a, b], 0.75);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].content, "much longer content body");
    }

    #[test]
    fn empty_titles_bypass_grouping() {
        let a = article("", "content one", "https://x.com/a");
        let b = article("", "content two", "https://x.com/b");
        let outcome = deduplicate(vec![a, b], 0.75);
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn spec_s5_near_duplicate_titles_collapse_to_longer_content() {
        let a = article(
            "Biden receiving radiation therapy",
            "Short version of the story.",
            "https://a.com/1",
        );
        let b = article(
            "Biden receiving radiation therapy, aide says",
            "Much longer version of the story with more detail and context added here.",
            "https://b.com/2",
        );
        let outcome = deduplicate(vec![a, b], 0.75);
        assert_eq!(outcome.kept.len(), 1);
        assert!(outcome.kept[0].content.starts_with("Much longer"));
        assert_eq!(outcome.duplicates_removed, 1);
    }

    #[test]
    fn dissimilar_titles_stay_in_separate_groups() {
        let a = article("FDA approves new cancer drug", "c1", "https://a.com/1");
        let b = article("Stock markets rally today", "c2", "https://b.com/2");
        let outcome = deduplicate(vec![a, b], 0.75);
        assert_eq!(outcome.kept.len(), 2);
    }

    #[test]
    fn representative_prefers_more_authors_on_content_tie() {
        let mut a = article("Same Title Exactly", "equal length content!!", "https://a.com/1");
        a.authors = vec!["Jane".to_string()];
        let b = article("Same Title Exactly", "equal length content!!", "https://b.com/2");
        let outcome = deduplicate(vec![a, b], 0.75);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].authors.len(), 1);
    }

    #[test]
    fn order_is_stable_when_empty_titles_are_interspersed() {
        let titled_first = article("FDA approves new cancer drug", "c1", "https://a.com/1");
        let empty = article("", "content two", "https://x.com/b");
        let titled_second = article("Stock markets rally today", "c2", "https://b.com/2");
        let outcome = deduplicate(vec![titled_first, empty, titled_second], 0.75);
        let urls: Vec<&str> = outcome.kept.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/1", "https://x.com/b", "https://b.com/2"]);
    }

    #[test]
    fn dedup_soundness_property_over_kept_set() {
        let articles = vec![
            article("FDA approves new cancer immunotherapy", "c1", "https://a.com/1"),
            article("FDA approves new cancer immunotherapy drug", "c2 longer", "https://a.com/2"),
            article("Completely unrelated market news today", "c3", "https://a.com/3"),
        ];
        let outcome = deduplicate(articles, 0.75);
        for i in 0..outcome.kept.len() {
            for j in (i + 1)..outcome.kept.len() {
                let sim = title_similarity(&outcome.kept[i].title, &outcome.kept[j].title);
                assert!(sim < 0.75, "kept titles {} and {} too similar: {sim}", i, j);
            }
        }
    }
}
