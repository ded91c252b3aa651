//! C5 - strict date-window filter.
//!
//! Keeps an article iff it has a `resolved_date` within
//! `[start_date, end_date]`. No buffer or window expansion (§4.5: "strict
//! mode"). Tracks `model_rescued`: kept articles whose date came from the
//! model tier, since those would not have passed via metadata alone.

use crate::model::{Article, DateOrigin};
use chrono::NaiveDate;

/// Outcome of applying the date window to a batch: the retained articles
/// (input order preserved, §5) plus the counters C9 folds into
/// [`crate::model::RunStats`].
#[derive(Debug, Default)]
pub struct DateFilterOutcome {
    pub kept: Vec<Article>,
    pub with_dates: usize,
    pub without_dates: usize,
    pub in_range: usize,
    pub out_of_range: usize,
    pub model_rescued: usize,
}

/// Apply the `[start, end]` window to `articles`, consuming them.
#[must_use]
pub fn filter_by_window(
    articles: Vec<Article>,
    start: NaiveDate,
    end: NaiveDate,
) -> DateFilterOutcome {
    let mut outcome = DateFilterOutcome::default();
    for article in articles {
        let Some(date) = article.resolved_date else {
            outcome.without_dates += 1;
            continue;
        };
        outcome.with_dates += 1;
        if date < start || date > end {
            outcome.out_of_range += 1;
            continue;
        }
        outcome.in_range += 1;
        if article.date_origin == DateOrigin::Model {
            outcome.model_rescued += 1;
        }
        outcome.kept.push(article);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn dated(date: &str, origin: DateOrigin) -> Article {
        let mut a = Article::new("T", "C", "https://x.com/a", Source::Pubmed, "s1");
        a.resolved_date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
        a.date_origin = origin;
        a
    }

    #[test]
    fn keeps_only_in_window_dates() {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let articles = vec![
            dated("2024-09-30", DateOrigin::Metadata),
            dated("2024-10-01", DateOrigin::Metadata),
            dated("2024-10-17", DateOrigin::Metadata),
            dated("2024-10-18", DateOrigin::Metadata),
        ];
        let outcome = filter_by_window(articles, start, end);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.in_range, 2);
        assert_eq!(outcome.out_of_range, 2);
    }

    #[test]
    fn drops_articles_without_a_resolved_date() {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let mut a = Article::new("T", "C", "https://x.com/a", Source::Pubmed, "s1");
        a.resolved_date = None;
        let outcome = filter_by_window(vec![a], start, end);
        assert_eq!(outcome.kept.len(), 0);
        assert_eq!(outcome.without_dates, 1);
    }

    #[test]
    fn counts_model_rescued_only_for_model_origin() {
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let articles = vec![
            dated("2024-10-15", DateOrigin::Model),
            dated("2024-10-15", DateOrigin::Metadata),
            dated("2024-10-15", DateOrigin::Regex),
        ];
        let outcome = filter_by_window(articles, start, end);
        assert_eq!(outcome.kept.len(), 3);
        assert_eq!(outcome.model_rescued, 1);
    }

    #[test]
    fn spec_s6_url_path_date_rescue() {
        // Article has no stored date but URL carries /2024/10/15/; after
        // C4 would resolve via MODEL or REGEX, and passes the window.
        let start = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let article = dated("2024-10-15", DateOrigin::Model);
        let outcome = filter_by_window(vec![article], start, end);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.model_rescued, 1);
    }
}
