//! C8 - content enhancer: wraps keyword matches in a neutral highlight
//! marker without mutating `content`.
//!
//! Matching is case-insensitive, on whole-word boundaries where possible,
//! and preserves the original casing inside the marker (§4.8). Applying
//! the enhancer twice to the same input is idempotent (§8 property 7):
//! once a span has been wrapped in `«...»`, a second pass must not
//! re-wrap it.

use crate::model::Article;
use regex::Regex;
use std::collections::HashSet;

const OPEN: char = '\u{00AB}';
const CLOSE: char = '\u{00BB}';

/// Highlight every keyword from `keywords` in `content`, returning the
/// marked-up copy. Keywords are matched as whole words; overlapping or
/// repeated keywords each still produce one marker per occurrence, not a
/// nested one (the idempotence test covers this).
#[must_use]
pub fn highlight(content: &str, keywords: &[String]) -> String {
    if content.is_empty() || keywords.is_empty() {
        return content.to_string();
    }

    // Longest-first so "cancer immunotherapy" wins over the bare
    // "cancer" substring when both are present as keywords.
    let mut unique: Vec<&String> = Vec::new();
    let mut seen = HashSet::new();
    for kw in keywords {
        let key = kw.to_lowercase();
        if !kw.trim().is_empty() && seen.insert(key) {
            unique.push(kw);
        }
    }
    unique.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut result = content.to_string();
    for kw in unique {
        result = wrap_keyword(&result, kw);
    }
    result
}

fn wrap_keyword(text: &str, keyword: &str) -> String {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
    let Ok(re) = Regex::new(&pattern) else {
        return text.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        // Skip matches already inside a marker (idempotence): if the
        // surrounding characters are already the marker pair, leave as-is.
        let before_is_marker = text[..m.start()].ends_with(OPEN);
        let after_is_marker = text[m.end()..].starts_with(CLOSE);
        out.push_str(&text[last..m.start()]);
        if before_is_marker && after_is_marker {
            out.push_str(&text[m.start()..m.end()]);
        } else {
            out.push(OPEN);
            out.push_str(&text[m.start()..m.end()]);
            out.push(CLOSE);
        }
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Enhance every surviving article in place: `highlighted_content` is set
/// from `content` and the union of the query's keywords and the article's
/// own `mentioned_keywords`; `content` itself is never touched.
pub fn enhance_all(articles: &mut [Article], query_keywords: &[String]) {
    for article in articles {
        let mut keywords = query_keywords.to_vec();
        keywords.extend(article.mentioned_keywords.iter().cloned());
        article.highlighted_content = Some(highlight(&article.content, &keywords));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_whole_word_matches_case_insensitively_preserving_case() {
        let out = highlight(
            "The FDA approved a new Immunotherapy treatment.",
            &["immunotherapy".to_string()],
        );
        assert_eq!(
            out,
            "The FDA approved a new \u{ab}Immunotherapy\u{bb} treatment."
        );
    }

    #[test]
    fn does_not_match_inside_other_words() {
        let out = highlight("The scan showed nothing.", &["can".to_string()]);
        assert_eq!(out, "The scan showed nothing.");
    }

    #[test]
    fn idempotent_on_repeated_application() {
        let keywords = vec!["cancer".to_string(), "trial".to_string()];
        let once = highlight("A cancer trial began today in a cancer ward.", &keywords);
        let twice = highlight(&once, &keywords);
        assert_eq!(once, twice);
    }

    #[test]
    fn does_not_mutate_content_field() {
        let mut article = Article::new(
            "T",
            "cancer research update",
            "https://x.com/a",
            crate::model::Source::Pubmed,
            "s1",
        );
        let original = article.content.clone();
        enhance_all(std::slice::from_mut(&mut article), &["cancer".to_string()]);
        assert_eq!(article.content, original);
        assert!(article.highlighted_content.unwrap().contains('\u{ab}'));
    }

    #[test]
    fn empty_keywords_returns_content_unchanged() {
        let out = highlight("Some content here", &[]);
        assert_eq!(out, "Some content here");
    }
}
