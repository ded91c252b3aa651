//! Title-similarity ratio used by the deduplicator (C3).
//!
//! The spec calls for "the ratio of matching characters between lowercased
//! titles using a longest-common-subsequence-based measure (same family as
//! the ratio produced by a standard sequence-matcher)". That is exactly
//! Python's `difflib.SequenceMatcher.ratio()`: `2*M / T` where `M` is the
//! total number of matching characters found by repeatedly extracting the
//! longest matching block, and `T` is the combined length of both strings.
//! No ecosystem crate implements that exact ratio, so it is reimplemented
//! here from its definition rather than approximated with an edit-distance
//! metric that would change which pairs cross the threshold.

/// Ratio in `[0.0, 1.0]` of matching characters between `a` and `b`,
/// case-insensitive. Two empty strings have ratio `1.0` by convention
/// (matches `difflib`), but callers in C3 special-case empty titles before
/// reaching this function.
#[must_use]
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    ratio(a.as_bytes(), b.as_bytes())
}

fn ratio(a: &[u8], b: &[u8]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_blocks_total(a, b);
    (2 * matches) as f64 / total as f64
}

/// Sum of the lengths of all matching blocks found by recursively taking
/// the longest common substring and recursing on the left/right remainders
/// - the same divide-and-conquer strategy `difflib` uses, without its
/// "junk" heuristics (not needed for short article titles).
fn matching_blocks_total(a: &[u8], b: &[u8]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (len, ai, bi) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_blocks_total(&a[..ai], &b[..bi]);
    let right = matching_blocks_total(&a[ai + len..], &b[bi + len..]);
    left + len + right
}

/// Returns `(length, start_in_a, start_in_b)` of the longest common
/// substring via the classic O(|a|*|b|) dynamic-programming table. Ties
/// resolve to the earliest match in `a` then `b`, matching `difflib`'s
/// behavior of preferring the first found.
fn longest_common_substring(a: &[u8], b: &[u8]) -> (usize, usize, usize) {
    let mut prev = vec![0usize; b.len() + 1];
    let mut best = (0usize, 0usize, 0usize);
    for i in 0..a.len() {
        let mut cur = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = prev[j] + 1;
                cur[j + 1] = len;
                if len > best.0 {
                    best = (len, i + 1 - len, j + 1 - len);
                }
            }
        }
        prev = cur;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_have_ratio_one() {
        assert!((title_similarity("abc", "abc") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_strings_have_ratio_zero() {
        assert!((title_similarity("abc", "xyz")).abs() < 1e-9);
    }

    #[test]
    fn near_duplicate_titles_from_spec_s5_exceed_default_threshold() {
        let a = "Biden receiving radiation therapy";
        let b = "Biden receiving radiation therapy, aide says";
        let r = title_similarity(a, b);
        assert!(r >= 0.75, "expected ratio >= 0.75, got {r}");
    }

    #[test]
    fn is_case_insensitive() {
        let r1 = title_similarity("FDA Approves Drug", "fda approves drug");
        assert!((r1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unrelated_headlines_stay_below_threshold() {
        let a = "FDA approves new cancer immunotherapy drug";
        let b = "Stock markets rally on interest rate news";
        let r = title_similarity(a, b);
        assert!(r < 0.75, "expected ratio < 0.75, got {r}");
    }
}
