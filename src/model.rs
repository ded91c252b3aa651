//! Core data model shared across every pipeline stage (C1-C10).
//!
//! `Article` is the single mutable record that flows through the pipeline;
//! each stage owns it exclusively while processing a batch and either
//! passes it on, discards it, or (C6-C8) annotates it further. Optional
//! fields carry an explicit `Option`/default rather than using an empty
//! string as a sentinel, except where the spec calls for exactly that
//! (C6's neutral-retention fields are empty strings by contract, not by
//! absence).

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The external source an article was retrieved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Pubmed,
    Exa,
    Tavily,
    Newsapi,
}

impl Source {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pubmed => "pubmed",
            Self::Exa => "exa",
            Self::Tavily => "tavily",
            Self::Newsapi => "newsapi",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tier of the date resolver (C4) produced `resolved_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateOrigin {
    Metadata,
    Model,
    Regex,
    #[default]
    None,
}

/// Search mode requested by the caller; affects strategy generation (C2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Standard,
    TitleOnly,
    Cooccurrence,
}

/// A single article as it flows through the pipeline.
///
/// Fields populated by C6 (`relevance_reason`, `article_type`,
/// `mentioned_keywords`, `clinical_significance`, `regulatory_impact`,
/// `market_impact`, `summary`) are empty/default until that stage runs,
/// and may remain empty strings (not absent) when the model failed but
/// the article was rescued with a neutral score - see
/// [`crate::relevance::NEUTRAL_SCORE`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Article {
    /// Stable fingerprint derived from `url` (fallback: hash of title+source).
    pub id: String,
    /// May be empty only if the provider omitted it; such articles bypass
    /// dedup comparisons (C3).
    pub title: String,
    /// Free text, never mutated in place; truncated only at model-prompt
    /// boundaries by the callers that need a bounded slice.
    pub content: String,
    /// Set by C8; `None` until the content enhancer runs.
    pub highlighted_content: Option<String>,
    pub url: String,
    pub source: Source,
    /// Query-variant tag identifying which strategy produced this article.
    pub strategy: String,
    /// Verbatim as provided by the source; not normalized.
    pub raw_date: Option<String>,
    /// Set by C4; `None` until resolved, or if every tier failed.
    pub resolved_date: Option<NaiveDate>,
    pub date_origin: DateOrigin,
    /// 0-100; set before C7 runs, never negative.
    pub relevance_score: u8,
    pub relevance_reason: String,
    pub article_type: String,
    pub mentioned_keywords: Vec<String>,
    pub clinical_significance: String,
    pub regulatory_impact: String,
    pub market_impact: String,
    pub summary: String,
    /// Author names, when the provider supplies them; used as the second
    /// tie-breaker in representative selection (C3).
    pub authors: Vec<String>,
}

impl Article {
    /// Construct a freshly-collected article (C1 output), with every
    /// downstream-only field at its default/absent value.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
        source: Source,
        strategy: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let url = url.into();
        let id = fingerprint(&url, &title, source);
        Self {
            id,
            title,
            content: content.into(),
            highlighted_content: None,
            url,
            source,
            strategy: strategy.into(),
            raw_date: None,
            resolved_date: None,
            date_origin: DateOrigin::None,
            relevance_score: 0,
            relevance_reason: String::new(),
            article_type: String::new(),
            mentioned_keywords: Vec::new(),
            clinical_significance: String::new(),
            regulatory_impact: String::new(),
            market_impact: String::new(),
            summary: String::new(),
            authors: Vec::new(),
        }
    }
}

/// Stable fingerprint for an article: the URL when present, else a hash of
/// `title+source`. Deterministic so identical URLs across strategies
/// collapse to the same id (used by the deduplicator's identical-URL
/// shortcut).
#[must_use]
pub fn fingerprint(url: &str, title: &str, source: Source) -> String {
    use std::hash::{Hash, Hasher};
    if !url.is_empty() {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        url.trim_end_matches('/').to_lowercase().hash(&mut hasher);
        return format!("u{:016x}", hasher.finish());
    }
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    title.to_lowercase().hash(&mut hasher);
    source.as_str().hash(&mut hasher);
    format!("t{:016x}", hasher.finish())
}

/// A research query as accepted from the caller (§6 external interface).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Query {
    pub primary_keywords: Vec<String>,
    #[serde(default)]
    pub alias_keywords: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub mode: SearchMode,
    pub enabled_providers: Vec<Source>,
    /// Overrides `Config.thresholds.min_score` for this run only.
    #[serde(default)]
    pub min_score: Option<u8>,
    #[serde(default)]
    pub alert_name: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl Query {
    /// Validate the invariants `start_date <= end_date` and at least one
    /// provider/keyword, returning a [`crate::Error::InvalidInput`] on
    /// violation.
    pub fn validate(&self) -> crate::Result<()> {
        if self.start_date > self.end_date {
            return Err(crate::Error::InvalidInput {
                field: "start_date/end_date".to_string(),
                reason: format!(
                    "start_date {} is after end_date {}",
                    self.start_date, self.end_date
                ),
            });
        }
        if self.primary_keywords.is_empty() && self.alias_keywords.is_empty() {
            return Err(crate::Error::InvalidInput {
                field: "keywords".to_string(),
                reason: "at least one keyword is required".to_string(),
            });
        }
        if self.enabled_providers.is_empty() {
            return Err(crate::Error::InvalidInput {
                field: "enabled_providers".to_string(),
                reason: "at least one provider must be enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Union of `primary_keywords` and `alias_keywords`, order preserved,
    /// duplicates collapsed case-insensitively.
    #[must_use]
    pub fn all_keywords(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for kw in self.primary_keywords.iter().chain(self.alias_keywords.iter()) {
            let key = kw.to_lowercase();
            if seen.insert(key) {
                out.push(kw.clone());
            }
        }
        out
    }
}

/// Per-strategy bookkeeping, filled in by C2 and read by C10.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StrategyStats {
    pub provider: String,
    pub strategy: String,
    pub retrieved: usize,
    pub within_strategy_duplicates: usize,
    pub cross_strategy_duplicates: usize,
    pub cross_provider_duplicates: usize,
    pub in_range: usize,
    pub score_band_high: usize,
    pub score_band_mid: usize,
    pub score_band_low: usize,
    pub score_band_floor: usize,
    pub unique_contribution: usize,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

/// Per-provider aggregate, derived from the strategy rows after a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProviderStats {
    pub provider: String,
    pub retrieved: usize,
    pub after_dedup: usize,
    pub unique_contribution: usize,
    pub duplicate_rate: f64,
    pub avg_score: f64,
    pub kept: usize,
    pub elapsed_ms: u64,
}

/// Score-band histogram produced by C7.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScoreHistogram {
    /// score >= 80
    pub high: usize,
    /// 60 <= score < 80
    pub mid_high: usize,
    /// 40 <= score < 60
    pub mid_low: usize,
    /// score < 40
    pub low: usize,
}

/// Accumulated counters and breakdowns for one pipeline run (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RunStats {
    pub collected: usize,
    pub unique: usize,
    pub duplicates_removed: usize,
    pub duplicate_groups: usize,
    pub with_dates: usize,
    pub without_dates: usize,
    pub model_extracted: usize,
    pub in_range: usize,
    pub out_of_range: usize,
    pub model_rescued: usize,
    pub analyzed: usize,
    pub kept: usize,
    pub filtered: usize,
    pub score_min: u8,
    pub score_max: u8,
    pub score_avg: f64,
    pub score_histogram: ScoreHistogram,
    pub provider_stats: Vec<ProviderStats>,
    pub strategy_stats: Vec<StrategyStats>,
    pub article_type_breakdown: HashMap<String, usize>,
    pub phase_timings_ms: HashMap<String, u64>,
    pub state: String,
    pub error: Option<String>,
}

impl RunStats {
    /// Check the invariants of §3 that must hold for every completed run.
    /// Returns an [`crate::Error::InvariantViolation`] describing the first
    /// violation found, or the `InvariantViolation` category is never
    /// silently swallowed upstream by the orchestrator.
    pub fn check_consistency(&self) -> crate::Result<()> {
        if self.collected != self.unique + self.duplicates_removed {
            return Err(crate::Error::InvariantViolation(format!(
                "collected ({}) != unique ({}) + duplicates_removed ({})",
                self.collected, self.unique, self.duplicates_removed
            )));
        }
        if self.analyzed != self.kept + self.filtered {
            return Err(crate::Error::InvariantViolation(format!(
                "analyzed ({}) != kept ({}) + filtered ({})",
                self.analyzed, self.kept, self.filtered
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_for_same_url() {
        let a = fingerprint("https://example.com/a", "Title A", Source::Pubmed);
        let b = fingerprint("https://example.com/a", "Title A", Source::Pubmed);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_collapses_trailing_slash() {
        let a = fingerprint("https://example.com/a", "", Source::Exa);
        let b = fingerprint("https://example.com/a/", "", Source::Exa);
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_falls_back_to_title_source_hash_without_url() {
        let a = fingerprint("", "Some Title", Source::Newsapi);
        let b = fingerprint("", "Some Title", Source::Newsapi);
        let c = fingerprint("", "Some Title", Source::Tavily);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn all_keywords_dedupes_case_insensitively_and_preserves_order() {
        let q = Query {
            primary_keywords: vec!["Prostate Cancer".to_string(), "immunotherapy".to_string()],
            alias_keywords: vec!["PROSTATE CANCER".to_string(), "CAR-T".to_string()],
            start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            mode: SearchMode::Standard,
            enabled_providers: vec![Source::Pubmed],
            min_score: None,
            alert_name: None,
            user: None,
        };
        assert_eq!(
            q.all_keywords(),
            vec!["Prostate Cancer", "immunotherapy", "CAR-T"]
        );
    }

    #[test]
    fn query_rejects_inverted_window() {
        let q = Query {
            primary_keywords: vec!["x".to_string()],
            alias_keywords: vec![],
            start_date: NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            mode: SearchMode::Standard,
            enabled_providers: vec![Source::Pubmed],
            min_score: None,
            alert_name: None,
            user: None,
        };
        assert!(q.validate().is_err());
    }

    #[test]
    fn run_stats_consistency_check() {
        let mut stats = RunStats {
            collected: 10,
            unique: 8,
            duplicates_removed: 2,
            analyzed: 8,
            kept: 5,
            filtered: 3,
            ..Default::default()
        };
        assert!(stats.check_consistency().is_ok());
        stats.filtered = 2;
        assert!(stats.check_consistency().is_err());
    }
}
