//! C9 - run orchestrator: sequences C1-C8 through an explicit state
//! machine and accumulates [`RunStats`] as it goes (§4.9).
//!
//! States: `INIT -> COLLECTING -> DEDUPING -> RESOLVING_DATES ->
//! FILTERING_DATES -> ANALYZING -> FILTERING_SCORES -> ENHANCING -> DONE`,
//! with `CANCELLED` reachable from any state (checked between phases via a
//! cooperative flag, not preemptively) and `FAILED` reachable only from an
//! [`crate::Error::InvariantViolation`] - every other per-component failure
//! is isolated at its own stage and never aborts the run (§4.1, §4.9).

use crate::config::Config;
use crate::model::{Article, ProviderStats, Query, RunStats, StrategyStats};
use crate::{date_filter, dedup, enhance, llm, relevance, strategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Cooperative cancellation flag; checked between phases, never inside one
/// (a phase that is already running a batch of HTTP/model calls finishes
/// that batch before the run observes cancellation).
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Checked at every phase boundary: external cancellation takes priority,
/// then the caller-provided whole-run soft deadline (§5 "Whole-run soft
/// deadline is caller-provided; when reached, remaining work is skipped,
/// stats reflect skipped counts"). Neither check happens inside a phase -
/// a phase already in flight runs to completion before the next boundary
/// observes either condition.
macro_rules! checkpoint {
    ($cancel:expr, $deadline:expr, $stats:expr, $state:expr) => {
        if $cancel.is_cancelled() {
            $stats.state = "CANCELLED".to_string();
            return Ok((Vec::new(), $stats));
        }
        if deadline_exceeded($deadline) {
            $stats.state = "CANCELLED".to_string();
            $stats.error = Some("run deadline exceeded; remaining phases skipped".to_string());
            return Ok((Vec::new(), $stats));
        }
        $stats.state = $state.to_string();
    };
}

/// `true` once `deadline` (if any) has passed.
fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// Run one query end to end. Fatal pre-flight failures (invalid query,
/// missing credentials) are returned as `Err` before any provider is
/// called; every failure after that point is folded into the returned
/// [`RunStats`] instead, per the per-component isolation rule.
#[instrument(skip(query, config, cancel), fields(providers = query.enabled_providers.len()))]
pub async fn run(
    query: &Query,
    config: &Config,
    cancel: CancelToken,
) -> crate::Result<(Vec<Article>, RunStats)> {
    query.validate()?;
    config.validate_for(&query.enabled_providers)?;

    let mut stats = RunStats {
        state: "INIT".to_string(),
        ..Default::default()
    };
    let keywords = query.all_keywords();
    let min_score = query.min_score.unwrap_or(config.thresholds.min_score);
    let deadline = config.timeouts.run_deadline.map(|d| Instant::now() + d);

    checkpoint!(cancel, deadline, stats, "COLLECTING");
    let t0 = Instant::now();
    let (collected, strategy_stats) = strategy::dispatch(query, config).await;
    stats.phase_timings_ms.insert("collecting".to_string(), t0.elapsed().as_millis() as u64);
    stats.collected = collected.len();
    stats.strategy_stats = strategy_stats;

    checkpoint!(cancel, deadline, stats, "DEDUPING");
    let t0 = Instant::now();
    let dedup_outcome = dedup::deduplicate(collected, config.thresholds.similarity_threshold);
    stats.phase_timings_ms.insert("deduping".to_string(), t0.elapsed().as_millis() as u64);
    stats.unique = dedup_outcome.kept.len();
    stats.duplicates_removed = dedup_outcome.duplicates_removed;
    stats.duplicate_groups = dedup_outcome.groups.len();
    let mut articles = dedup_outcome.kept;

    checkpoint!(cancel, deadline, stats, "RESOLVING_DATES");
    let t0 = Instant::now();
    let llm_client = config.model.api_key.clone().map(|key| {
        Arc::new(llm::LlmClient::new(reqwest::Client::new(), config.model.base_url.clone(), key))
    });
    let date_resolver = crate::date_resolver::DateResolver::new(
        llm_client.clone(),
        config.model.date_model.clone(),
        config.concurrency.date_resolution,
        config.timeouts.date_model_call,
    );
    date_resolver.resolve_all(&mut articles).await;
    stats.model_extracted = articles
        .iter()
        .filter(|a| a.date_origin == crate::model::DateOrigin::Model)
        .count();
    stats.phase_timings_ms.insert("resolving_dates".to_string(), t0.elapsed().as_millis() as u64);

    checkpoint!(cancel, deadline, stats, "FILTERING_DATES");
    let t0 = Instant::now();
    let date_outcome = date_filter::filter_by_window(articles, query.start_date, query.end_date);
    stats.phase_timings_ms.insert("filtering_dates".to_string(), t0.elapsed().as_millis() as u64);
    stats.with_dates = date_outcome.with_dates;
    stats.without_dates = date_outcome.without_dates;
    stats.in_range = date_outcome.in_range;
    stats.out_of_range = date_outcome.out_of_range;
    stats.model_rescued = date_outcome.model_rescued;
    let mut articles = date_outcome.kept;
    attribute_in_range(&mut stats.strategy_stats, &articles);

    checkpoint!(cancel, deadline, stats, "ANALYZING");
    let t0 = Instant::now();
    match llm_client.clone() {
        Some(llm_client) => {
            let analyzer = relevance::RelevanceAnalyzer::new(
                llm_client,
                config.model.relevance_model.clone(),
                config.concurrency.relevance_analysis,
                config.timeouts.relevance_model_call,
            );
            analyzer.analyze_all(&mut articles, &keywords).await;
        }
        None => {
            warn!("no llm credentials configured; relevance analysis skipped, neutral retention applied");
            for article in &mut articles {
                article.relevance_score = relevance::NEUTRAL_SCORE;
                article.relevance_reason = "llm not configured; retained".to_string();
                article.mentioned_keywords = keywords.clone();
            }
        }
    }
    stats.analyzed = articles.len();
    stats.phase_timings_ms.insert("analyzing".to_string(), t0.elapsed().as_millis() as u64);

    checkpoint!(cancel, deadline, stats, "FILTERING_SCORES");
    let t0 = Instant::now();
    let (mut kept, filtered, histogram) = relevance::filter_by_score(articles, min_score);
    stats.phase_timings_ms.insert("filtering_scores".to_string(), t0.elapsed().as_millis() as u64);
    stats.kept = kept.len();
    stats.filtered = filtered;
    stats.score_histogram = histogram;
    if let Some(min) = kept.iter().map(|a| a.relevance_score).min() {
        stats.score_min = min;
    }
    if let Some(max) = kept.iter().map(|a| a.relevance_score).max() {
        stats.score_max = max;
    }
    if !kept.is_empty() {
        let sum: u32 = kept.iter().map(|a| u32::from(a.relevance_score)).sum();
        stats.score_avg = f64::from(sum) / kept.len() as f64;
    }
    for article in &kept {
        *stats.article_type_breakdown.entry(article.article_type.clone()).or_insert(0) += 1;
    }
    attribute_score_bands(&mut stats.strategy_stats, &kept);

    checkpoint!(cancel, deadline, stats, "ENHANCING");
    let t0 = Instant::now();
    enhance::enhance_all(&mut kept, &keywords);
    stats.phase_timings_ms.insert("enhancing".to_string(), t0.elapsed().as_millis() as u64);

    kept.sort_by(|a, b| {
        b.relevance_score
            .cmp(&a.relevance_score)
            .then_with(|| b.resolved_date.cmp(&a.resolved_date))
            .then_with(|| a.source.as_str().cmp(b.source.as_str()))
    });

    stats.provider_stats = provider_stats_from(&stats, &kept);

    if let Err(err) = stats.check_consistency() {
        warn!(error = %err, "run invariant violated, marking run FAILED");
        stats.state = "FAILED".to_string();
        stats.error = Some(err.to_string());
        return Ok((kept, stats));
    }

    stats.state = "DONE".to_string();
    info!(
        collected = stats.collected,
        kept = stats.kept,
        filtered = stats.filtered,
        "run complete"
    );
    Ok((kept, stats))
}

/// Fold per-article survival-to-date-window outcomes back onto the
/// originating `StrategyStats` row, keyed by `(provider, strategy)` via
/// `Article::source`/`Article::strategy` (§4.10 "in-range" per strategy).
fn attribute_in_range(stats: &mut [StrategyStats], in_range_articles: &[Article]) {
    use std::collections::HashMap;
    let mut counts: HashMap<(String, String), usize> = HashMap::new();
    for article in in_range_articles {
        *counts
            .entry((article.source.as_str().to_string(), article.strategy.clone()))
            .or_insert(0) += 1;
    }
    for row in stats.iter_mut() {
        row.in_range = counts.get(&(row.provider.clone(), row.strategy.clone())).copied().unwrap_or(0);
    }
}

/// Fold final score-band outcomes back onto the originating `StrategyStats`
/// row, the per-strategy analog of [`RunStats::score_histogram`].
fn attribute_score_bands(stats: &mut [StrategyStats], kept_articles: &[Article]) {
    use std::collections::HashMap;
    let mut bands: HashMap<(String, String), (usize, usize, usize, usize)> = HashMap::new();
    for article in kept_articles {
        let key = (article.source.as_str().to_string(), article.strategy.clone());
        let entry = bands.entry(key).or_insert((0, 0, 0, 0));
        match article.relevance_score {
            80..=100 => entry.0 += 1,
            60..=79 => entry.1 += 1,
            40..=59 => entry.2 += 1,
            _ => entry.3 += 1,
        }
    }
    for row in stats.iter_mut() {
        let key = (row.provider.clone(), row.strategy.clone());
        if let Some(&(high, mid, low, floor)) = bands.get(&key) {
            row.score_band_high = high;
            row.score_band_mid = mid;
            row.score_band_low = low;
            row.score_band_floor = floor;
        }
    }
}

/// Roll strategy-level rows up into per-provider aggregates for C10,
/// folding in the `kept`/`avg_score` columns from the final surviving
/// articles (§4.10 "per-provider aggregates").
fn provider_stats_from(stats: &RunStats, kept: &[Article]) -> Vec<ProviderStats> {
    use std::collections::HashMap;
    let mut by_provider: HashMap<String, ProviderStats> = HashMap::new();
    for row in &stats.strategy_stats {
        let entry = by_provider.entry(row.provider.clone()).or_insert_with(|| ProviderStats {
            provider: row.provider.clone(),
            ..Default::default()
        });
        entry.retrieved += row.retrieved;
        entry.unique_contribution += row.unique_contribution;
        entry.elapsed_ms += row.elapsed_ms;
    }
    let mut score_sum: HashMap<String, u32> = HashMap::new();
    for article in kept {
        let provider = article.source.as_str().to_string();
        let entry = by_provider.entry(provider.clone()).or_insert_with(|| ProviderStats {
            provider,
            ..Default::default()
        });
        entry.kept += 1;
        *score_sum.entry(entry.provider.clone()).or_insert(0) += u32::from(article.relevance_score);
    }
    let mut out: Vec<ProviderStats> = by_provider.into_values().collect();
    for p in &mut out {
        p.after_dedup = p.unique_contribution;
        p.duplicate_rate = if p.retrieved == 0 {
            0.0
        } else {
            1.0 - (p.unique_contribution as f64 / p.retrieved as f64)
        };
        p.avg_score = if p.kept == 0 {
            0.0
        } else {
            f64::from(*score_sum.get(&p.provider).unwrap_or(&0)) / p.kept as f64
        };
    }
    out.sort_by(|a, b| a.provider.cmp(&b.provider));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Source, SearchMode};
    use chrono::NaiveDate;

    fn query() -> Query {
        Query {
            primary_keywords: vec!["prostate cancer".to_string()],
            alias_keywords: vec![],
            start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            mode: SearchMode::Standard,
            enabled_providers: vec![Source::Pubmed],
            min_score: None,
            alert_name: None,
            user: None,
        }
    }

    #[tokio::test]
    async fn rejects_invalid_query_before_collecting() {
        let mut q = query();
        q.primary_keywords.clear();
        let config = Config::default();
        let result = run(&q, &config, CancelToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_missing_credentials_before_collecting() {
        let q = query();
        let config = Config::default();
        let result = run(&q, &config, CancelToken::new()).await;
        assert!(result.is_err());
    }

    #[test]
    fn cancel_token_reports_cancellation() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
