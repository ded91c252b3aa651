//! C2 - strategy dispatcher: expands one [`Query`] into per-provider query
//! variants ("strategies"), runs them with the rate discipline §4.2
//! requires (sequential within a provider, parallel across providers), and
//! folds the raw per-strategy results back into a single article stream
//! plus the [`StrategyStats`] rows C10 records.
//!
//! Grounded on the reference architecture's tool-dispatch loop
//! (`services/tool_service.rs`), which fans a single incoming request out
//! to multiple backing operations and reassembles their outcomes; here the
//! "operations" are query variants against one provider rather than
//! distinct MCP tools.

use crate::config::Config;
use crate::model::{Article, Query, SearchMode, Source, StrategyStats};
use crate::providers::{ExaAdapter, NewsApiAdapter, ProviderAdapter, PubmedAdapter, StrategyRequest, TavilyAdapter};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

/// Default result cap applied to every generated strategy, absent a
/// narrower one; providers may still return fewer.
const DEFAULT_LIMIT: usize = 50;

/// One provider's adapter plus the strategy variants to run against it,
/// in the sequence they must execute (rate discipline, §4.2).
struct ProviderPlan {
    adapter: Arc<dyn ProviderAdapter>,
    requests: Vec<StrategyRequest>,
}

/// Build the per-provider strategy variants for `query`, skipping any
/// provider not present in `query.enabled_providers`.
fn plan_for(query: &Query, config: &Config) -> Vec<ProviderPlan> {
    // Matches the teacher's per-adapter client construction
    // (`client/providers/{arxiv,biorxiv,sci_hub}.rs`): every provider call
    // is bounded by the configured per-call timeout (§4.1, §5 "provider
    // 30s"), not just the retry policy's own attempt timeout.
    let http = reqwest::Client::builder()
        .timeout(config.timeouts.provider_call)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    let primary = query.primary_keywords.clone();
    let all_kw = query.all_keywords();
    let enabled: HashSet<Source> = query.enabled_providers.iter().copied().collect();

    let mut plans = Vec::new();

    if enabled.contains(&Source::Pubmed) {
        let adapter = PubmedAdapter::new(
            http.clone(),
            config
                .pubmed
                .base_url
                .clone()
                .unwrap_or_else(|| "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()),
        );
        let requests = vec![StrategyRequest {
            keywords: primary.clone(),
            start: query.start_date,
            end: query.end_date,
            limit: DEFAULT_LIMIT,
            strategy_name: "primary".to_string(),
            domains: Vec::new(),
            neural: false,
        }];
        plans.push(ProviderPlan {
            adapter: Arc::new(adapter),
            requests,
        });
    }

    if enabled.contains(&Source::Exa) {
        let adapter = ExaAdapter::new(
            http.clone(),
            config.exa.base_url.clone().unwrap_or_else(|| "https://api.exa.ai".to_string()),
            config.exa.api_key.clone().unwrap_or_default(),
        );
        let requests = vec![
            StrategyRequest {
                keywords: primary.clone(),
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "pharma-domains".to_string(),
                domains: config.domains.exa_pharma.clone(),
                neural: false,
            },
            StrategyRequest {
                keywords: all_kw.clone(),
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "neural".to_string(),
                domains: Vec::new(),
                neural: true,
            },
        ];
        plans.push(ProviderPlan {
            adapter: Arc::new(adapter),
            requests,
        });
    }

    if enabled.contains(&Source::Tavily) {
        let adapter = TavilyAdapter::new(
            http.clone(),
            config.tavily.base_url.clone().unwrap_or_else(|| "https://api.tavily.com".to_string()),
            config.tavily.api_key.clone().unwrap_or_default(),
        );
        let keywords = match query.mode {
            SearchMode::TitleOnly => primary.clone(),
            _ => all_kw.clone(),
        };
        let requests = vec![
            StrategyRequest {
                keywords: keywords.clone(),
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "news-heavy".to_string(),
                domains: config.domains.tavily_news.clone(),
                neural: false,
            },
            StrategyRequest {
                keywords: keywords.clone(),
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "mixed".to_string(),
                domains: config.domains.tavily_mixed.clone(),
                neural: false,
            },
            StrategyRequest {
                keywords,
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "pharma-heavy".to_string(),
                domains: config.domains.tavily_pharma.clone(),
                neural: false,
            },
        ];
        plans.push(ProviderPlan {
            adapter: Arc::new(adapter),
            requests,
        });
    }

    if enabled.contains(&Source::Newsapi) {
        let adapter = NewsApiAdapter::new(
            http,
            config.newsapi.base_url.clone().unwrap_or_else(|| "https://newsapi.org/v2".to_string()),
            config.newsapi.api_key.clone().unwrap_or_default(),
        );
        let requests = vec![
            StrategyRequest {
                keywords: primary.clone(),
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "primary".to_string(),
                domains: Vec::new(),
                neural: false,
            },
            // Always run, per the redesign note: rather than conditioning
            // expansion on a zero-result primary strategy, the expanded
            // keyword set runs unconditionally and the deduplicator (C3)
            // absorbs the overlap.
            StrategyRequest {
                keywords: all_kw,
                start: query.start_date,
                end: query.end_date,
                limit: DEFAULT_LIMIT,
                strategy_name: "expanded".to_string(),
                domains: Vec::new(),
                neural: false,
            },
        ];
        plans.push(ProviderPlan {
            adapter: Arc::new(adapter),
            requests,
        });
    }

    plans
}

/// Run every strategy for one provider in sequence, sleeping for the
/// adapter's `min_interval` between calls, collapsing same-provider
/// cross-strategy duplicates in favor of whichever strategy observed the
/// URL first.
async fn run_provider(plan: ProviderPlan) -> (Vec<Article>, Vec<StrategyStats>) {
    let mut articles = Vec::new();
    let mut stats = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let min_interval = plan.adapter.min_interval();

    for (idx, request) in plan.requests.into_iter().enumerate() {
        if idx > 0 && !min_interval.is_zero() {
            tokio::time::sleep(min_interval).await;
        }
        let strategy_name = request.strategy_name.clone();
        let started = Instant::now();
        let outcome = plan.adapter.search(&request).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut within_strategy_duplicates = 0;
        let mut cross_strategy_duplicates = 0;
        let mut within_seen: HashSet<String> = HashSet::new();
        let retrieved = outcome.articles.len();

        for article in outcome.articles {
            if !within_seen.insert(article.id.clone()) {
                within_strategy_duplicates += 1;
                continue;
            }
            if seen_ids.contains(&article.id) {
                cross_strategy_duplicates += 1;
                continue;
            }
            seen_ids.insert(article.id.clone());
            articles.push(article);
        }

        stats.push(StrategyStats {
            provider: plan.adapter.source().to_string(),
            strategy: strategy_name,
            retrieved,
            within_strategy_duplicates,
            cross_strategy_duplicates,
            cross_provider_duplicates: 0,
            in_range: 0,
            score_band_high: 0,
            score_band_mid: 0,
            score_band_low: 0,
            score_band_floor: 0,
            unique_contribution: retrieved - within_strategy_duplicates - cross_strategy_duplicates,
            elapsed_ms,
            error: outcome.error.map(|e| e.to_string()),
        });
    }

    (articles, stats)
}

/// Expand `query` into strategies and execute them: providers run
/// concurrently with each other, strategies within one provider run
/// sequentially to respect that provider's rate rule (§4.2).
#[instrument(skip(query, config), fields(providers = query.enabled_providers.len()))]
pub async fn dispatch(query: &Query, config: &Config) -> (Vec<Article>, Vec<StrategyStats>) {
    let plans = plan_for(query, config);
    let provider_count = plans.len();
    let results = futures::future::join_all(plans.into_iter().map(run_provider)).await;

    let mut articles = Vec::new();
    let mut stats = Vec::new();
    for (provider_articles, provider_stats) in results {
        articles.extend(provider_articles);
        stats.extend(provider_stats);
    }
    info!(
        providers = provider_count,
        strategies = stats.len(),
        collected = articles.len(),
        "strategy dispatch complete"
    );
    (articles, stats)
}
