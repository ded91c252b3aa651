//! Tavily adapter: search endpoint at `advanced` depth with an
//! allow-listed domain set (§6: POST with `query`, `search_depth:
//! "advanced"`, `include_domains`, `max_results`, `days`).

use super::{ProviderAdapter, SearchOutcome, StrategyRequest};
use crate::model::{Article, Source};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub struct TavilyAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TavilyAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest {
    api_key: String,
    query: String,
    search_depth: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    include_domains: Vec<String>,
    max_results: usize,
    days: i64,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: Option<String>,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

/// Run one Tavily search call, retrying transient failures (network
/// errors, 429, 5xx) up to the crate's default retry policy.
async fn call(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &StrategyRequest,
) -> Result<Vec<Article>> {
    let days = (chrono::Local::now().date_naive() - request.start).num_days().max(1);
    let body = TavilyRequest {
        api_key: api_key.to_string(),
        query: request.keywords.join(" "),
        search_depth: "advanced",
        include_domains: request.domains.clone(),
        max_results: request.limit,
        days,
    };
    let url = format!("{}/search", base_url.trim_end_matches('/'));

    let attempt = || async {
        let response = http.post(&url).json(&body).send().await.map_err(Error::Http)?;

        super::classify_status("tavily", response.status())?;

        let parsed: TavilyResponse = response.json().await.map_err(Error::Http)?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| {
                let mut article = Article::new(
                    r.title.clone().unwrap_or_default(),
                    r.content.clone(),
                    r.url.clone(),
                    Source::Tavily,
                    request.strategy_name.clone(),
                );
                article.raw_date = r.published_date.clone();
                article
            })
            .collect())
    };

    crate::resilience::retry(attempt, "tavily_search").await
}

#[async_trait]
impl ProviderAdapter for TavilyAdapter {
    fn source(&self) -> Source {
        Source::Tavily
    }

    async fn search(&self, request: &StrategyRequest) -> SearchOutcome {
        match call(&self.http, &self.base_url, &self.api_key, request).await {
            Ok(articles) => SearchOutcome::ok(articles),
            Err(err) => {
                warn!(error = %err, strategy = %request.strategy_name, "tavily strategy failed");
                SearchOutcome::failed(Error::ProviderFailed {
                    provider: "tavily".to_string(),
                    strategy: request.strategy_name.clone(),
                    cause: err.to_string(),
                })
            }
        }
    }
}
