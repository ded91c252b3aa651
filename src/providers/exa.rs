//! Exa adapter: combined search-and-contents endpoint (§6: POST with
//! `query`, `type`, `includeDomains`, `numResults`, `contents.text = true`).

use super::{ProviderAdapter, SearchOutcome, StrategyRequest};
use crate::model::{Article, Source};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub struct ExaAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExaAdapter {
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
struct ExaRequest {
    query: String,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "includeDomains", skip_serializing_if = "Vec::is_empty")]
    include_domains: Vec<String>,
    #[serde(rename = "numResults")]
    num_results: usize,
    #[serde(rename = "startPublishedDate")]
    start_published_date: String,
    #[serde(rename = "endPublishedDate")]
    end_published_date: String,
    contents: ExaContents,
}

#[derive(Debug, Serialize)]
struct ExaContents {
    text: bool,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

/// Run one Exa search call, retrying transient failures (network errors,
/// 429, 5xx) up to the crate's default retry policy.
async fn call(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &StrategyRequest,
) -> Result<Vec<Article>> {
    let body = ExaRequest {
        query: request.keywords.join(" "),
        kind: if request.neural { "neural" } else { "keyword" },
        include_domains: request.domains.clone(),
        num_results: request.limit,
        start_published_date: request.start.format("%Y-%m-%d").to_string(),
        end_published_date: request.end.format("%Y-%m-%d").to_string(),
        contents: ExaContents { text: true },
    };
    let url = format!("{}/search", base_url.trim_end_matches('/'));

    let attempt = || async {
        let response = http
            .post(&url)
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(Error::Http)?;

        super::classify_status("exa", response.status())?;

        let parsed: ExaResponse = response.json().await.map_err(Error::Http)?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| {
                let mut article = Article::new(
                    r.title.clone().unwrap_or_default(),
                    r.text.clone(),
                    r.url.clone(),
                    Source::Exa,
                    request.strategy_name.clone(),
                );
                article.raw_date = r.published_date.clone();
                if let Some(author) = r.author.clone() {
                    article.authors = vec![author];
                }
                article
            })
            .collect())
    };

    crate::resilience::retry(attempt, "exa_search").await
}

#[async_trait]
impl ProviderAdapter for ExaAdapter {
    fn source(&self) -> Source {
        Source::Exa
    }

    async fn search(&self, request: &StrategyRequest) -> SearchOutcome {
        match call(&self.http, &self.base_url, &self.api_key, request).await {
            Ok(articles) => SearchOutcome::ok(articles),
            Err(err) => {
                warn!(error = %err, strategy = %request.strategy_name, "exa strategy failed");
                SearchOutcome::failed(Error::ProviderFailed {
                    provider: "exa".to_string(),
                    strategy: request.strategy_name.clone(),
                    cause: err.to_string(),
                })
            }
        }
    }
}
