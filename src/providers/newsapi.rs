//! NewsAPI adapter: GET `/everything` with OR-joined quoted keywords,
//! English language, sorted by publication date, window clamped to the
//! provider's maximum historical reach (§4.1, §6).

use super::{or_join_quoted, ProviderAdapter, SearchOutcome, StrategyRequest};
use crate::model::{Article, Source};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use serde::Deserialize;
use tracing::warn;

/// NewsAPI's developer-tier maximum historical reach.
const MAX_HISTORICAL_DAYS: i64 = 30;

pub struct NewsApiAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Clamp `start` so the window never exceeds the provider's maximum
    /// historical reach, measured from `end`.
    fn clamp_start(&self, start: chrono::NaiveDate, end: chrono::NaiveDate) -> chrono::NaiveDate {
        let floor = end - ChronoDuration::days(MAX_HISTORICAL_DAYS);
        start.max(floor)
    }
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

/// Run one NewsAPI search call, retrying transient failures (network
/// errors, 429, 5xx) up to the crate's default retry policy.
async fn call(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &StrategyRequest,
    from: chrono::NaiveDate,
) -> Result<Vec<Article>> {
    let url = format!("{}/everything", base_url.trim_end_matches('/'));
    let query = or_join_quoted(&request.keywords);
    let page_size = request.limit.min(100).to_string();
    let from_str = from.format("%Y-%m-%d").to_string();
    let to_str = request.end.format("%Y-%m-%d").to_string();

    let attempt = || async {
        let response = http
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("apiKey", api_key),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
                ("from", from_str.as_str()),
                ("to", to_str.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Http)?;

        super::classify_status("newsapi", response.status())?;

        let parsed: NewsApiResponse = response.json().await.map_err(Error::Http)?;
        Ok(parsed
            .articles
            .into_iter()
            .map(|a| {
                let content = match (a.description.clone(), a.content.clone()) {
                    (Some(d), Some(c)) => format!("{d} {c}"),
                    (Some(d), None) => d,
                    (None, Some(c)) => c,
                    (None, None) => String::new(),
                };
                let mut article = Article::new(
                    a.title.clone().unwrap_or_default(),
                    content,
                    a.url.clone(),
                    Source::Newsapi,
                    request.strategy_name.clone(),
                );
                article.raw_date = a.published_at.clone();
                if let Some(author) = a.author.clone() {
                    article.authors = vec![author];
                }
                article
            })
            .collect())
    };

    crate::resilience::retry(attempt, "newsapi_search").await
}

#[async_trait]
impl ProviderAdapter for NewsApiAdapter {
    fn source(&self) -> Source {
        Source::Newsapi
    }

    async fn search(&self, request: &StrategyRequest) -> SearchOutcome {
        let from = self.clamp_start(request.start, request.end);
        match call(&self.http, &self.base_url, &self.api_key, request, from).await {
            Ok(articles) => SearchOutcome::ok(articles),
            Err(err) => {
                warn!(error = %err, strategy = %request.strategy_name, "newsapi strategy failed");
                SearchOutcome::failed(Error::ProviderFailed {
                    provider: "newsapi".to_string(),
                    strategy: request.strategy_name.clone(),
                    cause: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_window_to_provider_max_reach() {
        let adapter = NewsApiAdapter::new(reqwest::Client::new(), "https://example.com", "key");
        let end = chrono::NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let far_start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let clamped = adapter.clamp_start(far_start, end);
        assert_eq!(clamped, end - ChronoDuration::days(MAX_HISTORICAL_DAYS));
    }

    #[test]
    fn does_not_clamp_a_window_already_within_reach() {
        let adapter = NewsApiAdapter::new(reqwest::Client::new(), "https://example.com", "key");
        let end = chrono::NaiveDate::from_ymd_opt(2024, 10, 17).unwrap();
        let near_start = chrono::NaiveDate::from_ymd_opt(2024, 10, 10).unwrap();
        let clamped = adapter.clamp_start(near_start, end);
        assert_eq!(clamped, near_start);
    }

    #[test]
    fn or_join_quoted_wraps_each_keyword() {
        let q = or_join_quoted(&["prostate cancer".to_string(), "immunotherapy".to_string()]);
        assert_eq!(q, "\"prostate cancer\" OR \"immunotherapy\"");
    }
}
