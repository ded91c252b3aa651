//! C1 - provider adapters: PubMed, Exa, Tavily, NewsAPI.
//!
//! Every adapter implements the single [`ProviderAdapter`] capability
//! (§9 design note: "Monkey-patched or duck-typed provider shims become a
//! single adapter capability (`search`) with variants"). Adapters never
//! raise to the dispatcher (C2): any network failure or non-success
//! response is converted into an empty article list plus a recorded
//! [`crate::Error::ProviderFailed`] (§4.1 error policy).

pub mod exa;
pub mod newsapi;
pub mod pubmed;
pub mod tavily;

pub use exa::ExaAdapter;
pub use newsapi::NewsApiAdapter;
pub use pubmed::PubmedAdapter;
pub use tavily::TavilyAdapter;

use crate::model::{Article, Source};
use async_trait::async_trait;
use chrono::NaiveDate;

/// A single query variant to execute against one provider (populated by
/// C2's strategy dispatcher).
#[derive(Debug, Clone)]
pub struct StrategyRequest {
    pub keywords: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub limit: usize,
    /// Tag identifying this query variant, stored on every resulting
    /// `Article.strategy`.
    pub strategy_name: String,
    /// Curated domain allow-list; only consulted by Exa/Tavily variants.
    pub domains: Vec<String>,
    /// Exa's neural-vs-keyword mode switch; ignored by other providers.
    pub neural: bool,
}

/// Outcome of one provider call: the normalized articles plus, on
/// failure, the error that was swallowed rather than propagated.
pub struct SearchOutcome {
    pub articles: Vec<Article>,
    pub error: Option<crate::Error>,
}

impl SearchOutcome {
    #[must_use]
    pub fn ok(articles: Vec<Article>) -> Self {
        Self {
            articles,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: crate::Error) -> Self {
        Self {
            articles: Vec::new(),
            error: Some(error),
        }
    }
}

/// Capability implemented by every source provider (§4.1).
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Execute one strategy's query and normalize the response onto
    /// [`Article`]. Must never return `Err`: any failure is caught inside
    /// and folded into [`SearchOutcome::error`].
    async fn search(&self, request: &StrategyRequest) -> SearchOutcome;

    /// Minimum inter-call interval this provider's rate rule requires
    /// (§4.1, §5 "Rate discipline"). `0` means no enforced delay.
    fn min_interval(&self) -> std::time::Duration {
        std::time::Duration::ZERO
    }
}

/// Build the OR-joined, title/abstract-tagged boolean keyword clause
/// shared by the PubMed and NewsAPI query builders.
pub(crate) fn or_join_quoted(keywords: &[String]) -> String {
    keywords
        .iter()
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Classify a provider HTTP response status the same way [`crate::llm`]
/// classifies the model endpoint's: 429 and 5xx are transient (retried by
/// [`crate::resilience::retry`]), everything else is a permanent
/// [`crate::Error::InvalidInput`] that fails the strategy immediately
/// (§5 "Backoff is exponential with jitter, capped at three retries on
/// transient errors"; §7 `ProviderTransient` vs `ProviderPermanent`).
pub(crate) fn classify_status(service: &str, status: reqwest::StatusCode) -> crate::Result<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(crate::Error::RateLimitExceeded {
            retry_after: std::time::Duration::from_secs(1),
        });
    }
    if status.is_server_error() {
        return Err(crate::Error::ServiceUnavailable {
            service: service.to_string(),
            reason: status.to_string(),
        });
    }
    Err(crate::Error::InvalidInput {
        field: format!("{service}_request"),
        reason: format!("{service} endpoint returned {status}"),
    })
}

#[cfg(test)]
mod classify_status_tests {
    use super::classify_status;
    use crate::error::ErrorCategory;

    #[test]
    fn rate_limit_status_is_retryable() {
        let err = classify_status("tavily", reqwest::StatusCode::TOO_MANY_REQUESTS).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::RateLimited);
    }

    #[test]
    fn server_error_status_is_transient() {
        let err = classify_status("tavily", reqwest::StatusCode::BAD_GATEWAY).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Transient);
    }

    #[test]
    fn client_error_status_is_permanent() {
        let err = classify_status("tavily", reqwest::StatusCode::UNAUTHORIZED).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
