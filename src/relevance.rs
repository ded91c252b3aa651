//! C6 - relevance analyzer and C7 - relevance filter.
//!
//! C6 scores every article 0-100 against a six-criteria rubric (topical
//! match, clinical significance, regulatory impact, market impact,
//! substantiveness, source credibility) via one LLM call per article,
//! gated by a semaphore of size `M` the same way C4 gates its model tier.
//! A malformed or unparseable model response does not drop the article:
//! it is neutrally retained per §4.6's "fail open, never fail closed" rule.

use crate::llm::{extract_json_object, ChatCall, LlmClient};
use crate::model::{Article, ScoreHistogram};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{instrument, warn};

/// Score assigned when the model response could not be parsed at all.
pub const NEUTRAL_SCORE: u8 = 50;
const NEUTRAL_REASON: &str = "parse failure; retained";

const RELEVANCE_PROMPT_SYSTEM: &str = "You are a pharmaceutical news analyst. Score how relevant \
an article is to the given keywords using six criteria: topical match to the keywords, clinical \
significance, regulatory impact, market impact, substantiveness of the reporting, and credibility \
of the source. Reply with a single JSON object and nothing else, shaped exactly as: \
{\"score\": <integer 0-100>, \"reason\": <string>, \"article_type\": <string>, \
\"mentioned_keywords\": [<string>...], \"clinical_significance\": <string>, \
\"regulatory_impact\": <string>, \"market_impact\": <string>, \"summary\": <string>}.";

fn build_prompt(article: &Article, keywords: &[String]) -> String {
    let title: String = article.title.chars().take(500).collect();
    let content: String = article.content.chars().take(4000).collect();
    format!(
        "Keywords: {}\nTitle: {title}\nSource: {}\nContent: {content}",
        keywords.join(", "),
        article.source
    )
}

#[derive(Debug, Deserialize)]
struct RelevanceResponse {
    score: serde_json::Value,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    article_type: String,
    #[serde(default)]
    mentioned_keywords: Vec<String>,
    #[serde(default)]
    clinical_significance: String,
    #[serde(default)]
    regulatory_impact: String,
    #[serde(default)]
    market_impact: String,
    #[serde(default)]
    summary: String,
}

/// Parse one model response, defensively extracting the JSON object first
/// (§4.6 tier of tolerance: clean JSON -> fenced JSON -> first balanced
/// object found in prose). Returns `None` if nothing resembling the
/// expected shape was found.
fn parse_response(raw: &str) -> Option<RelevanceResponse> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(json).ok()
}

fn clamp_score(value: &serde_json::Value) -> u8 {
    let n = value.as_f64().unwrap_or(f64::from(NEUTRAL_SCORE));
    n.round().clamp(0.0, 100.0) as u8
}

/// Apply a model response (or the neutral fallback) onto `article`.
fn apply(article: &mut Article, response: Option<RelevanceResponse>, keywords: &[String]) {
    match response {
        Some(r) => {
            article.relevance_score = clamp_score(&r.score);
            article.relevance_reason = r.reason;
            article.article_type = r.article_type;
            article.mentioned_keywords = r.mentioned_keywords;
            article.clinical_significance = r.clinical_significance;
            article.regulatory_impact = r.regulatory_impact;
            article.market_impact = r.market_impact;
            article.summary = r.summary;
        }
        None => {
            article.relevance_score = NEUTRAL_SCORE;
            article.relevance_reason = NEUTRAL_REASON.to_string();
            article.mentioned_keywords = keywords.to_vec();
            article.summary = article.content.chars().take(200).collect();
        }
    }
}

/// Drives C6's scoring pass across a batch of articles.
pub struct RelevanceAnalyzer {
    llm: Arc<LlmClient>,
    model: String,
    concurrency: usize,
    timeout: std::time::Duration,
}

impl RelevanceAnalyzer {
    #[must_use]
    pub fn new(llm: Arc<LlmClient>, model: impl Into<String>, concurrency: usize, timeout: std::time::Duration) -> Self {
        Self {
            llm,
            model: model.into(),
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Score every article in place, up to `concurrency` concurrent model
    /// calls in flight.
    #[instrument(skip(self, articles, keywords), fields(count = articles.len()))]
    pub async fn analyze_all(&self, articles: &mut [Article], keywords: &[String]) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::new();
        for article in articles.iter() {
            let llm = self.llm.clone();
            let model = self.model.clone();
            let timeout = self.timeout;
            let semaphore = semaphore.clone();
            let prompt = build_prompt(article, keywords);
            tasks.push(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let call = ChatCall {
                    model,
                    system: RELEVANCE_PROMPT_SYSTEM.to_string(),
                    user: prompt,
                    temperature: 0.0,
                    max_tokens: 400,
                    json_mode: true,
                    timeout,
                };
                llm.chat(&call).await
            });
        }

        let results = futures::future::join_all(tasks).await;
        for (article, result) in articles.iter_mut().zip(results) {
            match result {
                Ok(text) => {
                    let parsed = parse_response(&text);
                    if parsed.is_none() {
                        let prefix: String = text.chars().take(200).collect();
                        warn!(
                            article_id = %article.id,
                            raw_response_prefix = %prefix,
                            "relevance response did not parse; retaining neutrally"
                        );
                    }
                    apply(article, parsed, keywords);
                }
                Err(err) => {
                    warn!(error = %err, article_id = %article.id, "relevance call failed; retaining neutrally");
                    apply(article, None, keywords);
                }
            }
        }
    }
}

/// C7: drop every article below `min_score`, keeping the rest in place
/// order, and return the score histogram over the *analyzed* batch.
#[must_use]
pub fn filter_by_score(articles: Vec<Article>, min_score: u8) -> (Vec<Article>, usize, ScoreHistogram) {
    let mut histogram = ScoreHistogram::default();
    for article in &articles {
        match article.relevance_score {
            s if s >= 80 => histogram.high += 1,
            s if s >= 60 => histogram.mid_high += 1,
            s if s >= 40 => histogram.mid_low += 1,
            _ => histogram.low += 1,
        }
    }
    let mut filtered = 0;
    let kept: Vec<Article> = articles
        .into_iter()
        .filter(|a| {
            let keep = a.relevance_score >= min_score;
            if !keep {
                filtered += 1;
            }
            keep
        })
        .collect();
    (kept, filtered, histogram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Source;

    fn article() -> Article {
        Article::new("Title", "Body about prostate cancer treatment.", "https://x.com/a", Source::Pubmed, "s1")
    }

    #[test]
    fn parses_clean_relevance_response() {
        let raw = r#"{"score": 85, "reason": "strong match", "article_type": "clinical_trial",
            "mentioned_keywords": ["prostate cancer"], "clinical_significance": "high",
            "regulatory_impact": "none", "market_impact": "moderate", "summary": "trial results"}"#;
        let parsed = parse_response(raw).unwrap();
        assert_eq!(parsed.score, serde_json::json!(85));
        assert_eq!(parsed.article_type, "clinical_trial");
    }

    #[test]
    fn parses_response_wrapped_in_code_fence() {
        let raw = "```json\n{\"score\": 60, \"reason\": \"ok\"}\n```";
        let parsed = parse_response(raw).unwrap();
        assert_eq!(clamp_score(&parsed.score), 60);
    }

    #[test]
    fn clamps_out_of_range_score() {
        let v = serde_json::json!(150);
        assert_eq!(clamp_score(&v), 100);
        let v = serde_json::json!(-10);
        assert_eq!(clamp_score(&v), 0);
    }

    #[test]
    fn neutral_retention_on_unparseable_response() {
        let mut a = article();
        apply(&mut a, None, &["prostate cancer".to_string()]);
        assert_eq!(a.relevance_score, NEUTRAL_SCORE);
        assert_eq!(a.relevance_reason, NEUTRAL_REASON);
        assert_eq!(a.mentioned_keywords, vec!["prostate cancer".to_string()]);
        assert!(!a.summary.is_empty());
    }

    #[test]
    fn filter_drops_articles_below_threshold_and_buckets_histogram() {
        let mut high = article();
        high.relevance_score = 85;
        let mut mid = article();
        mid.relevance_score = 65;
        let mut low = article();
        low.relevance_score = 20;

        let (kept, filtered, histogram) = filter_by_score(vec![high, mid, low], 40);
        assert_eq!(kept.len(), 2);
        assert_eq!(filtered, 1);
        assert_eq!(histogram.high, 1);
        assert_eq!(histogram.mid_high, 1);
        assert_eq!(histogram.low, 1);
    }
}
