//! C4 - three-tier date resolution: metadata -> model -> regex.
//!
//! Each tier runs only if the previous one failed to produce a date.
//! [`DateResolver::resolve_all`] drives the whole batch with a semaphore
//! capping in-flight model calls at `P` (§4.4: "one in-flight model call
//! per article, but up to P articles concurrently").

use crate::llm::{ChatCall, LlmClient};
use crate::model::{Article, DateOrigin};
use chrono::{Duration as ChronoDuration, NaiveDate};
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

/// Fixed ordered list of metadata date formats (§4.4 tier 1), tried in
/// order; the first that parses wins.
const METADATA_FORMATS: &[&str] = &[
    "%Y-%m-%d",       // ISO
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%SZ",
    "%a, %d %b %Y %H:%M:%S %Z", // RFC-like
    "%b %d, %Y",      // "Mon DD, YYYY"
    "%d/%m/%Y",       // "DD/MM/YYYY"
    "%m/%d/%Y",       // "MM/DD/YYYY"
    "%Y%m%d",         // "YYYYMMDD"
];

fn parse_metadata_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(raw) {
        return Some(dt.date_naive());
    }
    for fmt in METADATA_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(date);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

const MONTH_NAMES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn month_pattern() -> String {
    MONTH_NAMES.join("|")
}

fn regex_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let months = month_pattern();
        vec![
            Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").unwrap(),
            Regex::new(r"/(\d{4})(\d{2})(\d{2})/").unwrap(),
            Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap(),
            Regex::new(&format!(r"(?i)({months})\s+(\d{{1,2}}),?\s+(\d{{4}})")).unwrap(),
            Regex::new(&format!(r"(?i)(\d{{1,2}})\s+({months})\s+(\d{{4}})")).unwrap(),
        ]
    })
}

fn month_index(name: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

/// Scan `text` for a date matching one of the five patterns of §4.4 tier
/// 3; returns the first valid match.
#[must_use]
pub fn scan_pattern_date(text: &str) -> Option<NaiveDate> {
    let patterns = regex_patterns();
    // Pattern 0/1/2: numeric, capture groups are (year, month, day).
    for (idx, re) in patterns.iter().enumerate() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let date = match idx {
            0 | 1 | 2 => {
                let year = caps[1].parse::<i32>().ok()?;
                let month = caps[2].parse::<u32>().ok()?;
                let day = caps[3].parse::<u32>().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            3 => {
                // "Month DD, YYYY"
                let month = month_index(&caps[1])?;
                let day = caps[2].parse::<u32>().ok()?;
                let year = caps[3].parse::<i32>().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            4 => {
                // "DD Month YYYY"
                let day = caps[1].parse::<u32>().ok()?;
                let month = month_index(&caps[2])?;
                let year = caps[3].parse::<i32>().ok()?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            _ => None,
        };
        if let Some(date) = date {
            return Some(date);
        }
    }
    None
}

/// `[1990-01-01, now + 30 days]` validity window enforced on the model
/// tier's answer (§4.4 tier 2).
fn model_date_in_range(date: NaiveDate) -> bool {
    let floor = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
    let ceiling = chrono::Local::now().date_naive() + ChronoDuration::days(30);
    date >= floor && date <= ceiling
}

const DATE_PROMPT_SYSTEM: &str =
    "You extract publication dates. Reply with exactly the ten-character \
     string YYYY-MM-DD, or the literal token none. No other text.";

fn build_date_prompt(article: &Article) -> String {
    let url: String = article.url.chars().take(200).collect();
    let title: String = article.title.chars().take(500).collect();
    let content: String = article.content.chars().take(3000).collect();
    let authors = article.authors.join(", ");
    format!(
        "URL: {url}\nTitle: {title}\nSource: {}\nAuthors: {authors}\nContent: {content}\n\n\
         What is the publication date of this article?",
        article.source
    )
}

/// Drives the three-tier cascade across a batch of articles.
pub struct DateResolver {
    llm: Option<Arc<LlmClient>>,
    date_model: String,
    concurrency: usize,
    timeout: Duration,
}

impl DateResolver {
    #[must_use]
    pub fn new(
        llm: Option<Arc<LlmClient>>,
        date_model: impl Into<String>,
        concurrency: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            llm,
            date_model: date_model.into(),
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Resolve dates for every article in place, tier by tier, using up
    /// to `concurrency` concurrent model calls for tier 2.
    #[instrument(skip(self, articles), fields(count = articles.len()))]
    pub async fn resolve_all(&self, articles: &mut [Article]) {
        // Tier 1, synchronous and cheap: no concurrency needed.
        let mut needs_model = Vec::new();
        for (idx, article) in articles.iter_mut().enumerate() {
            if let Some(raw) = article.raw_date.clone() {
                if let Some(date) = parse_metadata_date(&raw) {
                    article.resolved_date = Some(date);
                    article.date_origin = DateOrigin::Metadata;
                    continue;
                }
            }
            needs_model.push(idx);
        }

        // Tier 2: model-assisted, gated by a semaphore of size `concurrency`.
        if let Some(llm) = self.llm.clone() {
            let semaphore = Arc::new(Semaphore::new(self.concurrency));
            let mut tasks = Vec::new();
            for idx in &needs_model {
                let article = articles[*idx].clone();
                let llm = llm.clone();
                let model = self.date_model.clone();
                let timeout = self.timeout;
                let semaphore = semaphore.clone();
                tasks.push(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    let call = ChatCall {
                        model,
                        system: DATE_PROMPT_SYSTEM.to_string(),
                        user: build_date_prompt(&article),
                        temperature: 0.0,
                        max_tokens: 16,
                        json_mode: false,
                        timeout,
                    };
                    llm.chat(&call).await
                });
            }
            let results = futures::future::join_all(tasks).await;
            for (idx, result) in needs_model.iter().zip(results) {
                match result {
                    Ok(text) => {
                        let trimmed = text.trim();
                        if trimmed.eq_ignore_ascii_case("none") {
                            continue;
                        }
                        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
                            if model_date_in_range(date) {
                                articles[*idx].resolved_date = Some(date);
                                articles[*idx].date_origin = DateOrigin::Model;
                            }
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "date model call failed, falling back to regex tier");
                    }
                }
            }
        }

        // Tier 3: pattern-based, cheap and synchronous.
        for article in articles.iter_mut() {
            if article.resolved_date.is_some() {
                continue;
            }
            let window: String = format!("{} {}", article.title, article.content)
                .chars()
                .take(2000)
                .collect();
            if let Some(date) = scan_pattern_date(&article.url).or_else(|| scan_pattern_date(&window)) {
                article.resolved_date = Some(date);
                article.date_origin = DateOrigin::Regex;
            }
        }

        let unresolved = articles.iter().filter(|a| a.resolved_date.is_none()).count();
        if unresolved > 0 {
            warn!(unresolved, "articles left without a resolved date after all tiers");
        }
    }
}
