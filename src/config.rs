//! Layered configuration for the pipeline: provider credentials, model
//! settings, concurrency limits, thresholds, and domain allow-lists.
//!
//! Loading mirrors the reference architecture's `ConfigRepository`
//! pattern: a [`toml`] file provides the base layer, environment variables
//! (prefixed `PHARMA_NEWS_`) override individual fields via the [`config`]
//! crate, and [`Config::from_env`] offers a simpler path, reading
//! credentials and the log level straight from the process environment,
//! for deployments that never ship a config file at all. The runtime
//! hot-reload/history machinery of the reference `ConfigRepository` is
//! not needed here: this pipeline loads its configuration once per run.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Credentials and base URL for one provider adapter (C1).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Exa/Tavily curated domain allow-lists, per the Open Question in §9:
/// treated as configuration, not hard-coded invariants.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DomainAllowLists {
    pub exa_pharma: Vec<String>,
    pub tavily_news: Vec<String>,
    pub tavily_mixed: Vec<String>,
    pub tavily_pharma: Vec<String>,
}

impl Default for DomainAllowLists {
    fn default() -> Self {
        Self {
            exa_pharma: vec![
                "fda.gov".to_string(),
                "nih.gov".to_string(),
                "fiercepharma.com".to_string(),
                "statnews.com".to_string(),
            ],
            tavily_news: vec![
                "reuters.com".to_string(),
                "bloomberg.com".to_string(),
                "apnews.com".to_string(),
            ],
            tavily_mixed: vec![
                "reuters.com".to_string(),
                "fiercepharma.com".to_string(),
                "statnews.com".to_string(),
                "biopharmadive.com".to_string(),
            ],
            tavily_pharma: vec![
                "fiercepharma.com".to_string(),
                "fiercebiotech.com".to_string(),
                "biopharmadive.com".to_string(),
                "pharmatimes.com".to_string(),
            ],
        }
    }
}

/// Which model backs each LLM-dependent stage, plus shared connection
/// settings for the OpenAI-style chat endpoint (§6).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Cheap model used by C4's model-assisted date tier.
    pub date_model: String,
    /// Stronger model used by C6's relevance analyzer.
    pub relevance_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            date_model: "gpt-4o-mini".to_string(),
            relevance_model: "gpt-4o".to_string(),
        }
    }
}

/// Concurrency caps for the parallel loops in C4 (date resolution) and C6
/// (relevance analysis).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConcurrencyConfig {
    /// P: max in-flight date-resolution model calls (default 8).
    pub date_resolution: usize,
    /// M: max in-flight relevance-analysis model calls (default 5).
    pub relevance_analysis: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            date_resolution: 8,
            relevance_analysis: 5,
        }
    }
}

/// Score and similarity thresholds. Both have drifted in the source
/// history (§9 Open Questions); both are configurable here with a
/// documented default rather than inherited silently.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ThresholdsConfig {
    /// Minimum `relevance_score` to survive C7. Default 40.
    pub min_score: u8,
    /// Minimum title-similarity ratio to group two articles in C3.
    /// Default 0.75.
    pub similarity_threshold: f64,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_score: 40,
            similarity_threshold: 0.75,
        }
    }
}

/// Per-call and whole-run timeouts (§5).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TimeoutsConfig {
    #[schemars(with = "u64")]
    pub provider_call: Duration,
    #[schemars(with = "u64")]
    pub date_model_call: Duration,
    #[schemars(with = "u64")]
    pub relevance_model_call: Duration,
    /// Whole-run soft deadline; `None` means no deadline.
    #[schemars(with = "Option<u64>")]
    pub run_deadline: Option<Duration>,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            provider_call: Duration::from_secs(30),
            date_model_call: Duration::from_secs(10),
            relevance_model_call: Duration::from_secs(30),
            run_deadline: None,
        }
    }
}

/// Top-level, immutable configuration captured once at run start (§5: "no
/// global mutable state; configuration is captured in an immutable
/// configuration value at run start").
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub pubmed: ProviderConfig,
    pub exa: ProviderConfig,
    pub tavily: ProviderConfig,
    pub newsapi: ProviderConfig,
    pub model: ModelConfig,
    pub domains: DomainAllowLists,
    pub concurrency: ConcurrencyConfig,
    pub thresholds: ThresholdsConfig,
    pub timeouts: TimeoutsConfig,
    /// Path to the append-only metadata log (C10).
    pub metadata_log_path: String,
    pub log_level: String,
}

/// Fields a caller may override on top of a loaded [`Config`] without
/// re-reading the file/environment, e.g. for tests or per-request tweaks
/// that should not leak into the process-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConfigOverrides {
    pub min_score: Option<u8>,
    pub similarity_threshold: Option<f64>,
    pub date_concurrency: Option<usize>,
    pub relevance_concurrency: Option<usize>,
}

impl Config {
    /// Default metadata log path, relative to the current working
    /// directory, matching the "minimal CLI/env surface" ambient note.
    const DEFAULT_LOG_PATH: &'static str = "pipeline_runs.csv";

    fn base() -> Self {
        Self {
            pubmed: ProviderConfig {
                api_key: None,
                base_url: Some("https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()),
            },
            exa: ProviderConfig {
                api_key: None,
                base_url: Some("https://api.exa.ai".to_string()),
            },
            tavily: ProviderConfig {
                api_key: None,
                base_url: Some("https://api.tavily.com".to_string()),
            },
            newsapi: ProviderConfig {
                api_key: None,
                base_url: Some("https://newsapi.org/v2".to_string()),
            },
            model: ModelConfig::default(),
            domains: DomainAllowLists::default(),
            concurrency: ConcurrencyConfig::default(),
            thresholds: ThresholdsConfig::default(),
            timeouts: TimeoutsConfig::default(),
            metadata_log_path: Self::DEFAULT_LOG_PATH.to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Load a layered configuration: defaults, then an optional TOML file,
    /// then environment overrides prefixed `PHARMA_NEWS_` (e.g.
    /// `PHARMA_NEWS_THRESHOLDS__MIN_SCORE=50`).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::base()).map_err(crate::Error::Config)?);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PHARMA_NEWS")
                .separator("__")
                .try_parsing(true),
        );
        let cfg = builder.build().map_err(crate::Error::Config)?;
        cfg.try_deserialize().map_err(crate::Error::Config)
    }

    /// Simpler environment-only loader for deployments that never ship a
    /// config file: starts from the hard-coded base defaults and overlays
    /// whichever credentials and log level the process environment sets.
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::base();
        if let Ok(key) = std::env::var("PUBMED_API_KEY") {
            cfg.pubmed.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("EXA_API_KEY") {
            cfg.exa.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("TAVILY_API_KEY") {
            cfg.tavily.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("NEWSAPI_API_KEY") {
            cfg.newsapi.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            cfg.model.api_key = Some(key);
        }
        if let Ok(path) = std::env::var("PHARMA_NEWS_METADATA_LOG") {
            cfg.metadata_log_path = path;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            cfg.log_level = level;
        }
        Ok(cfg)
    }

    /// Apply request-scoped [`ConfigOverrides`] without mutating the
    /// process-wide configuration; returns a new value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(v) = overrides.min_score {
            self.thresholds.min_score = v;
        }
        if let Some(v) = overrides.similarity_threshold {
            self.thresholds.similarity_threshold = v;
        }
        if let Some(v) = overrides.date_concurrency {
            self.concurrency.date_resolution = v;
        }
        if let Some(v) = overrides.relevance_concurrency {
            self.concurrency.relevance_analysis = v;
        }
        self
    }

    /// Verify every credential needed by `providers` and the LLM is
    /// present, returning [`crate::Error::ConfigurationMissing`] for the
    /// first gap found. Called once at run start (§7:
    /// `ConfigurationMissing` is fatal before any provider call).
    pub fn validate_for(&self, providers: &[crate::model::Source]) -> crate::Result<()> {
        use crate::model::Source;
        for provider in providers {
            let cfg = match provider {
                Source::Pubmed => &self.pubmed,
                Source::Exa => &self.exa,
                Source::Tavily => &self.tavily,
                Source::Newsapi => &self.newsapi,
            };
            if *provider != Source::Pubmed && cfg.api_key.is_none() {
                return Err(crate::Error::ConfigurationMissing {
                    field: format!("{provider}.api_key"),
                    reason: format!("no API key configured for provider '{provider}'"),
                });
            }
        }
        if self.model.api_key.is_none() {
            return Err(crate::Error::ConfigurationMissing {
                field: "model.api_key".to_string(),
                reason: "no LLM API key configured; C4 model tier and C6 cannot run".to_string(),
            });
        }
        Ok(())
    }
}

/// Generate the JSON Schema documenting the configuration shape, as named
/// in the ambient stack ("`schemars`-derived JSON Schema for documenting
/// the shape").
#[must_use]
pub fn schema() -> schemars::Schema {
    schemars::schema_for!(Config)
}
