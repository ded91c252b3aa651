//! Thin CLI entry point over the pipeline library (§9 ambient stack: "a
//! thin binary using `clap` ... wires up `Config::load`, runs the
//! orchestrator once, and prints the resulting `DisplayArticle[]`/
//! `RunStats` as JSON").
//!
//! No daemon, signal-handling, or transport machinery here - that belongs
//! to the HTTP/session delivery surface this crate's spec excludes.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use chrono::NaiveDate;
use pharma_news_pipeline::model::{Query, SearchMode, Source};
use pharma_news_pipeline::{Config, PipelineService};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SearchTypeArg {
    Standard,
    Title,
    Cooccurrence,
}

impl From<SearchTypeArg> for SearchMode {
    fn from(value: SearchTypeArg) -> Self {
        match value {
            SearchTypeArg::Standard => Self::Standard,
            SearchTypeArg::Title => Self::TitleOnly,
            SearchTypeArg::Cooccurrence => Self::Cooccurrence,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Pubmed,
    Exa,
    Tavily,
    Newsapi,
}

impl From<ProviderArg> for Source {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Pubmed => Self::Pubmed,
            ProviderArg::Exa => Self::Exa,
            ProviderArg::Tavily => Self::Tavily,
            ProviderArg::Newsapi => Self::Newsapi,
        }
    }
}

/// Run the pharma-news ingestion and curation pipeline for one query.
#[derive(Debug, Parser)]
#[command(name = "pharma-news-pipeline", version, about)]
struct Cli {
    /// Comma-separated primary search keywords.
    #[arg(long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// Additional keywords that widen recall without narrowing relevance.
    #[arg(long, value_delimiter = ',', default_value = "")]
    alias_keywords: Vec<String>,

    /// Inclusive start of the publication-date window (`YYYY-MM-DD`).
    #[arg(long)]
    start_date: NaiveDate,

    /// Inclusive end of the publication-date window (`YYYY-MM-DD`).
    #[arg(long)]
    end_date: NaiveDate,

    /// Search mode; affects strategy generation (C2).
    #[arg(long, value_enum, default_value = "standard")]
    search_type: SearchTypeArg,

    /// Providers to query; defaults to all four adapters.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [
        ProviderArg::Pubmed, ProviderArg::Exa, ProviderArg::Tavily, ProviderArg::Newsapi,
    ])]
    search_engines: Vec<ProviderArg>,

    /// Override `Config.thresholds.min_score` for this run only.
    #[arg(long)]
    min_score: Option<u8>,

    /// Optional alert name recorded in the metadata log (§4.10).
    #[arg(long)]
    alert_name: Option<String>,

    /// Optional user identity recorded in the metadata log (§4.10).
    #[arg(long)]
    user: Option<String>,

    /// Path to a TOML configuration file layered under environment
    /// overrides (see [`Config::load`]).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit JSON logs instead of plain-text.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    pharma_news_pipeline::logging::init(&config, cli.json_logs);

    let query = Query {
        primary_keywords: cli.keywords,
        alias_keywords: cli.alias_keywords.into_iter().filter(|k| !k.is_empty()).collect(),
        start_date: cli.start_date,
        end_date: cli.end_date,
        mode: cli.search_type.into(),
        enabled_providers: cli.search_engines.into_iter().map(Into::into).collect(),
        min_score: cli.min_score,
        alert_name: cli.alert_name,
        user: cli.user,
    };

    let service = PipelineService::new(config);
    let result = service.run(query).await;

    // Acknowledge the metadata write before exit (§4.10 sink contract)
    // regardless of whether the run itself succeeded.
    service.shutdown().await;

    match result {
        Ok((session_id, articles, stats)) => {
            let output = serde_json::json!({
                "session_id": session_id,
                "results": articles,
                "workflow_stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            let output = serde_json::json!({
                "results": Vec::<()>::new(),
                "error": err.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Err(err.into())
        }
    }
}
