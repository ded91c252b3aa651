//! Pharma News Pipeline - a multi-source pharmaceutical-news ingestion and
//! curation engine.
//!
//! Given a set of keywords, a date window, and a search mode, the
//! pipeline consults PubMed, Exa, Tavily, and NewsAPI in parallel
//! (C1/C2), deduplicates near-identical titles (C3), resolves a
//! publication date through a metadata/model/regex cascade (C4/C5),
//! scores relevance with a large language model (C6/C7), highlights
//! keyword matches (C8), and hands the result plus run statistics back to
//! the caller (C9), while asynchronously appending a metrics row to an
//! append-only log (C10). See `SPEC_FULL.md` for the full component
//! design and `DESIGN.md` for where each part is grounded.

pub mod config;
pub mod date_filter;
pub mod date_resolver;
pub mod dedup;
pub mod enhance;
pub mod error;
pub mod llm;
pub mod logging;
pub mod metadata_recorder;
pub mod model;
pub mod orchestrator;
pub mod providers;
pub mod relevance;
pub mod resilience;
pub mod service;
pub mod session;
pub mod similarity;
pub mod strategy;

pub use config::{Config, ConfigOverrides};
pub use error::{Error, Result};
pub use metadata_recorder::{MetadataRecorder, RunRecord};
pub use model::{Article, DateOrigin, Query, RunStats, SearchMode, Source};
pub use orchestrator::CancelToken;
pub use resilience::{CircuitBreaker, RetryConfig, RetryPolicy, TimeoutConfig, TimeoutExt};
pub use service::PipelineService;
pub use session::{SessionEntry, SessionStore};
