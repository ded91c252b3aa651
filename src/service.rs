//! Enclosing service: ties the orchestrator (C9), the session cache, and
//! the metadata recorder (C10) together behind the single entry point a
//! binary or (out-of-scope) HTTP surface calls.
//!
//! Grounded on the reference architecture's `DaemonService` (`service/daemon.rs`):
//! that type owns a `Config`, coordinates a long-running process, and is
//! the seam a caller starts/stops. `PipelineService` plays the same role
//! for one-shot runs: own the immutable `Config`, run one query through
//! [`orchestrator::run`], cache the outcome, and persist a [`RunRecord`]
//! without making the caller wait for the write.

use crate::metadata_recorder::{MetadataRecorder, RunRecord};
use crate::model::{Article, Query, RunStats};
use crate::orchestrator::{self, CancelToken};
use crate::session::SessionStore;
use crate::Config;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

/// Default number of recent run outcomes kept in the in-process cache.
const DEFAULT_SESSION_CAPACITY: usize = 64;

/// Owns one run's worth of collaborators: configuration, session cache,
/// and the append-only metadata sink. Constructed once per process.
pub struct PipelineService {
    config: Config,
    sessions: Mutex<SessionStore>,
    recorder: Arc<MetadataRecorder>,
    /// In-flight C10 writes, joined at [`PipelineService::shutdown`] so the
    /// process acknowledges persistence before exit without ever blocking
    /// [`PipelineService::run`]'s return (§4.10 sink contract).
    pending_records: Mutex<Vec<JoinHandle<crate::Result<()>>>>,
}

impl PipelineService {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let recorder = MetadataRecorder::new(config.metadata_log_path.clone());
        Self {
            config,
            sessions: Mutex::new(SessionStore::new(DEFAULT_SESSION_CAPACITY)),
            recorder: Arc::new(recorder),
            pending_records: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Run one query end to end via the orchestrator, cache the outcome
    /// under a freshly minted session id, and kick off the C10 write
    /// in the background. Returns as soon as the orchestrator does -
    /// never waits on the metadata write.
    #[instrument(skip(self, query))]
    pub async fn run(&self, query: Query) -> crate::Result<(String, Vec<Article>, RunStats)> {
        let (articles, stats) = orchestrator::run(&query, &self.config, CancelToken::new()).await?;

        let session_id = uuid::Uuid::new_v4().to_string();
        {
            let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            sessions.insert(session_id.clone(), articles.clone(), stats.clone());
        }

        let record = RunRecord::from_run(&session_id, &query, &stats, chrono::Utc::now());
        let recorder = self.recorder.clone();
        let handle = tokio::task::spawn_blocking(move || recorder.record(&record));
        self.pending_records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);

        Ok((session_id, articles, stats))
    }

    /// Fetch a previously cached run outcome by session id (§6
    /// `session_id`: opaque identifier for fetching logs/exports).
    pub fn session(&self, session_id: &str) -> Option<(Vec<Article>, RunStats)> {
        let mut sessions = self.sessions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions
            .get(session_id)
            .map(|entry| (entry.articles.clone(), entry.stats.clone()))
    }

    /// Await every in-flight metadata write. Call before process exit so
    /// the recorder's "must acknowledge persistence before process exit"
    /// contract holds without forcing `run` itself to block on it.
    pub async fn shutdown(&self) {
        let handles: Vec<_> = self
            .pending_records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "failed to persist run record"),
                Err(err) => warn!(error = %err, "metadata recorder task panicked"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SearchMode, Source};
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn query() -> Query {
        Query {
            primary_keywords: vec!["prostate cancer".to_string()],
            alias_keywords: vec![],
            start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 10, 17).unwrap(),
            mode: SearchMode::Standard,
            enabled_providers: vec![Source::Pubmed],
            min_score: None,
            alert_name: None,
            user: None,
        }
    }

    #[tokio::test]
    async fn rejects_before_touching_sessions_or_recorder_on_missing_credentials() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.metadata_log_path = dir.path().join("runs.csv").to_string_lossy().to_string();
        let service = PipelineService::new(config);

        let result = service.run(query()).await;
        assert!(result.is_err());
        assert!(service.session("whatever").is_none());
    }
}
