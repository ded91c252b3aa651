//! C10 - metadata recorder: appends one wide row per pipeline run to a
//! tabular sink (§4.10).
//!
//! Sink contract: append-only, column-aligned, missing fields serialize
//! empty rather than being omitted. Per-strategy detail is too granular
//! for flat columns, so it rides along as an embedded JSON blob in its own
//! column, the way the spec's "embedded structured blob" phrasing calls
//! for. The recorder never runs on the hot path that returns results to
//! the caller - [`crate::service::PipelineService`] spawns [`MetadataRecorder::record`]
//! onto a blocking task and only joins it at shutdown, never before
//! handing the run's articles back.

use crate::model::{Query, RunStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Single wide row written after a run reaches `DONE` or `FAILED` (§4.10).
/// Created once per run, written exactly once (§3 Lifecycle).
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub alert_name: String,
    pub mode: String,
    pub user: String,
    pub keywords: String,
    pub window_start: String,
    pub window_end: String,
    pub collected: usize,
    pub unique: usize,
    pub duplicates_removed: usize,
    pub duplicate_rate: f64,
    pub with_dates: usize,
    pub without_dates: usize,
    pub model_extracted: usize,
    pub in_range: usize,
    pub out_of_range: usize,
    pub model_rescued: usize,
    pub analyzed: usize,
    pub kept: usize,
    pub filtered: usize,
    pub score_min: u8,
    pub score_max: u8,
    pub score_avg: f64,
    pub score_band_high: usize,
    pub score_band_mid_high: usize,
    pub score_band_mid_low: usize,
    pub score_band_low: usize,
    /// `Vec<ProviderStats>`, JSON-encoded.
    pub provider_stats: String,
    /// `Vec<StrategyStats>`, JSON-encoded.
    pub strategy_stats: String,
    /// `HashMap<String, usize>`, JSON-encoded.
    pub article_type_breakdown: String,
    /// `HashMap<String, u64>` (phase name -> elapsed ms), JSON-encoded.
    pub phase_timings_ms: String,
    pub state: String,
    pub error: String,
}

impl RunRecord {
    /// Build the row for one completed run. `timestamp` is supplied by
    /// the caller rather than taken internally so tests stay deterministic.
    #[must_use]
    pub fn from_run(run_id: &str, query: &Query, stats: &RunStats, timestamp: DateTime<Utc>) -> Self {
        let collected = stats.collected.max(1) as f64;
        Self {
            run_id: run_id.to_string(),
            timestamp,
            alert_name: query.alert_name.clone().unwrap_or_default(),
            mode: format!("{:?}", query.mode).to_lowercase(),
            user: query.user.clone().unwrap_or_default(),
            keywords: query.all_keywords().join(","),
            window_start: query.start_date.to_string(),
            window_end: query.end_date.to_string(),
            collected: stats.collected,
            unique: stats.unique,
            duplicates_removed: stats.duplicates_removed,
            duplicate_rate: f64::from(u32::try_from(stats.duplicates_removed).unwrap_or(u32::MAX))
                / collected,
            with_dates: stats.with_dates,
            without_dates: stats.without_dates,
            model_extracted: stats.model_extracted,
            in_range: stats.in_range,
            out_of_range: stats.out_of_range,
            model_rescued: stats.model_rescued,
            analyzed: stats.analyzed,
            kept: stats.kept,
            filtered: stats.filtered,
            score_min: stats.score_min,
            score_max: stats.score_max,
            score_avg: stats.score_avg,
            score_band_high: stats.score_histogram.high,
            score_band_mid_high: stats.score_histogram.mid_high,
            score_band_mid_low: stats.score_histogram.mid_low,
            score_band_low: stats.score_histogram.low,
            provider_stats: serde_json::to_string(&stats.provider_stats).unwrap_or_default(),
            strategy_stats: serde_json::to_string(&stats.strategy_stats).unwrap_or_default(),
            article_type_breakdown: serde_json::to_string(&stats.article_type_breakdown)
                .unwrap_or_default(),
            phase_timings_ms: serde_json::to_string(&stats.phase_timings_ms).unwrap_or_default(),
            state: stats.state.clone(),
            error: stats.error.clone().unwrap_or_default(),
        }
    }
}

/// Append-only sink for [`RunRecord`] rows (§4.10).
#[derive(Debug, Clone)]
pub struct MetadataRecorder {
    path: PathBuf,
}

impl MetadataRecorder {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` as a new row, writing a header only if the file is
    /// new or empty. Blocking file I/O; callers on an async runtime should
    /// run this via `spawn_blocking` (see [`crate::service::PipelineService`]).
    pub fn record(&self, record: &RunRecord) -> crate::Result<()> {
        let needs_header = !self.path.exists()
            || std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}

impl From<csv::Error> for crate::Error {
    fn from(err: csv::Error) -> Self {
        crate::Error::Parse {
            context: "metadata_recorder".to_string(),
            message: err.to_string(),
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
            alert_name: Some("weekly-scan".to_string()),
            user: Some("analyst".to_string()),
        }
    }

    #[test]
    fn writes_header_on_first_row_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let recorder = MetadataRecorder::new(&path);

        let stats = RunStats {
            collected: 10,
            unique: 8,
            duplicates_removed: 2,
            analyzed: 8,
            kept: 5,
            filtered: 3,
            state: "DONE".to_string(),
            ..Default::default()
        };
        let record = RunRecord::from_run("run-1", &query(), &stats, Utc::now());
        recorder.record(&record).unwrap();
        recorder.record(&record).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert!(lines[0].starts_with("run_id,"));
    }

    #[test]
    fn embeds_strategy_stats_as_json_blob() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let recorder = MetadataRecorder::new(&path);

        let mut stats = RunStats::default();
        stats.strategy_stats.push(crate::model::StrategyStats {
            provider: "pubmed".to_string(),
            strategy: "primary".to_string(),
            retrieved: 12,
            ..Default::default()
        });
        let record = RunRecord::from_run("run-2", &query(), &stats, Utc::now());
        recorder.record(&record).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("pubmed"));
        assert!(contents.contains("primary"));
    }
}
