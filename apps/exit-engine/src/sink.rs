//! Result persistence port and the JSONL adapter.
//!
//! The core emits one [`ExitFlowResult`] per intent; the sink wraps it in
//! a timestamped record keyed by a run identifier and appends it to
//! durable storage. Storage mechanics stay behind the port so the
//! orchestrator and binary never see file handles.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::result::ExitFlowResult;

/// Result sink errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Failed to open or write the storage target.
    #[error("failed to write result to '{path}': {source}")]
    Io {
        /// Storage path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to serialize the record.
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One persisted flow record: the result plus run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedFlowRecord {
    /// Unique identifier for this orchestration run.
    pub run_id: Uuid,
    /// When the record was written.
    pub recorded_at: DateTime<Utc>,
    /// The flow result itself.
    #[serde(flatten)]
    pub result: ExitFlowResult,
}

impl PersistedFlowRecord {
    /// Wrap a flow result with fresh run metadata.
    #[must_use]
    pub fn new(result: ExitFlowResult) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            result,
        }
    }
}

/// Port for persisting one flow result per intent.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist one flow result.
    async fn record(&self, result: &ExitFlowResult) -> Result<(), SinkError>;
}

/// Sink appending one JSON record per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlResultSink {
    path: PathBuf,
}

impl JsonlResultSink {
    /// Create a sink writing to the given path. The file is created on
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The storage path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")
    }
}

#[async_trait]
impl ResultSink for JsonlResultSink {
    async fn record(&self, result: &ExitFlowResult) -> Result<(), SinkError> {
        let record = PersistedFlowRecord::new(result.clone());
        let line = serde_json::to_string(&record)?;
        self.append_line(&line).map_err(|source| SinkError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        tracing::debug!(
            path = %self.path.display(),
            run_id = %record.run_id,
            status = ?result.status,
            "flow result persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ExitAttemptResult, FlowStatus};
    use rust_decimal_macros::dec;

    fn make_result(trade_id: &str) -> ExitFlowResult {
        ExitFlowResult {
            status: FlowStatus::Success,
            reason: "primary".to_string(),
            symbol: "SPX".to_string(),
            expiry: "20260918".to_string(),
            trade_id: trade_id.to_string(),
            strategy: "iron_condor".to_string(),
            limit_prices: vec![dec!(0.50)],
            order_ids: vec![42],
            attempts: vec![ExitAttemptResult::success("primary", dec!(0.50), vec![42])],
            forced: false,
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_result() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");
        let sink = JsonlResultSink::new(&path);

        sink.record(&make_result("T-1")).await.unwrap();
        sink.record(&make_result("T-2")).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: PersistedFlowRecord = serde_json::from_str(lines[0]).unwrap();
        let second: PersistedFlowRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first.result.trade_id, "T-1");
        assert_eq!(second.result.trade_id, "T-2");
        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.result.order_ids, vec![42]);
    }

    #[tokio::test]
    async fn test_io_error_carries_path() {
        let sink = JsonlResultSink::new("/nonexistent-dir/results.jsonl");
        let err = sink.record(&make_result("T-3")).await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent-dir/results.jsonl"));
    }
}
