//! Intent source port and the JSON-file adapter.
//!
//! Intents arrive from an external collaborator that knows about open
//! positions and quote snapshots. The core only needs a provider that
//! yields a batch of [`ExitIntent`] values.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::plan::ExitIntent;

/// Intent source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Failed to read the intent file.
    #[error("failed to read intents from '{path}': {source}")]
    Io {
        /// Intent file path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse the intent payload.
    #[error("failed to parse intents: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Port providing the batch of positions to close.
#[async_trait]
pub trait IntentSource: Send + Sync {
    /// Produce the exit intents for this run.
    async fn intents(&self) -> Result<Vec<ExitIntent>, SourceError>;
}

/// Intent source reading a JSON array of intents from a file.
#[derive(Debug, Clone)]
pub struct JsonFileIntentSource {
    path: PathBuf,
}

impl JsonFileIntentSource {
    /// Create a source reading from the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The intent file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl IntentSource for JsonFileIntentSource {
    async fn intents(&self) -> Result<Vec<ExitIntent>, SourceError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        let intents: Vec<ExitIntent> = serde_json::from_str(&contents)?;
        tracing::debug!(
            path = %self.path.display(),
            count = intents.len(),
            "intents loaded"
        );
        Ok(intents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_reads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intents.json");
        std::fs::write(
            &path,
            r#"[
              {
                "descriptor": {
                  "symbol": "SPX",
                  "expiry": "20260918",
                  "strategy": "vertical_spread",
                  "trade_id": "T-1"
                },
                "legs": [
                  {"strike": "100", "right": "CALL", "position": -1,
                   "bid": "1.05", "ask": "1.10"},
                  {"strike": "105", "right": "CALL", "position": 1,
                   "bid": "0.55", "ask": "0.65"}
                ]
              }
            ]"#,
        )
        .unwrap();

        let source = JsonFileIntentSource::new(&path);
        let intents = source.intents().await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].descriptor.trade_id, "T-1");
        assert_eq!(intents[0].descriptor.multiplier, 100);
        assert_eq!(intents[0].legs[0].bid, Some(dec!(1.05)));
        assert_eq!(intents[0].legs[0].source, "live");
    }

    #[tokio::test]
    async fn test_missing_file_reports_path() {
        let source = JsonFileIntentSource::new("/nonexistent/intents.json");
        let err = source.intents().await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/intents.json"));
    }
}
