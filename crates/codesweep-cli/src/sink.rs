use std::collections::BTreeMap;
use std::path::PathBuf;

use codesweep_core::error::SweepError;
use codesweep_core::traits::ResultSink;

/// Writes the final mapping as a pretty-printed JSON object.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for JsonFileSink {
    async fn persist(&self, results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        let json = serde_json::to_string_pretty(results)?;
        tokio::fs::write(&self.path, json).await?;
        tracing::info!(
            path = %self.path.display(),
            entries = results.len(),
            "Results written"
        );
        Ok(())
    }
}

/// Writes the final mapping as `label,candidate` CSV records with a
/// header row.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ResultSink for CsvFileSink {
    async fn persist(&self, results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        let mut writer = csv::Writer::from_path(&self.path)
            .map_err(|e| SweepError::Persist(e.to_string()))?;
        writer
            .write_record(["label", "candidate"])
            .map_err(|e| SweepError::Persist(e.to_string()))?;
        for (label, candidate) in results {
            writer
                .write_record([label.as_str(), candidate.as_str()])
                .map_err(|e| SweepError::Persist(e.to_string()))?;
        }
        writer.flush()?;
        tracing::info!(
            path = %self.path.display(),
            entries = results.len(),
            "Results written"
        );
        Ok(())
    }
}

/// File sink selected by the CLI `--format` flag.
#[derive(Debug, Clone)]
pub enum FileSink {
    Json(JsonFileSink),
    Csv(CsvFileSink),
}

impl ResultSink for FileSink {
    async fn persist(&self, results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        match self {
            FileSink::Json(sink) => sink.persist(results).await,
            FileSink::Csv(sink) => sink.persist(results).await,
        }
    }
}
