use thiserror::Error;

/// Run-level error types for codesweep.
///
/// These are the unrecoverable failures: bad configuration, a client that
/// cannot be constructed, a sink that cannot write. Per-candidate failures
/// are not errors. They travel as [`ProbeOutcome`](crate::outcome::ProbeOutcome)
/// variants and are counted, so no single candidate can unwind the
/// dispatch loop.
#[derive(Error, Debug)]
pub enum SweepError {
    /// Configuration rejected before the run started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Persistence sink failed to write the final results.
    #[error("persistence error: {0}")]
    Persist(String),

    /// I/O failure outside the probe path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker task panicked mid-sweep.
    #[error("worker panic: {0}")]
    WorkerPanic(String),
}

impl SweepError {
    /// Returns true if this error happened before any candidate was probed.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            SweepError::InvalidConfig(_) | SweepError::HttpClient(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_classification() {
        assert!(SweepError::InvalidConfig("empty alphabet".into()).is_setup());
        assert!(SweepError::HttpClient("bad TLS".into()).is_setup());
        assert!(!SweepError::Persist("disk full".into()).is_setup());
        assert!(!SweepError::WorkerPanic("boom".into()).is_setup());
    }
}
