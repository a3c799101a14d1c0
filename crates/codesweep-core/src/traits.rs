use std::collections::BTreeMap;
use std::future::Future;

use crate::error::SweepError;
use crate::outcome::{Classification, ProbeOutcome};

/// Probes the endpoint with one candidate, running the full retry policy.
///
/// Failures are data: a prober never returns `Err`. It reports them as
/// [`ProbeOutcome`] variants so the dispatch loop keeps sweeping.
pub trait Prober: Send + Sync {
    fn probe(&self, candidate: &str) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Builds one [`Prober`] per worker.
///
/// Each worker owns its prober, and with it its connection pool; no
/// connection state is shared across workers.
pub trait ProberFactory: Send + Sync {
    type Prober: Prober + 'static;

    fn create(&self) -> Result<Self::Prober, SweepError>;
}

/// Classifies a successful response body.
///
/// Must be a pure function of the body: deterministic, and returning
/// [`Classification::Malformed`] rather than panicking when the body does
/// not have the expected structural shape.
pub trait Classifier: Send + Sync + Clone {
    fn classify(&self, body: &str, status: u16) -> Classification;
}

/// Durably writes the final `label → candidate` mapping.
///
/// Called exactly once per run, whether the sweep ran to exhaustion or
/// was cancelled.
pub trait ResultSink: Send + Sync {
    fn persist(
        &self,
        results: &BTreeMap<String, String>,
    ) -> impl Future<Output = Result<(), SweepError>> + Send;
}

/// A no-op ResultSink for tests and dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    async fn persist(&self, _results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        Ok(())
    }
}
