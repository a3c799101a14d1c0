//! Test utilities: mock implementations of the engine's traits.
//!
//! Handwritten mocks for dependency injection in unit tests. Mocks use
//! `Arc<Mutex<_>>` interior mutability so tests can assert on recorded
//! calls.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SweepError;
use crate::outcome::{Classification, ProbeOutcome};
use crate::scheduler::{SweepEvent, SweepReporter};
use crate::traits::{Classifier, Prober, ProberFactory, ResultSink};

/// A successful probe whose body the [`MarkerClassifier`] resolves to
/// `Match { label }`.
pub fn match_outcome(label: &str) -> ProbeOutcome {
    ProbeOutcome::Success {
        body: format!("MATCH:{label}"),
        status: 200,
    }
}

/// A successful probe the [`MarkerClassifier`] resolves to `NoMatch`.
pub fn no_match_outcome() -> ProbeOutcome {
    ProbeOutcome::Success {
        body: "nothing here".to_string(),
        status: 200,
    }
}

// ---------------------------------------------------------------------------
// MockProber
// ---------------------------------------------------------------------------

/// Prober that answers from a scripted per-candidate table.
#[derive(Clone)]
pub struct MockProber {
    outcomes: HashMap<String, ProbeOutcome>,
    fallback: ProbeOutcome,
    delay: Duration,
    probed: Arc<Mutex<Vec<String>>>,
}

impl MockProber {
    /// Every candidate gets `fallback` unless overridden.
    pub fn uniform(fallback: ProbeOutcome) -> Self {
        Self {
            outcomes: HashMap::new(),
            fallback,
            delay: Duration::ZERO,
            probed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_outcome(mut self, candidate: &str, outcome: ProbeOutcome) -> Self {
        self.outcomes.insert(candidate.to_string(), outcome);
        self
    }

    /// Sleep before answering, to simulate slow network probes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Candidates whose probe ran to completion, in completion order.
    pub fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }
}

impl Prober for MockProber {
    async fn probe(&self, candidate: &str) -> ProbeOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.probed.lock().unwrap().push(candidate.to_string());
        self.outcomes
            .get(candidate)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// MockProberFactory
// ---------------------------------------------------------------------------

/// Factory handing every worker a clone of the same mock prober.
#[derive(Clone)]
pub struct MockProberFactory {
    prober: MockProber,
    create_error: Arc<Mutex<Option<SweepError>>>,
}

impl MockProberFactory {
    pub fn new(prober: MockProber) -> Self {
        Self {
            prober,
            create_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Factory whose first `create` fails, for setup-error tests.
    pub fn with_create_error(prober: MockProber, error: SweepError) -> Self {
        Self {
            prober,
            create_error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl ProberFactory for MockProberFactory {
    type Prober = MockProber;

    fn create(&self) -> Result<MockProber, SweepError> {
        if let Some(e) = self.create_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.prober.clone())
    }
}

// ---------------------------------------------------------------------------
// MarkerClassifier
// ---------------------------------------------------------------------------

/// Classifier keyed on body markers: `MATCH:<label>` is a match, a body
/// starting with `GARBLED` is malformed, anything else is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerClassifier;

impl Classifier for MarkerClassifier {
    fn classify(&self, body: &str, _status: u16) -> Classification {
        if let Some(label) = body.strip_prefix("MATCH:") {
            Classification::Match {
                label: label.to_string(),
            }
        } else if body.starts_with("GARBLED") {
            Classification::Malformed {
                detail: "garbled body".to_string(),
            }
        } else {
            Classification::NoMatch
        }
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Sink that records every persisted snapshot.
#[derive(Clone, Default)]
pub struct RecordingSink {
    persisted: Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

impl RecordingSink {
    pub fn persisted(&self) -> Vec<BTreeMap<String, String>> {
        self.persisted.lock().unwrap().clone()
    }
}

impl ResultSink for RecordingSink {
    async fn persist(&self, results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        self.persisted.lock().unwrap().push(results.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingSink
// ---------------------------------------------------------------------------

/// Sink that always fails, for fatal-persistence tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingSink;

impl ResultSink for FailingSink {
    async fn persist(&self, _results: &BTreeMap<String, String>) -> Result<(), SweepError> {
        Err(SweepError::Persist("sink unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event labels.
#[derive(Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl SweepReporter for RecordingReporter {
    fn report(&self, event: SweepEvent<'_>) {
        let label = match &event {
            SweepEvent::SweepStarted { .. } => "SweepStarted",
            SweepEvent::WorkerStarted { .. } => "WorkerStarted",
            SweepEvent::Probing { .. } => "Probing",
            SweepEvent::MatchFound { .. } => "MatchFound",
            SweepEvent::NoMatch { .. } => "NoMatch",
            SweepEvent::Malformed { .. } => "Malformed",
            SweepEvent::ProbeFailed { .. } => "ProbeFailed",
            SweepEvent::Conflict { .. } => "Conflict",
            SweepEvent::CancelRequested { .. } => "CancelRequested",
            SweepEvent::WorkerStopped { .. } => "WorkerStopped",
            SweepEvent::SweepFinished { .. } => "SweepFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
