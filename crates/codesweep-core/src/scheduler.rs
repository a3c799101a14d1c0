use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::SweepConfig;
use crate::error::SweepError;
use crate::keyspace::{Keyspace, KeyspaceCursor};
use crate::outcome::{Classification, ProbeOutcome};
use crate::progress::{ProgressSnapshot, RunProgress};
use crate::store::{PutOutcome, ResultStore};
use crate::traits::{Classifier, Prober, ProberFactory, ResultSink};

/// Lifecycle of one sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Draining,
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Draining => write!(f, "draining"),
            RunState::Done => write!(f, "done"),
        }
    }
}

/// Events emitted by the scheduler and its workers (decoupled logging).
#[derive(Debug, Clone)]
pub enum SweepEvent<'a> {
    SweepStarted {
        run_id: &'a str,
        keyspace_size: u128,
        workers: usize,
    },
    WorkerStarted {
        worker_id: &'a str,
    },
    Probing {
        worker_id: &'a str,
        candidate: &'a str,
    },
    MatchFound {
        candidate: &'a str,
        label: &'a str,
    },
    NoMatch {
        candidate: &'a str,
    },
    Malformed {
        candidate: &'a str,
        detail: &'a str,
    },
    ProbeFailed {
        candidate: &'a str,
        cause: &'a str,
        fatal: bool,
    },
    Conflict {
        label: &'a str,
        existing: &'a str,
        rejected: &'a str,
    },
    CancelRequested {
        run_id: &'a str,
    },
    WorkerStopped {
        worker_id: &'a str,
    },
    SweepFinished {
        run_id: &'a str,
        progress: ProgressSnapshot,
        matches: usize,
    },
}

/// Trait for receiving sweep events.
pub trait SweepReporter: Send + Sync {
    fn report(&self, event: SweepEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSweepReporter;

impl SweepReporter for TracingSweepReporter {
    fn report(&self, event: SweepEvent<'_>) {
        match event {
            SweepEvent::SweepStarted {
                run_id,
                keyspace_size,
                workers,
            } => {
                tracing::info!(%run_id, %keyspace_size, %workers, "Sweep started");
            }
            SweepEvent::WorkerStarted { worker_id } => {
                tracing::info!(%worker_id, "Worker started");
            }
            SweepEvent::Probing {
                worker_id,
                candidate,
            } => {
                tracing::info!(%worker_id, %candidate, "Checking candidate");
            }
            SweepEvent::MatchFound { candidate, label } => {
                tracing::info!(%candidate, %label, "Valid code");
            }
            SweepEvent::NoMatch { candidate } => {
                tracing::info!(%candidate, "No match");
            }
            SweepEvent::Malformed { candidate, detail } => {
                tracing::error!(%candidate, %detail, "Malformed response");
            }
            SweepEvent::ProbeFailed {
                candidate,
                cause,
                fatal,
            } => {
                tracing::error!(%candidate, %cause, %fatal, "Probe failed");
            }
            SweepEvent::Conflict {
                label,
                existing,
                rejected,
            } => {
                tracing::warn!(%label, %existing, %rejected, "Label conflict — first writer kept");
            }
            SweepEvent::CancelRequested { run_id } => {
                tracing::warn!(%run_id, "Cancellation requested — draining in-flight probes");
            }
            SweepEvent::WorkerStopped { worker_id } => {
                tracing::info!(%worker_id, "Worker stopped");
            }
            SweepEvent::SweepFinished {
                run_id,
                progress,
                matches,
            } => {
                tracing::info!(
                    %run_id,
                    dispatched = progress.dispatched,
                    completed = progress.completed,
                    %matches,
                    conflicts = progress.conflicts,
                    transient_failures = progress.transient_failures,
                    fatal_failures = progress.fatal_failures,
                    malformed = progress.malformed,
                    "Sweep finished"
                );
            }
        }
    }
}

/// Final report for one sweep run.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub run_id: String,
    pub progress: ProgressSnapshot,
    pub results: BTreeMap<String, String>,
}

/// Owns the worker pool and drives a sweep from `Idle` to `Done`.
///
/// Each worker pulls candidates from the shared cursor, probes, classifies,
/// and writes matches to the store. The only cross-worker shared mutable
/// state is the cursor and the store; neither lock is held across a
/// network call. Per-candidate failures never abort the run and are never
/// requeued: a candidate is attempted exactly once per run.
pub struct SweepScheduler<PF, C, S>
where
    PF: ProberFactory,
    C: Classifier,
    S: ResultSink,
{
    prober_factory: PF,
    classifier: C,
    sink: S,
    config: SweepConfig,
    store: ResultStore,
    progress: RunProgress,
    state: Arc<Mutex<RunState>>,
}

impl<PF, C, S> SweepScheduler<PF, C, S>
where
    PF: ProberFactory,
    C: Classifier + 'static,
    S: ResultSink,
{
    pub fn new(prober_factory: PF, classifier: C, sink: S, config: SweepConfig) -> Self {
        Self {
            prober_factory,
            classifier,
            sink,
            config,
            store: ResultStore::new(),
            progress: RunProgress::new(),
            state: Arc::new(Mutex::new(RunState::Idle)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        *self.lock_state()
    }

    /// Live progress counters.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned state lock");
            poisoned.into_inner()
        })
    }

    fn set_state(&self, next: RunState) {
        *self.lock_state() = next;
    }

    /// Run the sweep to exhaustion (or cancellation), persist the results,
    /// and return the final report.
    ///
    /// Cancellation stops candidate pull immediately; in-flight probes get
    /// the configured grace period to finish before they are abandoned as
    /// transient failures. Whatever the store holds at drain time is
    /// persisted, exactly once.
    pub async fn run<R>(
        &self,
        keyspace: &Keyspace,
        cancel: CancellationToken,
        reporter: Arc<R>,
    ) -> Result<SweepReport, SweepError>
    where
        R: SweepReporter + 'static,
    {
        if self.config.workers == 0 {
            return Err(SweepError::InvalidConfig(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        // Build every prober before spawning anything, so a failing
        // factory aborts the run with no workers left behind.
        let mut probers = Vec::with_capacity(self.config.workers);
        for _ in 0..self.config.workers {
            probers.push(self.prober_factory.create()?);
        }

        reporter.report(SweepEvent::SweepStarted {
            run_id: &self.config.run_id,
            keyspace_size: keyspace.size(),
            workers: self.config.workers,
        });
        self.set_state(RunState::Running);

        let cursor = KeyspaceCursor::new(keyspace);
        let mut handles = Vec::with_capacity(self.config.workers);
        for (index, prober) in probers.into_iter().enumerate() {
            let worker = Worker {
                worker_id: format!("worker-{index}"),
                prober,
                classifier: self.classifier.clone(),
                cursor: cursor.clone(),
                store: self.store.clone(),
                progress: self.progress.clone(),
                cancel: cancel.clone(),
                grace: self.config.cancel_grace,
                reporter: Arc::clone(&reporter),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        // One log line when the stop signal fires; workers watch the token
        // themselves.
        let watcher = {
            let cancel = cancel.clone();
            let reporter = Arc::clone(&reporter);
            let run_id = self.config.run_id.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                reporter.report(SweepEvent::CancelRequested { run_id: &run_id });
            })
        };

        let mut worker_panic: Option<String> = None;
        for handle in handles {
            if let Err(join_err) = handle.await {
                tracing::error!(error = %join_err, "Worker task failed");
                worker_panic.get_or_insert_with(|| join_err.to_string());
            }
        }
        watcher.abort();

        self.set_state(RunState::Draining);
        let results = self.store.snapshot();
        self.sink.persist(&results).await?;
        self.set_state(RunState::Done);

        let progress = self.progress.snapshot();
        reporter.report(SweepEvent::SweepFinished {
            run_id: &self.config.run_id,
            progress,
            matches: results.len(),
        });

        if let Some(message) = worker_panic {
            return Err(SweepError::WorkerPanic(message));
        }

        Ok(SweepReport {
            run_id: self.config.run_id.clone(),
            progress,
            results,
        })
    }
}

/// One unit of the pool: pulls, probes, classifies, records.
struct Worker<P, C, R>
where
    P: Prober,
    C: Classifier,
    R: SweepReporter,
{
    worker_id: String,
    prober: P,
    classifier: C,
    cursor: KeyspaceCursor,
    store: ResultStore,
    progress: RunProgress,
    cancel: CancellationToken,
    grace: Duration,
    reporter: Arc<R>,
}

impl<P, C, R> Worker<P, C, R>
where
    P: Prober,
    C: Classifier,
    R: SweepReporter,
{
    async fn run(self) {
        self.reporter.report(SweepEvent::WorkerStarted {
            worker_id: &self.worker_id,
        });

        while !self.cancel.is_cancelled() {
            let Some(candidate) = self.cursor.pull() else {
                break;
            };
            self.progress.record_dispatched();
            self.reporter.report(SweepEvent::Probing {
                worker_id: &self.worker_id,
                candidate: &candidate,
            });

            let outcome = self.probe_with_grace(&candidate).await;
            self.settle(&candidate, outcome);
            self.progress.record_completed();
        }

        self.reporter.report(SweepEvent::WorkerStopped {
            worker_id: &self.worker_id,
        });
    }

    /// Run one probe, racing it against cancellation. A cancelled probe
    /// gets `grace` to finish before it is abandoned as transient.
    async fn probe_with_grace(&self, candidate: &str) -> ProbeOutcome {
        let probe = self.prober.probe(candidate);
        tokio::pin!(probe);

        tokio::select! {
            outcome = &mut probe => outcome,
            () = self.cancel.cancelled() => {
                match tokio::time::timeout(self.grace, &mut probe).await {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::TransientFailure(
                        "probe abandoned after cancellation grace period".to_string(),
                    ),
                }
            }
        }
    }

    fn settle(&self, candidate: &str, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Success { body, status } => {
                match self.classifier.classify(&body, status) {
                    Classification::NoMatch => {
                        self.progress.record_no_match();
                        self.reporter.report(SweepEvent::NoMatch { candidate });
                    }
                    Classification::Match { label } => match self.store.put(&label, candidate) {
                        PutOutcome::Inserted => {
                            self.progress.record_match();
                            self.reporter.report(SweepEvent::MatchFound {
                                candidate,
                                label: &label,
                            });
                        }
                        PutOutcome::Duplicate => {}
                        PutOutcome::Conflict { existing } => {
                            self.progress.record_conflict();
                            self.reporter.report(SweepEvent::Conflict {
                                label: &label,
                                existing: &existing,
                                rejected: candidate,
                            });
                        }
                    },
                    Classification::Malformed { detail } => {
                        self.progress.record_malformed();
                        self.reporter.report(SweepEvent::Malformed {
                            candidate,
                            detail: &detail,
                        });
                    }
                }
            }
            ProbeOutcome::TransientFailure(cause) => {
                self.progress.record_transient_failure();
                self.reporter.report(SweepEvent::ProbeFailed {
                    candidate,
                    cause: &cause,
                    fatal: false,
                });
            }
            ProbeOutcome::FatalFailure(cause) => {
                self.progress.record_fatal_failure();
                self.reporter.report(SweepEvent::ProbeFailed {
                    candidate,
                    cause: &cause,
                    fatal: true,
                });
            }
        }
    }
}
