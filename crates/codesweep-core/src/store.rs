use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of a single [`ResultStore::put`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// Label was absent; the candidate is now recorded.
    Inserted,
    /// Label already maps to this exact candidate. No-op.
    Duplicate,
    /// Label already maps to a different candidate. First writer wins;
    /// the existing entry is untouched.
    Conflict { existing: String },
}

/// Concurrency-safe `label → candidate` mapping.
///
/// All access goes through a single internal lock; matches are rare
/// relative to the keyspace, so contention here is negligible. The lock
/// is never held across I/O. A label, once written, is never overwritten
/// within a run.
#[derive(Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned result store");
            poisoned.into_inner()
        })
    }

    /// Insert `label → candidate` if the label is unclaimed.
    pub fn put(&self, label: &str, candidate: &str) -> PutOutcome {
        let mut map = self.lock_inner();
        match map.get(label) {
            None => {
                map.insert(label.to_string(), candidate.to_string());
                PutOutcome::Inserted
            }
            Some(existing) if existing == candidate => PutOutcome::Duplicate,
            Some(existing) => {
                let existing = existing.clone();
                tracing::warn!(
                    %label,
                    %existing,
                    rejected = %candidate,
                    "Conflicting candidate for label — keeping first writer"
                );
                PutOutcome::Conflict { existing }
            }
        }
    }

    /// Immutable copy of the full mapping, sorted by label.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock_inner().clone()
    }

    pub fn len(&self) -> usize {
        self.lock_inner().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_inner().is_empty()
    }
}
