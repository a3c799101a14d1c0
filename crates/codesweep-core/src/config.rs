use std::time::Duration;

use url::Url;
use uuid::Uuid;

use crate::error::SweepError;

/// Placeholder replaced with the candidate when rendering an
/// [`EndpointTemplate`].
pub const CODE_PLACEHOLDER: &str = "{code}";

/// Retry policy for a single candidate's probe.
///
/// Delay schedule is multiplicative: `base_delay * backoff_factor^(n-1)`
/// after the n-th failed attempt, capped at `max_delay`. The defaults keep
/// the deliberately slow schedule the target service tolerates
/// (30s, 60s, 120s, ...); tune them down for smoke runs and tests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per candidate, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    /// Upper bound for any single backoff delay.
    pub max_delay: Duration,
    /// Status codes retried as transient.
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(900),
            retry_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff before the next attempt, given how many attempts have
    /// already completed (1-indexed). Non-decreasing in `completed`.
    pub fn delay_for_attempt(&self, completed: u32) -> Duration {
        let exponent = i32::try_from(completed.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.backoff_factor.max(1.0).powi(exponent);
        let raw = self.base_delay.as_secs_f64() * factor;
        if !raw.is_finite() {
            return self.max_delay;
        }
        Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()))
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }
}

/// Run-level knobs for the dispatch scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Short identifier included in the run's log lines.
    pub run_id: String,
    /// Fixed worker pool size. Also the admission control: at most this
    /// many probes are outstanding at any time.
    pub workers: usize,
    /// Grace period an in-flight probe gets to finish after cancellation.
    pub cancel_grace: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            run_id: format!("sweep-{}", &Uuid::new_v4().to_string()[..8]),
            workers: 10,
            cancel_grace: Duration::from_secs(30),
        }
    }
}

impl SweepConfig {
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_cancel_grace(mut self, cancel_grace: Duration) -> Self {
        self.cancel_grace = cancel_grace;
        self
    }
}

/// URL template a candidate is substituted into.
///
/// The `{code}` placeholder is replaced with the candidate; a template
/// without the placeholder gets the candidate appended, which covers the
/// common `...?code=` query form. Validated at construction.
#[derive(Debug, Clone)]
pub struct EndpointTemplate {
    template: String,
}

impl EndpointTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, SweepError> {
        let template = template.into();
        let rendered = Self::substitute(&template, "XXXXXX");
        Url::parse(&rendered).map_err(|e| {
            SweepError::InvalidConfig(format!("invalid endpoint template '{template}': {e}"))
        })?;
        Ok(Self { template })
    }

    pub fn render(&self, candidate: &str) -> String {
        Self::substitute(&self.template, candidate)
    }

    fn substitute(template: &str, candidate: &str) -> String {
        if template.contains(CODE_PLACEHOLDER) {
            template.replace(CODE_PLACEHOLDER, candidate)
        } else {
            format!("{template}{candidate}")
        }
    }
}
