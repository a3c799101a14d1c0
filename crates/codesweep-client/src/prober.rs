use std::future::Future;
use std::time::Duration;

use codesweep_core::config::{EndpointTemplate, RetryConfig};
use codesweep_core::error::SweepError;
use codesweep_core::outcome::ProbeOutcome;
use codesweep_core::traits::{Prober, ProberFactory};
use reqwest::Client;

const USER_AGENT: &str = "codesweep/0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response from a single HTTP attempt, before the retry policy runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Connection-level failure of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Timeout,
    Connect(String),
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are worth retrying; anything else
    /// fails the candidate immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connect(_))
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Connect(cause) => write!(f, "connection failed: {cause}"),
            TransportError::Other(cause) => write!(f, "{cause}"),
        }
    }
}

/// One HTTP attempt against a fully rendered URL.
pub trait ProbeTransport: Send + Sync {
    fn send(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// reqwest-backed transport with a persistent connection pool.
///
/// Each worker owns its own instance, so connections are reused across
/// all candidates that worker handles without cross-worker contention.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, SweepError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SweepError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ProbeTransport for ReqwestTransport {
    async fn send(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Other(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Other(format!("failed to read response body: {e}")))?;

        Ok(TransportResponse { status, body })
    }
}

/// Probes one candidate with retry/backoff over a [`ProbeTransport`].
///
/// Retryable statuses and transient transport errors back off
/// multiplicatively up to the attempt cap; other failures are fatal for
/// the candidate immediately. Exhausting retries yields
/// [`ProbeOutcome::TransientFailure`]: the candidate stays unknown
/// rather than folding into a miss.
#[derive(Clone)]
pub struct HttpProber<T> {
    transport: T,
    endpoint: EndpointTemplate,
    retry: RetryConfig,
}

impl<T: ProbeTransport> HttpProber<T> {
    pub fn new(transport: T, endpoint: EndpointTemplate, retry: RetryConfig) -> Self {
        Self {
            transport,
            endpoint,
            retry,
        }
    }
}

impl<T: ProbeTransport> Prober for HttpProber<T> {
    async fn probe(&self, candidate: &str) -> ProbeOutcome {
        let url = self.endpoint.render(candidate);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            let cause = match self.transport.send(&url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return ProbeOutcome::Success {
                        body: response.body,
                        status: response.status,
                    };
                }
                Ok(response) if self.retry.is_retryable_status(response.status) => {
                    format!("HTTP {}", response.status)
                }
                Ok(response) => {
                    return ProbeOutcome::FatalFailure(format!("HTTP {}", response.status));
                }
                Err(err) if err.is_transient() => err.to_string(),
                Err(err) => return ProbeOutcome::FatalFailure(err.to_string()),
            };

            if attempt >= max_attempts {
                return ProbeOutcome::TransientFailure(format!(
                    "retries exhausted after {attempt} attempts: {cause}"
                ));
            }

            let delay = self.retry.delay_for_attempt(attempt);
            tracing::debug!(
                %candidate,
                attempt,
                delay_ms = delay.as_millis() as u64,
                %cause,
                "Transient probe failure, backing off"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Builds a fresh transport (and with it, a fresh connection pool) per
/// worker.
#[derive(Clone)]
pub struct ReqwestProberFactory {
    endpoint: EndpointTemplate,
    retry: RetryConfig,
    timeout: Duration,
}

impl ReqwestProberFactory {
    pub fn new(endpoint: EndpointTemplate) -> Self {
        Self {
            endpoint,
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Per-request timeout, independent of the retry/backoff schedule.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ProberFactory for ReqwestProberFactory {
    type Prober = HttpProber<ReqwestTransport>;

    fn create(&self) -> Result<Self::Prober, SweepError> {
        let transport = ReqwestTransport::new(self.timeout)?;
        Ok(HttpProber::new(
            transport,
            self.endpoint.clone(),
            self.retry.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Transport that pops scripted attempt results and records the
    /// (virtual) time of each attempt.
    #[derive(Clone)]
    struct ScriptedTransport {
        script: Arc<Mutex<Vec<Result<TransportResponse, TransportError>>>>,
        attempts: Arc<Mutex<Vec<Instant>>>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script)),
                attempts: Arc::new(Mutex::new(Vec::new())),
                urls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn status(status: u16) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse {
                status,
                body: format!("status {status}"),
            })
        }

        fn attempt_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }

        /// Delays between consecutive attempts.
        fn gaps(&self) -> Vec<Duration> {
            let attempts = self.attempts.lock().unwrap();
            attempts.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    impl ProbeTransport for ScriptedTransport {
        async fn send(&self, url: &str) -> Result<TransportResponse, TransportError> {
            self.attempts.lock().unwrap().push(Instant::now());
            self.urls.lock().unwrap().push(url.to_string());
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Self::status(503)
            } else {
                script.remove(0)
            }
        }
    }

    fn prober(transport: ScriptedTransport, retry: RetryConfig) -> HttpProber<ScriptedTransport> {
        let endpoint = EndpointTemplate::new("https://example.com/ents/event/9497/?code=").unwrap();
        HttpProber::new(transport, endpoint, retry)
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(max_attempts)
            .with_base_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_statuses_until_success() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(503),
            ScriptedTransport::status(503),
            ScriptedTransport::status(503),
            Ok(TransportResponse {
                status: 200,
                body: "ok".into(),
            }),
        ]);
        let prober = prober(transport.clone(), fast_retry(10));

        let outcome = prober.probe("AAAAAA").await;

        assert_eq!(
            outcome,
            ProbeOutcome::Success {
                body: "ok".into(),
                status: 200
            }
        );
        assert_eq!(transport.attempt_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_non_decreasing_and_multiplicative() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(503),
            ScriptedTransport::status(503),
            ScriptedTransport::status(503),
            Ok(TransportResponse {
                status: 200,
                body: "ok".into(),
            }),
        ]);
        let prober = prober(transport.clone(), fast_retry(10));

        prober.probe("AAAAAA").await;

        // Virtual time: each gap is exactly the scheduled backoff.
        assert_eq!(
            transport.gaps(),
            vec![
                Duration::from_millis(10),
                Duration::from_millis(20),
                Duration::from_millis(40),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausting_retries_yields_transient_failure() {
        let transport = ScriptedTransport::new(vec![]);
        let prober = prober(transport.clone(), fast_retry(3));

        let outcome = prober.probe("AAAAAA").await;

        assert_eq!(transport.attempt_count(), 3);
        match outcome {
            ProbeOutcome::TransientFailure(cause) => {
                assert!(cause.contains("3 attempts"), "unexpected cause: {cause}");
                assert!(cause.contains("HTTP 503"), "unexpected cause: {cause}");
            }
            other => panic!("expected TransientFailure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_fails_fast() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(404)]);
        let prober = prober(transport.clone(), fast_retry(10));

        let outcome = prober.probe("AAAAAA").await;

        assert_eq!(transport.attempt_count(), 1);
        assert_eq!(outcome, ProbeOutcome::FatalFailure("HTTP 404".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_status_is_retried() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::status(429),
            Ok(TransportResponse {
                status: 200,
                body: "ok".into(),
            }),
        ]);
        let prober = prober(transport.clone(), fast_retry(10));

        let outcome = prober.probe("AAAAAA").await;

        assert!(outcome.is_success());
        assert_eq!(transport.attempt_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_errors_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Connect("refused".into())),
            Err(TransportError::Timeout),
            Ok(TransportResponse {
                status: 200,
                body: "ok".into(),
            }),
        ]);
        let prober = prober(transport.clone(), fast_retry(10));

        let outcome = prober.probe("AAAAAA").await;

        assert!(outcome.is_success());
        assert_eq!(transport.attempt_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_transport_error_fails_fast() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::Other("bad redirect".into()))]);
        let prober = prober(transport.clone(), fast_retry(10));

        let outcome = prober.probe("AAAAAA").await;

        assert_eq!(transport.attempt_count(), 1);
        assert!(matches!(outcome, ProbeOutcome::FatalFailure(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_candidate_is_substituted_into_the_url() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::status(200)]);
        let prober = prober(transport.clone(), fast_retry(1));

        prober.probe("AB12CD").await;

        let urls = transport.urls.lock().unwrap();
        assert_eq!(
            urls.as_slice(),
            ["https://example.com/ents/event/9497/?code=AB12CD"]
        );
    }

    #[test]
    fn test_factory_builds_a_prober_per_worker() {
        let endpoint = EndpointTemplate::new("https://example.com/?code=").unwrap();
        let factory = ReqwestProberFactory::new(endpoint)
            .with_retry(fast_retry(2))
            .with_timeout(Duration::from_secs(5));
        assert!(factory.create().is_ok());
        assert!(factory.create().is_ok());
    }
}
