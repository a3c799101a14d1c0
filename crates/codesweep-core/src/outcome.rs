/// Raw result of probing one candidate, after the retry policy has run.
///
/// Produced once per candidate, consumed immediately by the classifier,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered with a 2xx response.
    Success { body: String, status: u16 },

    /// Transient failures (retryable status, timeout, connection error)
    /// persisted through every allowed attempt. The candidate is unknown,
    /// not a miss; it must never fold into [`Classification::NoMatch`].
    TransientFailure(String),

    /// Non-retryable failure. The candidate is unknown, not a miss.
    FatalFailure(String),
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success { .. })
    }
}

/// Verdict of the classifier over a successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The page is well-formed but the candidate is not a valid code.
    NoMatch,

    /// Valid code; `label` identifies the owning society.
    Match { label: String },

    /// The body did not have the expected structure. A logged anomaly;
    /// the sweep continues.
    Malformed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_detection() {
        let ok = ProbeOutcome::Success {
            body: "<html></html>".into(),
            status: 200,
        };
        assert!(ok.is_success());
        assert!(!ProbeOutcome::TransientFailure("HTTP 503".into()).is_success());
        assert!(!ProbeOutcome::FatalFailure("HTTP 404".into()).is_success());
    }
}
