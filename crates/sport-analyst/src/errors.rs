//! Error taxonomy for the analysis layer.
//!
//! | Error                | Raised by        | Reaches the caller?                    |
//! |----------------------|------------------|----------------------------------------|
//! | `BackendError`       | `ModelBackend`   | No, degraded to fallback text          |
//! | `MissingCredentials` | cloud backend    | Yes, as `AnalysisError::Configuration` |
//! | `AggregationError`   | weight table     | Yes, at `Analyzer::new` only           |
//! | `IllegalTransition`  | state machine    | Yes, as `AnalysisError::Internal`      |
//!
//! Malformed backend output is never an error: the extractor degrades it to
//! zero values and logs what it dropped.

use analysis_core::AggregationError;
use thiserror::Error;

use crate::state_machine::IllegalTransition;

/// Failure of a single backend call or probe.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network-level failure: connection refused, DNS, TLS, body read, or a
    /// timeout enforced by the HTTP client itself.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call did not finish within the descriptor timeout.
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not contain completion text where expected.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend needs an API key and none is configured.
    #[error("no credentials configured for provider {0}")]
    MissingCredentials(String),
}

impl BackendError {
    /// Whether this failure is a configuration problem rather than an outage.
    pub fn is_missing_credentials(&self) -> bool {
        matches!(self, Self::MissingCredentials(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        // `Timeout` carries the adapter deadline; a client-side timeout has none.
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Caller-visible error of the analysis API.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No usable backend is configured (cloud backend without credentials,
    /// or an invalid configuration at construction).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The composite weight table is unusable.
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// A request pipeline attempted an impossible state transition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Lets collaborators branch on configuration failures without string matching.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

impl From<IllegalTransition> for AnalysisError {
    fn from(err: IllegalTransition) -> Self {
        Self::Internal(err.to_string())
    }
}
