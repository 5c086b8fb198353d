// src/error.rs
//! Error taxonomy for the research pipeline.
//!
//! Transient source failures are the only retryable class; everything else
//! either propagates unchanged or is user-correctable (re-run discovery).

use thiserror::Error;

pub type Result<T, E = ResearchError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// Network, throttling, or 5xx failure from the post source or the
    /// analysis backend. Retried with backoff; surfaced only after the
    /// retry budget is exhausted.
    #[error("transient source failure: {message}")]
    TransientSource { message: String },

    /// No valid credential for the requesting identity. Never retried.
    #[error("no Reddit credential available; connect an account first")]
    AuthorizationRequired,

    /// `get_context` was called for a query that was never discovered.
    #[error("no cached discovery for query {query:?}; run discover first")]
    CacheMiss { query: String },

    /// The cached discovery is older than the TTL and was evicted.
    #[error("cached discovery for query {query:?} expired after {ttl_secs}s; run discover again")]
    CacheExpired { query: String, ttl_secs: u64 },

    /// The requested idea title could not be resolved, even by fuzzy match.
    #[error("no content idea matching {requested:?}; available: {}", .available.join(", "))]
    IdeaNotFound {
        requested: String,
        available: Vec<String>,
    },

    /// The analysis backend returned output that does not fit the expected
    /// structured shape.
    #[error("malformed analysis output: {message}")]
    Analysis { message: String },
}

impl ResearchError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientSource {
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }

    /// Whether the retry wrapper may attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientSource { .. })
    }
}

impl From<reqwest::Error> for ResearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::TransientSource {
            message: err.to_string(),
        }
    }
}
