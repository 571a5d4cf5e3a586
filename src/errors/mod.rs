// Error handling module
// Typed failure taxonomy for both pipeline phases. Per-word failures are
// values recorded in the run report, never exceptions escaping the pipeline.

use serde::Serialize;
use thiserror::Error;

/// Transport-level classification of a failed page or audio request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FetchFailure {
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection error, 5xx response, or truncated body. Worth retrying.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// 4xx response. Retrying cannot help.
    #[error("remote returned HTTP {0}")]
    Permanent(u16),
}

impl FetchFailure {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchFailure::Timeout | FetchFailure::Transient(_))
    }

    /// Classify a reqwest transport error (no HTTP status available).
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Timeout
        } else {
            FetchFailure::Transient(err.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        if status.is_client_error() {
            FetchFailure::Permanent(status.as_u16())
        } else {
            FetchFailure::Transient(format!("HTTP {}", status.as_u16()))
        }
    }
}

/// Outcome of trying to resolve a word to an audio resource locator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ResolveError {
    /// The page loaded but carries no pronunciation audio. Final for the word.
    #[error("no pronunciation entry found")]
    NotFound,

    /// The page request itself failed.
    #[error(transparent)]
    Fetch(FetchFailure),
}

/// Terminal failure reason for one word in the audio phase.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AudioFailure {
    #[error("no pronunciation entry found")]
    ResolveNotFound,

    #[error("fetch failed: {0}")]
    FetchError(String),

    #[error("fetch timed out")]
    FetchTimeout,

    #[error("remote returned HTTP {0}")]
    PermanentFetch(u16),

    #[error("invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("write failed: {0}")]
    WriteError(String),
}

impl AudioFailure {
    /// Collapse a transport failure into the recorded per-word reason.
    pub fn from_fetch(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Timeout => AudioFailure::FetchTimeout,
            FetchFailure::Transient(msg) => AudioFailure::FetchError(msg),
            FetchFailure::Permanent(status) => AudioFailure::PermanentFetch(status),
        }
    }
}

/// Failure returned by the chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ApiFailure {
    /// 401/403: the credential is bad. Fatal for the whole sentence phase;
    /// retrying every remaining word with the same key is pointless.
    #[error("generation credential rejected")]
    InvalidCredential,

    /// 429, 5xx or transport error. Retried up to the cap.
    #[error("transient API error: {0}")]
    Transient(String),

    /// Any other non-success reply.
    #[error("API error: {0}")]
    Permanent(String),
}

/// Terminal failure reason for one word in the sentence phase.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum SentenceFailure {
    #[error("generation failed: {0}")]
    Api(String),

    /// The reply could not be decomposed into the expected sections. The
    /// word is reported failed instead of exporting partial data.
    #[error("could not parse generation reply: {0}")]
    Parse(String),
}
