//! Error types for the synthesis crate.

use std::path::PathBuf;

use abracadabra_core::CoreError;
use thiserror::Error;

/// Transport-level failures talking to the generative collaborator.
///
/// Every variant is retryable from the loop's point of view: it costs one
/// attempt and the next attempt starts from the same conversation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP request could not be sent or timed out.
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider request failed ({status}): {body}")]
    Status { status: u16, body: String },

    /// The response body was not a chat completion.
    #[error("provider response parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The first choice carried no usable text.
    #[error("provider response missing assistant content")]
    EmptyContent,

    /// Any other collaborator failure (used by non-HTTP collaborators).
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced to callers of the synthesis crate.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Every attempt in the budget was rejected.
    #[error("failed to generate a valid graph after {attempts} attempt(s)")]
    Exhausted {
        attempts: usize,
        /// Code returned by the last attempt that produced any.
        last_candidate: Option<String>,
        /// Feedback lines from the last rejected attempt.
        last_errors: Vec<String>,
    },

    /// Invalid or missing settings.
    #[error("configuration error: {0}")]
    Config(String),

    /// The few-shot corpus could not be read.
    #[error("failed to read examples from '{}': {}", .path.display(), .source)]
    Examples {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
