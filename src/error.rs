//! Typed failures from the remote service.
//!
//! The orchestrator decides per table whether a [`SourceError`] is fatal,
//! so page-level failures are returned as values instead of being folded
//! straight into `anyhow` errors.

/// A failed call to the remote service.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network-level failure: DNS, connect, timeout, or an undecodable
    /// non-success HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-zero business code in the body.
    #[error("service error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The response body did not match the expected envelope.
    #[error("decode error: {0}")]
    Decode(String),

    /// `has_more` was set but no continuation cursor was returned.
    #[error("page reported more results but returned no page_token")]
    MissingCursor,
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}
