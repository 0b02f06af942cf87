use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single call against the identity verification HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Response field `{0}` is out of range")]
    InvalidField(&'static str),
}

impl ApiError {
    /// The server answered, but does not know the requested resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status(),
            _ => None,
        }
    }
}
