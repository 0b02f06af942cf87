use crate::capture::CaptureError;
use crate::lifecycle::store::StoreError;
use idv_core::config::ConfigError;
use idv_core::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdvError {
    #[error("Access token request failed: {0}")]
    Auth(#[source] ApiError),

    #[error("Session creation failed: {0}")]
    SessionCreation(#[source] ApiError),

    #[error("Result fetch failed: {0}")]
    ResultFetch(#[source] ApiError),

    #[error("No selfie image available on verification session {session_id}")]
    ReferenceImageNotFound { session_id: String },

    #[error("Reference image fetch failed: {0}")]
    ReferenceImageFetch(#[source] ApiError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Another verification attempt is already active")]
    ConcurrentAttempt,

    #[error("Capture subsystem error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for IdvError {
    fn from(err: ConfigError) -> Self {
        IdvError::Configuration(err.to_string())
    }
}

impl IdvError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IdvError::Auth(_) => "auth",
            IdvError::SessionCreation(_) => "session_creation",
            IdvError::ResultFetch(_) => "result_fetch",
            IdvError::ReferenceImageNotFound { .. } => "reference_image_not_found",
            IdvError::ReferenceImageFetch(_) => "reference_image_fetch",
            IdvError::Precondition(_) => "precondition",
            IdvError::ConcurrentAttempt => "concurrent_attempt",
            IdvError::Capture(_) => "capture",
            IdvError::Storage(_) => "storage",
            IdvError::Configuration(_) => "configuration",
        }
    }
}
