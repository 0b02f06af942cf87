//! idv-core: Shared infrastructure for the identity verification orchestrator.
pub mod config;
pub mod error;
pub mod http;
pub mod observability;

pub use error::ApiError;
pub use http::ApiClient;

pub use reqwest;
pub use serde_json;
pub use tracing;
