pub mod capture;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod startup;
pub mod status;

pub use error::IdvError;
pub use orchestrator::{EventOutcome, SessionOrchestrator};
pub use startup::Application;
