use crate::error::IdvError;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;
use validator::Validate;

const PLACEHOLDER_CLIENT_ID: &str = "REPLACE_WITH_CLIENT_ID";
const PLACEHOLDER_SECRET: &str = "REPLACE_WITH_SECRET";

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub api: ApiSettings,
    #[serde(default)]
    #[validate(nested)]
    pub face_auth: FaceAuthSettings,
    #[serde(default)]
    #[validate(nested)]
    pub events: EventSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Audience requested for the access token.
    #[serde(default = "default_resource")]
    pub resource: String,
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct FaceAuthSettings {
    #[serde(default = "default_use_case")]
    #[validate(length(min = 1))]
    pub use_case: String,
}

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct EventSettings {
    /// Capacity of the ordered status-event channel.
    #[serde(default = "default_queue_size")]
    #[validate(range(min = 1, max = 4096))]
    pub queue_size: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct TelemetrySettings {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

fn default_base_url() -> String {
    "https://api.transmitsecurity.io".to_string()
}

fn default_resource() -> String {
    "https://verify.identity.security".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_use_case() -> String {
    "authentication".to_string()
}

fn default_queue_size() -> usize {
    64
}

fn default_service_name() -> String {
    "idv-orchestrator".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for FaceAuthSettings {
    fn default() -> Self {
        Self {
            use_case: default_use_case(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Credentials are present and are not the shipped placeholders.
    pub fn is_configured(&self) -> bool {
        let client_id = self.client_id.trim();
        let secret = self.client_secret.expose_secret().trim();

        !client_id.is_empty()
            && !secret.is_empty()
            && client_id != PLACEHOLDER_CLIENT_ID
            && secret != PLACEHOLDER_SECRET
    }
}

impl Settings {
    /// Load `idv-orchestrator/config/base.yaml` with the `APP_*` environment overlay.
    pub fn load() -> Result<Self, IdvError> {
        let settings: Settings = idv_core::config::load_settings("idv-orchestrator")?;
        settings.ensure_configured()?;
        Ok(settings)
    }

    /// Parse settings from a YAML document with the `APP_*` environment overlay.
    pub fn from_yaml(yaml: &str) -> Result<Self, IdvError> {
        Ok(idv_core::config::parse_settings(yaml)?)
    }

    /// Reject invalid values and unconfigured credentials.
    pub fn ensure_configured(&self) -> Result<(), IdvError> {
        self.validate()
            .map_err(|e| IdvError::Configuration(e.to_string()))?;

        if !self.api.is_configured() {
            return Err(IdvError::Configuration(
                "client id and secret must be set (APP_API__CLIENT_ID, APP_API__CLIENT_SECRET)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
