use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A verification attempt opened on the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerificationSession {
    /// Handed to the capture subsystem to bind it to this session.
    pub start_token: String,
    pub session_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub expiration: DateTime<Utc>,
    /// Image types the server still needs, in server order.
    #[serde(default)]
    pub missing_images: Vec<String>,
}

/// A face-authentication attempt opened on the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FaceAuthSession {
    /// Handed to the capture subsystem to bind it to this session.
    pub device_session_id: String,
    pub session_id: String,
}

/// Which of the two flows an attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Verification,
    FaceAuth,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowKind::Verification => "verification",
            FlowKind::FaceAuth => "face_auth",
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 3339 strings or integer epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom),
        Raw::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {}", ms))),
    }
}
