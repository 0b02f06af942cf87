use chrono::{DateTime, Duration, Utc};
use idv_core::ApiError;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// Bearer credential for the verification API. Lives in memory only.
#[derive(Clone, Debug)]
pub struct AccessToken {
    value: Secret<String>,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: Secret::new(value.into()),
            expires_at,
        }
    }

    /// Token whose expiry is `issued_at + expires_in_secs`, clamped to the
    /// representable range.
    pub fn issued(value: impl Into<String>, issued_at: DateTime<Utc>, expires_in_secs: i64) -> Self {
        let expires_at = expiry_after(issued_at, expires_in_secs).unwrap_or(if expires_in_secs < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        Self::new(value, expires_at)
    }

    pub fn secret(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Unusable at or after `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Body of the client-credentials token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Fails when `expires_in` is not a positive lifetime that fits a timestamp.
    pub fn into_access_token(self, issued_at: DateTime<Utc>) -> Result<AccessToken, ApiError> {
        if self.expires_in <= 0 {
            return Err(ApiError::InvalidField("expires_in"));
        }
        let expires_at = expiry_after(issued_at, self.expires_in)
            .ok_or(ApiError::InvalidField("expires_in"))?;
        Ok(AccessToken::new(self.access_token, expires_at))
    }
}

fn expiry_after(issued_at: DateTime<Utc>, lifetime_secs: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(lifetime_secs).and_then(|lifetime| issued_at.checked_add_signed(lifetime))
}
