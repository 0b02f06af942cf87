//! Client-credentials exchange for verification API access tokens.

use crate::config::ApiSettings;
use crate::error::IdvError;
use crate::models::token::TokenResponse;
use crate::models::AccessToken;
use async_trait::async_trait;
use chrono::Utc;
use idv_core::http::read_json;
use idv_core::{ApiClient, ApiError};
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use tracing::instrument;

pub const TOKEN_PATH: &str = "/oidc/token";

/// Anything that can hand out a fresh access token.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn get_access_token(&self) -> Result<AccessToken, IdvError>;
}

#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Audience the token is requested for.
    pub resource: String,
}

impl From<&ApiSettings> for ClientCredentials {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            resource: settings.resource.clone(),
        }
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    resource: &'a str,
}

/// Stateless per call: every request performs a new exchange.
#[derive(Clone)]
pub struct TokenProvider {
    api: ApiClient,
    credentials: ClientCredentials,
}

impl TokenProvider {
    pub fn new(api: ApiClient, credentials: ClientCredentials) -> Self {
        Self { api, credentials }
    }

    /// Exchange the given credentials for a token.
    #[instrument(skip_all, fields(client_id = %credentials.client_id))]
    pub async fn request_token(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<AccessToken, IdvError> {
        let form = TokenRequest {
            client_id: &credentials.client_id,
            client_secret: credentials.client_secret.expose_secret(),
            grant_type: "client_credentials",
            resource: &credentials.resource,
        };

        let response = self
            .api
            .post_form(TOKEN_PATH, &form)
            .await
            .map_err(IdvError::Auth)?;
        let body: TokenResponse = read_json(response).await.map_err(|e| {
            tracing::error!(error = %e, "Token exchange rejected");
            IdvError::Auth(e)
        })?;

        if body.access_token.is_empty() {
            return Err(IdvError::Auth(ApiError::MissingField("access_token")));
        }

        let token = body.into_access_token(Utc::now()).map_err(|e| {
            tracing::error!(error = %e, "Token response carries an unusable lifetime");
            IdvError::Auth(e)
        })?;
        tracing::info!(expires_at = %token.expires_at(), "Access token acquired");

        Ok(token)
    }
}

#[async_trait]
impl AccessTokenSource for TokenProvider {
    async fn get_access_token(&self) -> Result<AccessToken, IdvError> {
        self.request_token(&self.credentials).await
    }
}
