//! HTTP client for the identity verification API.

use crate::error::ApiError;
use crate::observability::WithTraceContext;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Thin client over one API base URL. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

/// Binary response body together with its declared media type.
#[derive(Debug, Clone)]
pub struct BinaryBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST an `application/x-www-form-urlencoded` body without credentials.
    pub async fn post_form<T: Serialize + ?Sized>(
        &self,
        path: &str,
        form: &T,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);

        self.client
            .post(&url)
            .form(form)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                ApiError::Transport(e)
            })
    }

    /// POST without a body, authenticated with a bearer token.
    pub async fn post_with_auth(&self, path: &str, access_token: &str) -> Result<Response, ApiError> {
        let url = self.url(path);

        self.client
            .post(&url)
            .bearer_auth(access_token)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                ApiError::Transport(e)
            })
    }

    /// POST a JSON body, authenticated with a bearer token.
    pub async fn post_json_with_auth<T: Serialize + ?Sized>(
        &self,
        path: &str,
        access_token: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);

        self.client
            .post(&url)
            .bearer_auth(access_token)
            .json(body)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", url, e);
                ApiError::Transport(e)
            })
    }

    /// GET, authenticated with a bearer token.
    pub async fn get_with_auth(&self, path: &str, access_token: &str) -> Result<Response, ApiError> {
        let url = self.url(path);

        self.client
            .get(&url)
            .bearer_auth(access_token)
            .with_trace_context()
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send GET request to {}: {}", url, e);
                ApiError::Transport(e)
            })
    }
}

/// Decode a JSON body, turning non-2xx replies into [`ApiError::Status`].
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    tracing::debug!(status = %status, body_len = body.len(), "API response");

    if !status.is_success() {
        return Err(ApiError::Status { status, body });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Read a binary body, turning non-2xx replies into [`ApiError::Status`].
pub async fn read_bytes(response: Response) -> Result<BinaryBody, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string());
    let bytes = response.bytes().await?.to_vec();

    Ok(BinaryBody {
        bytes,
        content_type,
    })
}
