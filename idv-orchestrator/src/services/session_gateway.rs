//! HTTP calls that open verification and face-auth sessions and read their
//! results. No retries: failures go straight back to the caller.

use crate::error::IdvError;
use crate::models::image::CreateFaceAuthSessionRequest;
use crate::models::{
    AccessToken, EncodedImage, FaceAuthResult, FaceAuthSession, VerificationResult,
    VerificationSession,
};
use async_trait::async_trait;
use idv_core::http::read_json;
use idv_core::{ApiClient, ApiError};
use tracing::instrument;

pub const VERIFICATION_PATH: &str = "/verify/api/v1/verification";
pub const FACE_AUTH_PATH: &str = "/verify/api/v1/face-auth";

#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn create_verification_session(
        &self,
        token: &AccessToken,
    ) -> Result<VerificationSession, IdvError>;

    /// Only meaningful once the attempt reported completion.
    async fn get_verification_result(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<VerificationResult, IdvError>;

    async fn create_face_auth_session(
        &self,
        token: &AccessToken,
        reference: &EncodedImage,
    ) -> Result<FaceAuthSession, IdvError>;

    async fn get_face_auth_result(
        &self,
        device_session_id: &str,
        token: &AccessToken,
    ) -> Result<FaceAuthResult, IdvError>;
}

#[derive(Clone)]
pub struct SessionGateway {
    api: ApiClient,
    use_case: String,
}

impl SessionGateway {
    pub fn new(api: ApiClient, use_case: impl Into<String>) -> Self {
        Self {
            api,
            use_case: use_case.into(),
        }
    }
}

#[async_trait]
impl SessionApi for SessionGateway {
    #[instrument(skip_all)]
    async fn create_verification_session(
        &self,
        token: &AccessToken,
    ) -> Result<VerificationSession, IdvError> {
        let response = self
            .api
            .post_with_auth(VERIFICATION_PATH, token.secret())
            .await
            .map_err(IdvError::SessionCreation)?;
        let session: VerificationSession = read_json(response).await.map_err(|e| {
            tracing::error!(error = %e, "Verification session creation failed");
            IdvError::SessionCreation(e)
        })?;

        if session.start_token.is_empty() {
            return Err(IdvError::SessionCreation(ApiError::MissingField("start_token")));
        }
        if session.session_id.is_empty() {
            return Err(IdvError::SessionCreation(ApiError::MissingField("session_id")));
        }

        tracing::info!(
            session_id = %session.session_id,
            expiration = %session.expiration,
            missing_images = session.missing_images.len(),
            "Verification session created"
        );
        Ok(session)
    }

    #[instrument(skip(self, token))]
    async fn get_verification_result(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<VerificationResult, IdvError> {
        let path = format!(
            "{}/{}/result",
            VERIFICATION_PATH,
            urlencoding::encode(session_id)
        );

        let response = self
            .api
            .get_with_auth(&path, token.secret())
            .await
            .map_err(IdvError::ResultFetch)?;
        let result: VerificationResult = read_json(response).await.map_err(|e| {
            if e.is_not_found() {
                tracing::warn!("Verification session unknown to the server");
            }
            IdvError::ResultFetch(e)
        })?;

        tracing::info!(
            status = %result.status,
            recommendation = ?result.recommendation,
            "Verification result fetched"
        );
        Ok(result)
    }

    #[instrument(skip_all, fields(image_id = %reference.image_id))]
    async fn create_face_auth_session(
        &self,
        token: &AccessToken,
        reference: &EncodedImage,
    ) -> Result<FaceAuthSession, IdvError> {
        let body = CreateFaceAuthSessionRequest::new(reference, &self.use_case);

        let response = self
            .api
            .post_json_with_auth(FACE_AUTH_PATH, token.secret(), &body)
            .await
            .map_err(IdvError::SessionCreation)?;
        let session: FaceAuthSession = read_json(response).await.map_err(|e| {
            tracing::error!(error = %e, "Face-auth session creation failed");
            IdvError::SessionCreation(e)
        })?;

        if session.device_session_id.is_empty() {
            return Err(IdvError::SessionCreation(ApiError::MissingField(
                "device_session_id",
            )));
        }
        if session.session_id.is_empty() {
            return Err(IdvError::SessionCreation(ApiError::MissingField("session_id")));
        }

        tracing::info!(session_id = %session.session_id, "Face-auth session created");
        Ok(session)
    }

    #[instrument(skip(self, token))]
    async fn get_face_auth_result(
        &self,
        device_session_id: &str,
        token: &AccessToken,
    ) -> Result<FaceAuthResult, IdvError> {
        let path = format!(
            "{}/{}/result",
            FACE_AUTH_PATH,
            urlencoding::encode(device_session_id)
        );

        let response = self
            .api
            .get_with_auth(&path, token.secret())
            .await
            .map_err(IdvError::ResultFetch)?;
        let result: FaceAuthResult = read_json(response).await.map_err(IdvError::ResultFetch)?;

        tracing::info!(
            status = %result.status,
            recommendation = %result.recommendation,
            "Face-auth result fetched"
        );
        Ok(result)
    }
}
