//! Test helpers for idv-orchestrator integration tests.
//!
//! In-memory fakes for the token, session, image and capture collaborators,
//! plus wiremock stubs for the HTTP-backed implementations.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use idv_core::reqwest::StatusCode;
use idv_core::{ApiClient, ApiError};
use idv_orchestrator::capture::{CaptureError, CaptureSubsystem};
use idv_orchestrator::config::Settings;
use idv_orchestrator::error::IdvError;
use idv_orchestrator::models::{
    AccessToken, EncodedImage, FaceAuthResult, FaceAuthSession, Recommendation,
    VerificationResult, VerificationSession,
};
use idv_orchestrator::services::{AccessTokenSource, ReferenceImageSource, SessionApi};
use idv_orchestrator::SessionOrchestrator;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Issues `token-1`, `token-2`, ... with a fixed lifetime.
pub struct FakeTokens {
    issued: AtomicUsize,
    waiting: AtomicUsize,
    lifetime_secs: i64,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
}

impl FakeTokens {
    pub fn new() -> Self {
        Self::with_lifetime(3600)
    }

    /// A lifetime of zero yields tokens that are already expired.
    pub fn with_lifetime(lifetime_secs: i64) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            lifetime_secs,
            fail: false,
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            issued: AtomicUsize::new(0),
            waiting: AtomicUsize::new(0),
            lifetime_secs: 3600,
            fail: true,
            gate: None,
        }
    }

    /// Each request holds until the gate hands out a permit, in arrival order.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }

    /// Requests currently held at the gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessTokenSource for FakeTokens {
    async fn get_access_token(&self) -> Result<AccessToken, IdvError> {
        if let Some(gate) = &self.gate {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            let permit = gate.acquire().await;
            self.waiting.fetch_sub(1, Ordering::SeqCst);
            permit
                .map_err(|_| IdvError::Auth(status_error(503)))?
                .forget();
        }
        if self.fail {
            return Err(IdvError::Auth(status_error(401)));
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::issued(
            format!("token-{}", n),
            Utc::now(),
            self.lifetime_secs,
        ))
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// One recorded call to the session API: operation, id argument, token value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCall {
    pub op: &'static str,
    pub id: String,
    pub token: String,
}

pub struct FakeSessions {
    calls: Mutex<Vec<SessionCall>>,
    verification: Mutex<VecDeque<Result<VerificationSession, IdvError>>>,
    face_auth: Mutex<VecDeque<Result<FaceAuthSession, IdvError>>>,
    failing_fetches: AtomicUsize,
    fetch_delay: Duration,
}

impl FakeSessions {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            verification: Mutex::new(VecDeque::new()),
            face_auth: Mutex::new(VecDeque::new()),
            failing_fetches: AtomicUsize::new(0),
            fetch_delay: Duration::ZERO,
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn push_verification(&self, session: Result<VerificationSession, IdvError>) {
        self.verification.lock().unwrap().push_back(session);
    }

    pub fn push_face_auth(&self, session: Result<FaceAuthSession, IdvError>) {
        self.face_auth.lock().unwrap().push_back(session);
    }

    /// The next `n` result fetches fail with a 503.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<SessionCall> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    fn record(&self, op: &'static str, id: &str, token: &AccessToken) {
        self.calls.lock().unwrap().push(SessionCall {
            op,
            id: id.to_string(),
            token: token.secret().to_string(),
        });
    }

    async fn fetch_gate(&self) -> Result<(), IdvError> {
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let remaining = self.failing_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_fetches.store(remaining - 1, Ordering::SeqCst);
            return Err(IdvError::ResultFetch(status_error(503)));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionApi for FakeSessions {
    async fn create_verification_session(
        &self,
        token: &AccessToken,
    ) -> Result<VerificationSession, IdvError> {
        self.record("create_verification_session", "", token);
        self.verification
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(verification_session("T1", "S1")))
    }

    async fn get_verification_result(
        &self,
        session_id: &str,
        token: &AccessToken,
    ) -> Result<VerificationResult, IdvError> {
        self.record("get_verification_result", session_id, token);
        self.fetch_gate().await?;
        Ok(verification_result(session_id))
    }

    async fn create_face_auth_session(
        &self,
        token: &AccessToken,
        reference: &EncodedImage,
    ) -> Result<FaceAuthSession, IdvError> {
        self.record("create_face_auth_session", &reference.image_id, token);
        self.face_auth
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(face_auth_session("D1", "FS1")))
    }

    async fn get_face_auth_result(
        &self,
        device_session_id: &str,
        token: &AccessToken,
    ) -> Result<FaceAuthResult, IdvError> {
        self.record("get_face_auth_result", device_session_id, token);
        self.fetch_gate().await?;
        Ok(FaceAuthResult {
            status: "complete".to_string(),
            recommendation: "ALLOW".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

pub struct FakeImages {
    requested: Mutex<Vec<String>>,
    has_selfie: bool,
}

impl FakeImages {
    pub fn new() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
            has_selfie: true,
        }
    }

    pub fn without_selfie() -> Self {
        Self {
            requested: Mutex::new(Vec::new()),
            has_selfie: false,
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceImageSource for FakeImages {
    async fn resolve_reference_image(
        &self,
        session_id: &str,
        _token: &AccessToken,
    ) -> Result<EncodedImage, IdvError> {
        self.requested.lock().unwrap().push(session_id.to_string());
        if !self.has_selfie {
            return Err(IdvError::ReferenceImageNotFound {
                session_id: session_id.to_string(),
            });
        }
        Ok(EncodedImage {
            image_id: "IMG2".to_string(),
            data_uri: "data:image/jpeg;base64,AQID".to_string(),
            format: "jpg".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCommand {
    Initialize { client_id: String, base_url: String },
    Begin(String),
    BeginMosaic(String),
    BeginFaceAuth(String),
    RequestRecapture,
}

#[derive(Default)]
pub struct RecordingCapture {
    commands: Mutex<Vec<CaptureCommand>>,
    refuse_begin: bool,
    refuse_recapture: bool,
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every begin command fails as if no foreground host were available.
    pub fn without_host() -> Self {
        Self {
            refuse_begin: true,
            ..Self::default()
        }
    }

    /// Recapture commands fail; begin commands still succeed.
    pub fn refusing_recapture() -> Self {
        Self {
            refuse_recapture: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<CaptureCommand> {
        self.commands.lock().unwrap().clone()
    }

    fn record(&self, command: CaptureCommand) -> Result<(), CaptureError> {
        let refuse = match command {
            CaptureCommand::Begin(_)
            | CaptureCommand::BeginMosaic(_)
            | CaptureCommand::BeginFaceAuth(_) => self.refuse_begin,
            CaptureCommand::RequestRecapture => self.refuse_recapture,
            _ => false,
        };
        self.commands.lock().unwrap().push(command);
        if refuse {
            return Err(CaptureError::HostUnavailable("no activity".to_string()));
        }
        Ok(())
    }
}

impl CaptureSubsystem for RecordingCapture {
    fn initialize(&self, client_id: &str, base_url: &str) -> Result<(), CaptureError> {
        self.record(CaptureCommand::Initialize {
            client_id: client_id.to_string(),
            base_url: base_url.to_string(),
        })
    }

    fn begin(&self, start_token: &str) -> Result<(), CaptureError> {
        self.record(CaptureCommand::Begin(start_token.to_string()))
    }

    fn begin_mosaic(&self, start_token: &str) -> Result<(), CaptureError> {
        self.record(CaptureCommand::BeginMosaic(start_token.to_string()))
    }

    fn begin_face_auth(&self, device_session_id: &str) -> Result<(), CaptureError> {
        self.record(CaptureCommand::BeginFaceAuth(device_session_id.to_string()))
    }

    fn request_recapture(&self) -> Result<(), CaptureError> {
        self.record(CaptureCommand::RequestRecapture)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// An orchestrator wired to fakes, with handles kept for assertions.
pub struct Harness {
    pub orchestrator: SessionOrchestrator,
    pub tokens: Arc<FakeTokens>,
    pub sessions: Arc<FakeSessions>,
    pub images: Arc<FakeImages>,
    pub capture: Arc<RecordingCapture>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(FakeTokens::new(), FakeSessions::new(), FakeImages::new(), RecordingCapture::new())
    }

    pub fn with(
        tokens: FakeTokens,
        sessions: FakeSessions,
        images: FakeImages,
        capture: RecordingCapture,
    ) -> Self {
        let tokens = Arc::new(tokens);
        let sessions = Arc::new(sessions);
        let images = Arc::new(images);
        let capture = Arc::new(capture);

        let orchestrator = SessionOrchestrator::new(
            tokens.clone(),
            sessions.clone(),
            images.clone(),
            capture.clone(),
        );

        Self {
            orchestrator,
            tokens,
            sessions,
            images,
            capture,
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn status_error(code: u16) -> ApiError {
    ApiError::Status {
        status: StatusCode::from_u16(code).unwrap(),
        body: String::new(),
    }
}

pub fn verification_session(start_token: &str, session_id: &str) -> VerificationSession {
    VerificationSession {
        start_token: start_token.to_string(),
        session_id: session_id.to_string(),
        expiration: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        missing_images: vec![],
    }
}

pub fn face_auth_session(device_session_id: &str, session_id: &str) -> FaceAuthSession {
    FaceAuthSession {
        device_session_id: device_session_id.to_string(),
        session_id: session_id.to_string(),
    }
}

pub fn verification_result(session_id: &str) -> VerificationResult {
    VerificationResult {
        session_id: session_id.to_string(),
        status: "complete".to_string(),
        recommendation: Recommendation::Allow,
        verified_info: json!({ "document_type": "passport" }),
    }
}

pub fn settings_for(base_url: &str) -> Settings {
    let yaml = format!(
        r#"
api:
  base_url: "{}"
  client_id: "{}"
  client_secret: "{}"
  request_timeout_secs: 5
face_auth:
  use_case: "authentication"
events:
  queue_size: 16
"#,
        base_url, CLIENT_ID, CLIENT_SECRET
    );
    Settings::from_yaml(&yaml).expect("Failed to parse test settings")
}

pub fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).expect("Failed to build API client")
}

// ---------------------------------------------------------------------------
// Wiremock stubs
// ---------------------------------------------------------------------------

pub async fn mount_token(server: &MockServer, access_token: &str, expires_in: i64) {
    Mock::given(method("POST"))
        .and(path("/oidc/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "expires_in": expires_in,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

pub async fn mount_verification_session(server: &MockServer, start_token: &str, session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/verify/api/v1/verification"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "start_token": start_token,
            "session_id": session_id,
            "expiration": "2030-01-01T00:00:00Z",
            "missing_images": []
        })))
        .mount(server)
        .await;
}

pub async fn mount_verification_result(server: &MockServer, session_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/verify/api/v1/verification/{}/result", session_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": session_id,
            "status": "complete",
            "recommendation": "ALLOW",
            "verified_info": { "document_type": "passport" }
        })))
        .mount(server)
        .await;
}

/// Image list with a passport (`IMG1`) and a selfie (`IMG2`), plus the
/// selfie content as PNG bytes.
pub async fn mount_selfie_images(server: &MockServer, session_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/verify/api/v1/verification/{}/images", session_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [
                { "image_id": "IMG1", "type": "passport" },
                { "image_id": "IMG2", "type": "selfie" }
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/verify/api/v1/images/IMG2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50, 0x4e, 0x47], "image/png"))
        .mount(server)
        .await;
}

pub async fn mount_face_auth_session(server: &MockServer, device_session_id: &str) {
    Mock::given(method("POST"))
        .and(path("/verify/api/v1/face-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_session_id": device_session_id,
            "session_id": "FS1"
        })))
        .mount(server)
        .await;
}

pub async fn mount_face_auth_result(server: &MockServer, device_session_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/verify/api/v1/face-auth/{}/result", device_session_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "complete",
            "recommendation": "ALLOW"
        })))
        .mount(server)
        .await;
}
