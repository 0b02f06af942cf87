//! Sequencing of the verification and face-authentication flows.
//!
//! One orchestrator drives at most one attempt at a time. The attempt slot is
//! guarded by a mutex that is never held across a network call; every result
//! that comes back is checked against the attempt that asked for it.

use crate::capture::{CaptureEvent, CaptureSubsystem, CaptureUi};
use crate::error::IdvError;
use crate::models::{
    AccessToken, FaceAuthResult, FaceAuthSession, FlowKind, VerificationResult,
    VerificationSession,
};
use crate::services::metrics::{record_flow_started, record_result_fetch, record_status_event};
use crate::services::{AccessTokenSource, ReferenceImageSource, SessionApi};
use crate::status::{
    CaptureErrorCode, Ignored, RecaptureReason, SideEffect, SurfacedError, VerificationState,
    VerificationStatusMachine,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

/// The session an attempt is bound to.
#[derive(Debug, Clone)]
enum AttemptFlow {
    Verification(VerificationSession),
    FaceAuth(FaceAuthSession),
}

impl AttemptFlow {
    fn kind(&self) -> FlowKind {
        match self {
            AttemptFlow::Verification(_) => FlowKind::Verification,
            AttemptFlow::FaceAuth(_) => FlowKind::FaceAuth,
        }
    }

    fn fetch_target(&self) -> FetchTarget {
        match self {
            AttemptFlow::Verification(session) => FetchTarget::Verification {
                session_id: session.session_id.clone(),
            },
            AttemptFlow::FaceAuth(session) => FetchTarget::FaceAuth {
                device_session_id: session.device_session_id.clone(),
            },
        }
    }
}

#[derive(Debug)]
struct ActiveAttempt {
    id: Uuid,
    flow: AttemptFlow,
    machine: VerificationStatusMachine,
    token: AccessToken,
    fetch_in_flight: bool,
}

#[derive(Debug, Default)]
enum AttemptSlot {
    #[default]
    Vacant,
    /// Reserved by a start operation that is still talking to the API.
    Starting(Uuid),
    Active(ActiveAttempt),
}

impl AttemptSlot {
    fn active(&self) -> Option<&ActiveAttempt> {
        match self {
            AttemptSlot::Active(attempt) => Some(attempt),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Option<&mut ActiveAttempt> {
        match self {
            AttemptSlot::Active(attempt) => Some(attempt),
            _ => None,
        }
    }

    fn is_attempt(&self, id: Uuid) -> bool {
        self.active().map(|a| a.id == id).unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchTarget {
    Verification { session_id: String },
    FaceAuth { device_session_id: String },
}

impl FetchTarget {
    fn flow(&self) -> FlowKind {
        match self {
            FetchTarget::Verification { .. } => FlowKind::Verification,
            FetchTarget::FaceAuth { .. } => FlowKind::FaceAuth,
        }
    }
}

/// Why a status event or a fetch result was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoActiveAttempt,
    /// The event belongs to the other flow kind.
    FlowMismatch { active: FlowKind, reported: FlowKind },
    Machine(Ignored),
    /// The attempt that requested the fetch is gone.
    StaleResult,
}

/// Structured result of feeding one status event through the orchestrator.
#[derive(Debug)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    StatusChanged {
        flow: FlowKind,
        state: VerificationState,
    },
    Canceled {
        flow: FlowKind,
    },
    Failed {
        flow: FlowKind,
        code: CaptureErrorCode,
    },
    RecaptureRequired {
        reason: RecaptureReason,
    },
    VerificationCompleted {
        session_id: String,
        result: VerificationResult,
    },
    FaceAuthCompleted {
        device_session_id: String,
        result: FaceAuthResult,
    },
    /// The session stays retained; see [`SessionOrchestrator::retry_result_fetch`].
    ResultFetchFailed {
        flow: FlowKind,
        error: IdvError,
    },
}

/// Either a settled outcome or a result fetch still to be performed.
pub enum Dispatch {
    Settled(EventOutcome),
    FetchPending(PendingFetch),
}

/// A result fetch detached from the orchestrator lock. Safe to run on
/// another task: the outcome is discarded if its attempt is gone.
pub struct PendingFetch {
    attempt_id: Uuid,
    target: FetchTarget,
    token: AccessToken,
    tokens: Arc<dyn AccessTokenSource>,
    sessions: Arc<dyn SessionApi>,
    slot: Arc<Mutex<AttemptSlot>>,
}

impl PendingFetch {
    pub fn flow(&self) -> FlowKind {
        self.target.flow()
    }

    #[instrument(name = "result_fetch", skip(self), fields(attempt_id = %self.attempt_id, flow = %self.target.flow()))]
    pub async fn run(self) -> EventOutcome {
        let flow = self.target.flow();

        let (token, refreshed) = if self.token.is_expired() {
            tracing::info!("Access token expired, requesting a fresh one");
            match self.tokens.get_access_token().await {
                Ok(token) => (token, true),
                Err(error) => return self.settle_failure(error, None).await,
            }
        } else {
            (self.token.clone(), false)
        };

        let fetched = match &self.target {
            FetchTarget::Verification { session_id } => self
                .sessions
                .get_verification_result(session_id, &token)
                .await
                .map(|result| EventOutcome::VerificationCompleted {
                    session_id: session_id.clone(),
                    result,
                }),
            FetchTarget::FaceAuth { device_session_id } => self
                .sessions
                .get_face_auth_result(device_session_id, &token)
                .await
                .map(|result| EventOutcome::FaceAuthCompleted {
                    device_session_id: device_session_id.clone(),
                    result,
                }),
        };

        match fetched {
            Ok(outcome) => {
                let mut slot = self.slot.lock().await;
                if !slot.is_attempt(self.attempt_id) {
                    tracing::info!("Discarding result for an attempt that is no longer active");
                    return EventOutcome::Ignored(IgnoreReason::StaleResult);
                }
                *slot = AttemptSlot::Vacant;
                record_result_fetch(flow.as_str(), "success");
                tracing::info!("Attempt finished, session released");
                outcome
            }
            Err(error) => {
                let replacement = if refreshed { Some(token) } else { None };
                self.settle_failure(error, replacement).await
            }
        }
    }

    async fn settle_failure(&self, error: IdvError, token: Option<AccessToken>) -> EventOutcome {
        let flow = self.target.flow();
        let mut slot = self.slot.lock().await;

        let Some(attempt) = slot
            .active_mut()
            .filter(|attempt| attempt.id == self.attempt_id)
        else {
            tracing::info!(error = %error, "Discarding failed fetch for an attempt that is no longer active");
            return EventOutcome::Ignored(IgnoreReason::StaleResult);
        };

        attempt.fetch_in_flight = false;
        if let Some(token) = token {
            attempt.token = token;
        }
        record_result_fetch(flow.as_str(), "failure");
        tracing::warn!(error = %error, kind = error.kind(), "Result fetch failed, session kept for retry");

        EventOutcome::ResultFetchFailed { flow, error }
    }
}

pub struct SessionOrchestrator {
    tokens: Arc<dyn AccessTokenSource>,
    sessions: Arc<dyn SessionApi>,
    images: Arc<dyn ReferenceImageSource>,
    capture: Arc<dyn CaptureSubsystem>,
    slot: Arc<Mutex<AttemptSlot>>,
}

impl SessionOrchestrator {
    pub fn new(
        tokens: Arc<dyn AccessTokenSource>,
        sessions: Arc<dyn SessionApi>,
        images: Arc<dyn ReferenceImageSource>,
        capture: Arc<dyn CaptureSubsystem>,
    ) -> Self {
        Self {
            tokens,
            sessions,
            images,
            capture,
            slot: Arc::new(Mutex::new(AttemptSlot::Vacant)),
        }
    }

    /// Start a verification with the native capture UI.
    pub async fn start_identity_verification(&self) -> Result<(), IdvError> {
        self.start_identity_verification_with(CaptureUi::Native).await
    }

    /// Acquire a token, open a verification session and hand its start token
    /// to the capture subsystem. Completion arrives later as status events.
    #[instrument(skip(self))]
    pub async fn start_identity_verification_with(&self, ui: CaptureUi) -> Result<(), IdvError> {
        let attempt_id = self.reserve().await?;

        let started = async {
            let token = self.tokens.get_access_token().await?;
            let session = self.sessions.create_verification_session(&token).await?;
            Ok::<_, IdvError>((token, session))
        }
        .await;

        let (token, session) = match started {
            Ok(started) => started,
            Err(e) => {
                self.release_reservation(attempt_id).await;
                tracing::error!(error = %e, kind = e.kind(), "Verification could not start");
                return Err(e);
            }
        };

        let start_token = session.start_token.clone();
        self.activate(attempt_id, AttemptFlow::Verification(session), token, |capture| match ui {
            CaptureUi::Native => capture.begin(&start_token),
            CaptureUi::Mosaic => capture.begin_mosaic(&start_token),
        })
        .await
    }

    /// Authenticate a face against the selfie of a completed verification.
    #[instrument(skip(self))]
    pub async fn start_face_authentication(
        &self,
        prior_verification_session_id: Option<&str>,
    ) -> Result<(), IdvError> {
        let prior = match prior_verification_session_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => {
                tracing::warn!("Face authentication requested without a completed verification");
                return Err(IdvError::Precondition(
                    "face authentication requires a completed identity verification".to_string(),
                ));
            }
        };

        let attempt_id = self.reserve().await?;

        let started = async {
            let token = self.tokens.get_access_token().await?;
            let reference = self.images.resolve_reference_image(prior, &token).await?;
            let session = self
                .sessions
                .create_face_auth_session(&token, &reference)
                .await?;
            Ok::<_, IdvError>((token, session))
        }
        .await;

        let (token, session) = match started {
            Ok(started) => started,
            Err(e) => {
                self.release_reservation(attempt_id).await;
                tracing::error!(error = %e, kind = e.kind(), "Face authentication could not start");
                return Err(e);
            }
        };

        let device_session_id = session.device_session_id.clone();
        self.activate(attempt_id, AttemptFlow::FaceAuth(session), token, |capture| {
            capture.begin_face_auth(&device_session_id)
        })
        .await
    }

    /// The caller chose to recapture after a `RequiresRecapture` event.
    /// Returns whether the capture subsystem was told to restart.
    pub async fn on_recapture_requested(&self) -> bool {
        let mut slot = self.slot.lock().await;

        let Some(attempt) = slot.active_mut() else {
            tracing::info!("Recapture requested with no active attempt, ignoring");
            return false;
        };

        if !attempt.machine.request_recapture() {
            tracing::info!(
                attempt_id = %attempt.id,
                state = %attempt.machine.state(),
                "Recapture requested outside of RequiresRecapture, ignoring"
            );
            return false;
        }

        match self.capture.request_recapture() {
            Ok(()) => {
                tracing::info!(attempt_id = %attempt.id, "Recapture requested");
                true
            }
            Err(e) => {
                attempt.machine.withdraw_recapture();
                tracing::error!(attempt_id = %attempt.id, error = %e, "Capture subsystem refused recapture");
                false
            }
        }
    }

    /// Feed one status event and, on completion, fetch the result inline.
    pub async fn on_status_event(&self, event: CaptureEvent) -> EventOutcome {
        match self.dispatch(event).await {
            Dispatch::Settled(outcome) => outcome,
            Dispatch::FetchPending(fetch) => fetch.run().await,
        }
    }

    /// Apply one status event to the active attempt. A completion yields a
    /// [`PendingFetch`] the caller runs when it sees fit.
    pub async fn dispatch(&self, event: CaptureEvent) -> Dispatch {
        record_status_event(event.event.name());
        let mut slot = self.slot.lock().await;

        let Some(attempt) = slot.active_mut() else {
            tracing::debug!(event = event.event.name(), "Status event with no active attempt");
            return Dispatch::Settled(EventOutcome::Ignored(IgnoreReason::NoActiveAttempt));
        };

        let active = attempt.flow.kind();
        if let Some(reported) = event.flow {
            if reported != active {
                tracing::debug!(
                    attempt_id = %attempt.id,
                    active = %active,
                    reported = %reported,
                    "Status event for another flow kind"
                );
                return Dispatch::Settled(EventOutcome::Ignored(IgnoreReason::FlowMismatch {
                    active,
                    reported,
                }));
            }
        }

        let transition = attempt.machine.on_event(&event.event);
        tracing::info!(
            attempt_id = %attempt.id,
            flow = %active,
            event = event.event.name(),
            from = %transition.from,
            state = %transition.to,
            "Status event applied"
        );

        let outcome = match transition.effect {
            SideEffect::Ignore(reason) => EventOutcome::Ignored(IgnoreReason::Machine(reason)),
            SideEffect::UpdateStatus if transition.to == VerificationState::Canceled => {
                *slot = AttemptSlot::Vacant;
                tracing::info!("Attempt canceled, session released");
                EventOutcome::Canceled { flow: active }
            }
            SideEffect::UpdateStatus => EventOutcome::StatusChanged {
                flow: active,
                state: transition.to,
            },
            SideEffect::SurfaceError(SurfacedError::Capture(code)) => {
                *slot = AttemptSlot::Vacant;
                tracing::warn!(code = %code, "Attempt failed, session released");
                EventOutcome::Failed { flow: active, code }
            }
            SideEffect::SurfaceError(SurfacedError::Recapture(reason)) => {
                tracing::info!(reason = %reason, "Capture needs to be repeated");
                EventOutcome::RecaptureRequired { reason }
            }
            SideEffect::FetchResult => {
                attempt.fetch_in_flight = true;
                return Dispatch::FetchPending(self.pending_fetch(attempt));
            }
        };

        Dispatch::Settled(outcome)
    }

    /// Fetch results again for a completed attempt whose last fetch failed.
    pub async fn retry_result_fetch(&self) -> Result<EventOutcome, IdvError> {
        let fetch = {
            let mut slot = self.slot.lock().await;
            let attempt = slot
                .active_mut()
                .filter(|attempt| attempt.machine.state() == VerificationState::Completed)
                .ok_or_else(|| {
                    IdvError::Precondition("no completed attempt awaiting results".to_string())
                })?;

            if attempt.fetch_in_flight {
                return Err(IdvError::Precondition(
                    "a result fetch is already in flight".to_string(),
                ));
            }

            attempt.fetch_in_flight = true;
            tracing::info!(attempt_id = %attempt.id, "Retrying result fetch");
            self.pending_fetch(attempt)
        };

        Ok(fetch.run().await)
    }

    /// Drop the active attempt, if any. Results that arrive later are stale.
    pub async fn abandon(&self) -> bool {
        let mut slot = self.slot.lock().await;
        match std::mem::take(&mut *slot) {
            AttemptSlot::Vacant => false,
            AttemptSlot::Starting(attempt_id) => {
                tracing::info!(attempt_id = %attempt_id, "Abandoning an attempt that is still starting");
                true
            }
            AttemptSlot::Active(attempt) => {
                tracing::info!(attempt_id = %attempt.id, flow = %attempt.flow.kind(), "Attempt abandoned");
                true
            }
        }
    }

    pub async fn active_flow(&self) -> Option<FlowKind> {
        self.slot.lock().await.active().map(|a| a.flow.kind())
    }

    pub async fn current_state(&self) -> Option<VerificationState> {
        self.slot.lock().await.active().map(|a| a.machine.state())
    }

    pub async fn retained_verification_session(&self) -> Option<VerificationSession> {
        match self.slot.lock().await.active().map(|a| &a.flow) {
            Some(AttemptFlow::Verification(session)) => Some(session.clone()),
            _ => None,
        }
    }

    pub async fn retained_face_auth_session(&self) -> Option<FaceAuthSession> {
        match self.slot.lock().await.active().map(|a| &a.flow) {
            Some(AttemptFlow::FaceAuth(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Claim the slot for a new attempt and return its id.
    async fn reserve(&self) -> Result<Uuid, IdvError> {
        let mut slot = self.slot.lock().await;
        match *slot {
            AttemptSlot::Vacant => {
                let attempt_id = Uuid::new_v4();
                *slot = AttemptSlot::Starting(attempt_id);
                Ok(attempt_id)
            }
            _ => {
                tracing::warn!("Attempt requested while another is active");
                Err(IdvError::ConcurrentAttempt)
            }
        }
    }

    async fn release_reservation(&self, attempt_id: Uuid) {
        let mut slot = self.slot.lock().await;
        if matches!(*slot, AttemptSlot::Starting(id) if id == attempt_id) {
            *slot = AttemptSlot::Vacant;
        }
    }

    /// Retain the new session and hand it to the capture subsystem. Only the
    /// start that holds the reservation may activate it.
    async fn activate<F>(
        &self,
        attempt_id: Uuid,
        flow: AttemptFlow,
        token: AccessToken,
        begin: F,
    ) -> Result<(), IdvError>
    where
        F: FnOnce(&dyn CaptureSubsystem) -> Result<(), crate::capture::CaptureError>,
    {
        let mut slot = self.slot.lock().await;
        if !matches!(*slot, AttemptSlot::Starting(id) if id == attempt_id) {
            tracing::warn!(attempt_id = %attempt_id, "Attempt was abandoned before its session was ready");
            return Err(IdvError::Precondition(
                "attempt abandoned while starting".to_string(),
            ));
        }

        let kind = flow.kind();
        let attempt = ActiveAttempt {
            id: attempt_id,
            flow,
            machine: VerificationStatusMachine::new(),
            token,
            fetch_in_flight: false,
        };
        *slot = AttemptSlot::Active(attempt);

        if let Err(e) = begin(self.capture.as_ref()) {
            *slot = AttemptSlot::Vacant;
            tracing::error!(attempt_id = %attempt_id, flow = %kind, error = %e, "Capture could not begin");
            return Err(IdvError::Capture(e));
        }

        record_flow_started(kind.as_str());
        tracing::info!(attempt_id = %attempt_id, flow = %kind, "Capture started");
        Ok(())
    }

    fn pending_fetch(&self, attempt: &ActiveAttempt) -> PendingFetch {
        PendingFetch {
            attempt_id: attempt.id,
            target: attempt.flow.fetch_target(),
            token: attempt.token.clone(),
            tokens: Arc::clone(&self.tokens),
            sessions: Arc::clone(&self.sessions),
            slot: Arc::clone(&self.slot),
        }
    }
}
