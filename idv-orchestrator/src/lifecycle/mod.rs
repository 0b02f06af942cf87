//! Owns the orchestrator for the life of the host: drains the status-event
//! channel, remembers the last verified session and reports every outcome
//! to the presentation layer.

pub mod store;

use crate::capture::{CaptureEvent, CaptureUi};
use crate::error::IdvError;
use crate::models::{FaceAuthResult, FlowKind, VerificationResult};
use crate::orchestrator::{Dispatch, EventOutcome, SessionOrchestrator};
use crate::status::{CaptureErrorCode, RecaptureReason, VerificationState};
use std::sync::Arc;
use store::KeyValueStore;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const VERIFICATION_SESSION_KEY: &str = "verification_session_id";

/// What the presentation layer gets to see.
#[derive(Debug)]
pub enum FlowUpdate {
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
    /// Ask the user whether to capture again.
    RecapturePrompt {
        reason: RecaptureReason,
    },
    VerificationResult(VerificationResult),
    FaceAuthResult(FaceAuthResult),
    ResultFetchFailed {
        flow: FlowKind,
        error: IdvError,
    },
}

pub struct VerificationLifecycle {
    orchestrator: Arc<SessionOrchestrator>,
    store: Arc<dyn KeyValueStore>,
    updates: mpsc::UnboundedSender<FlowUpdate>,
}

impl VerificationLifecycle {
    pub fn new(
        orchestrator: Arc<SessionOrchestrator>,
        store: Arc<dyn KeyValueStore>,
    ) -> (Self, mpsc::UnboundedReceiver<FlowUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Self {
                orchestrator,
                store,
                updates,
            },
            rx,
        )
    }

    pub fn orchestrator(&self) -> &Arc<SessionOrchestrator> {
        &self.orchestrator
    }

    pub async fn start_identity_verification(&self, ui: CaptureUi) -> Result<(), IdvError> {
        self.orchestrator.start_identity_verification_with(ui).await
    }

    /// Face authentication against the last verified session, if any.
    pub async fn start_face_authentication(&self) -> Result<(), IdvError> {
        let prior = self.store.get_item(VERIFICATION_SESSION_KEY).await?;
        self.orchestrator
            .start_face_authentication(prior.as_deref())
            .await
    }

    pub async fn has_completed_verification(&self) -> Result<bool, IdvError> {
        let prior = self.store.get_item(VERIFICATION_SESSION_KEY).await?;
        Ok(prior.map(|id| !id.trim().is_empty()).unwrap_or(false))
    }

    pub async fn forget_verification(&self) -> Result<(), IdvError> {
        self.store.remove_item(VERIFICATION_SESSION_KEY).await?;
        tracing::info!("Stored verification session cleared");
        Ok(())
    }

    /// Retry a failed result fetch and report the outcome.
    pub async fn retry_result_fetch(&self) -> Result<(), IdvError> {
        let outcome = self.orchestrator.retry_result_fetch().await?;
        self.handle_outcome(outcome).await;
        Ok(())
    }

    /// Drain status events in arrival order until the channel closes or
    /// `shutdown` fires. Result fetches run alongside so later events (a
    /// cancel, say) are not held up behind the network.
    pub async fn run(&self, mut events: mpsc::Receiver<CaptureEvent>, shutdown: CancellationToken) {
        let mut fetches: JoinSet<EventOutcome> = JoinSet::new();
        tracing::info!("Status event loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(pending_fetches = fetches.len(), "Status event loop cancelled");
                    fetches.abort_all();
                    self.orchestrator.abandon().await;
                    return;
                }
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                    self.on_fetch_joined(joined).await;
                }
                received = events.recv() => match received {
                    Some(event) => match self.orchestrator.dispatch(event).await {
                        Dispatch::Settled(outcome) => self.handle_outcome(outcome).await,
                        Dispatch::FetchPending(fetch) => {
                            fetches.spawn(fetch.run());
                        }
                    },
                    None => break,
                },
            }
        }

        while let Some(joined) = fetches.join_next().await {
            self.on_fetch_joined(joined).await;
        }
        tracing::info!("Status event channel closed");
    }

    async fn on_fetch_joined(&self, joined: Result<EventOutcome, tokio::task::JoinError>) {
        match joined {
            Ok(outcome) => self.handle_outcome(outcome).await,
            Err(e) => tracing::error!(error = %e, "Result fetch task did not finish"),
        }
    }

    async fn handle_outcome(&self, outcome: EventOutcome) {
        let update = match outcome {
            EventOutcome::Ignored(reason) => {
                tracing::debug!(reason = ?reason, "Status event ignored");
                return;
            }
            EventOutcome::StatusChanged { flow, state } => FlowUpdate::StatusChanged { flow, state },
            EventOutcome::Canceled { flow } => FlowUpdate::Canceled { flow },
            EventOutcome::Failed { flow, code } => FlowUpdate::Failed { flow, code },
            EventOutcome::RecaptureRequired { reason } => FlowUpdate::RecapturePrompt { reason },
            EventOutcome::VerificationCompleted { session_id, result } => {
                if let Err(e) = self.store.set_item(VERIFICATION_SESSION_KEY, &session_id).await {
                    tracing::error!(error = %e, "Failed to persist verification session id");
                }
                FlowUpdate::VerificationResult(result)
            }
            EventOutcome::FaceAuthCompleted { result, .. } => FlowUpdate::FaceAuthResult(result),
            EventOutcome::ResultFetchFailed { flow, error } => {
                FlowUpdate::ResultFetchFailed { flow, error }
            }
        };

        if self.updates.send(update).is_err() {
            tracing::debug!("Presentation layer dropped its update receiver");
        }
    }
}
