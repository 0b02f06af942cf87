//! Event-to-transition mapping for one capture attempt.
//!
//! The machine only moves on inbound [`StatusEvent`]s. A recapture decision
//! does not move it by itself: it arms the `RequiresRecapture -> Capturing`
//! edge, which the next `StartCapturing` event then takes.

use super::event::{CaptureErrorCode, RecaptureReason, StatusEvent};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Idle,
    Capturing,
    Processing,
    Completed,
    Canceled,
    Failed,
    RequiresRecapture,
}

impl VerificationState {
    /// Terminal for the current attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationState::Completed | VerificationState::Canceled | VerificationState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::Idle => "idle",
            VerificationState::Capturing => "capturing",
            VerificationState::Processing => "processing",
            VerificationState::Completed => "completed",
            VerificationState::Canceled => "canceled",
            VerificationState::Failed => "failed",
            VerificationState::RequiresRecapture => "requires_recapture",
        }
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error the presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfacedError {
    Capture(CaptureErrorCode),
    Recapture(RecaptureReason),
}

/// Why an event produced no transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// The attempt already ended in this state.
    AlreadyTerminal(VerificationState),
    /// Waiting for the caller to decide whether to recapture.
    AwaitingRecaptureDecision,
}

/// What the orchestrator should do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    FetchResult,
    SurfaceError(SurfacedError),
    UpdateStatus,
    Ignore(Ignored),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: VerificationState,
    pub to: VerificationState,
    pub effect: SideEffect,
}

#[derive(Debug, Clone)]
pub struct VerificationStatusMachine {
    state: VerificationState,
    recapture_requested: bool,
}

impl Default for VerificationStatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationStatusMachine {
    pub fn new() -> Self {
        Self {
            state: VerificationState::Idle,
            recapture_requested: false,
        }
    }

    pub fn state(&self) -> VerificationState {
        self.state
    }

    pub fn recapture_requested(&self) -> bool {
        self.recapture_requested
    }

    /// Back to `Idle` for a new attempt.
    pub fn reset(&mut self) {
        self.state = VerificationState::Idle;
        self.recapture_requested = false;
    }

    /// Record the caller's decision to recapture. Only valid while in
    /// `RequiresRecapture`; returns whether the decision was accepted.
    pub fn request_recapture(&mut self) -> bool {
        if self.state != VerificationState::RequiresRecapture {
            return false;
        }
        self.recapture_requested = true;
        true
    }

    /// Take back a recapture decision the capture subsystem could not act on.
    pub fn withdraw_recapture(&mut self) {
        self.recapture_requested = false;
    }

    pub fn on_event(&mut self, event: &StatusEvent) -> Transition {
        let from = self.state;

        if from.is_terminal() {
            return self.stay(SideEffect::Ignore(Ignored::AlreadyTerminal(from)));
        }

        if from == VerificationState::RequiresRecapture {
            return self.on_event_awaiting_recapture(event);
        }

        match event {
            StatusEvent::StartCapturing => {
                self.move_to(VerificationState::Capturing, SideEffect::UpdateStatus)
            }
            StatusEvent::StartProcessing => {
                self.move_to(VerificationState::Processing, SideEffect::UpdateStatus)
            }
            StatusEvent::Completed => {
                self.move_to(VerificationState::Completed, SideEffect::FetchResult)
            }
            StatusEvent::Canceled => {
                self.move_to(VerificationState::Canceled, SideEffect::UpdateStatus)
            }
            StatusEvent::Failed(code) => self.move_to(
                VerificationState::Failed,
                SideEffect::SurfaceError(SurfacedError::Capture(code.clone())),
            ),
            StatusEvent::RequiresRecapture(reason) => {
                self.recapture_requested = false;
                self.move_to(
                    VerificationState::RequiresRecapture,
                    SideEffect::SurfaceError(SurfacedError::Recapture(reason.clone())),
                )
            }
        }
    }

    fn on_event_awaiting_recapture(&mut self, event: &StatusEvent) -> Transition {
        match event {
            StatusEvent::StartCapturing if self.recapture_requested => {
                self.recapture_requested = false;
                self.move_to(VerificationState::Capturing, SideEffect::UpdateStatus)
            }
            StatusEvent::Canceled => {
                self.move_to(VerificationState::Canceled, SideEffect::UpdateStatus)
            }
            StatusEvent::Failed(code) => self.move_to(
                VerificationState::Failed,
                SideEffect::SurfaceError(SurfacedError::Capture(code.clone())),
            ),
            StatusEvent::RequiresRecapture(reason) => {
                self.recapture_requested = false;
                self.stay(SideEffect::SurfaceError(SurfacedError::Recapture(
                    reason.clone(),
                )))
            }
            StatusEvent::StartCapturing | StatusEvent::StartProcessing | StatusEvent::Completed => {
                self.stay(SideEffect::Ignore(Ignored::AwaitingRecaptureDecision))
            }
        }
    }

    fn move_to(&mut self, to: VerificationState, effect: SideEffect) -> Transition {
        let from = self.state;
        self.state = to;
        Transition { from, to, effect }
    }

    fn stay(&self, effect: SideEffect) -> Transition {
        Transition {
            from: self.state,
            to: self.state,
            effect,
        }
    }
}
