use std::fmt;

/// Error code reported by the capture subsystem. Opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaptureErrorCode(String);

/// Why the capture subsystem wants the user to capture again. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecaptureReason(String);

impl CaptureErrorCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl RecaptureReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaptureErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RecaptureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status reported by the capture subsystem for the running attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    StartCapturing,
    StartProcessing,
    Completed,
    Canceled,
    Failed(CaptureErrorCode),
    RequiresRecapture(RecaptureReason),
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::StartCapturing => "start_capturing",
            StatusEvent::StartProcessing => "start_processing",
            StatusEvent::Completed => "completed",
            StatusEvent::Canceled => "canceled",
            StatusEvent::Failed(_) => "failed",
            StatusEvent::RequiresRecapture(_) => "requires_recapture",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusEvent::Completed | StatusEvent::Canceled | StatusEvent::Failed(_)
        )
    }
}
