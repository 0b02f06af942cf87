//! Interface to the external capture subsystem.
//!
//! Commands go out through [`CaptureSubsystem`]; status comes back through a
//! single ordered channel fed by an [`EventSink`].

pub mod wire;

use crate::models::FlowKind;
use crate::status::StatusEvent;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("No foreground host available to present capture: {0}")]
    HostUnavailable(String),

    #[error("Capture subsystem is not initialized")]
    NotInitialized,

    #[error("Capture subsystem rejected the command: {0}")]
    Rejected(String),
}

/// Which capture UI drives a verification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureUi {
    #[default]
    Native,
    /// Hosted capture experience bound to the same start token.
    Mosaic,
}

/// Fire-and-forget commands to the capture subsystem. Outcomes arrive later
/// as status events.
pub trait CaptureSubsystem: Send + Sync {
    fn initialize(&self, client_id: &str, base_url: &str) -> Result<(), CaptureError>;
    fn begin(&self, start_token: &str) -> Result<(), CaptureError>;
    fn begin_mosaic(&self, start_token: &str) -> Result<(), CaptureError>;
    fn begin_face_auth(&self, device_session_id: &str) -> Result<(), CaptureError>;
    fn request_recapture(&self) -> Result<(), CaptureError>;
}

/// A status event plus the flow that reported it, when the producer knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub flow: Option<FlowKind>,
    pub event: StatusEvent,
}

impl CaptureEvent {
    pub fn new(event: StatusEvent) -> Self {
        Self { flow: None, event }
    }

    pub fn from_flow(flow: FlowKind, event: StatusEvent) -> Self {
        Self {
            flow: Some(flow),
            event,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("Unknown capture status: {0}")]
    UnknownStatus(String),

    #[error("Status event queue is full")]
    Full,

    #[error("Status event consumer has stopped")]
    Closed,
}

/// Producer end of the status-event channel, handed to the capture bridge.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<CaptureEvent>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CaptureEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn emit(&self, event: CaptureEvent) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }

    /// Decode a raw bridge payload and queue it, waiting for capacity.
    pub async fn emit_wire(&self, status: &str, additional: Option<&Value>) -> Result<(), SinkError> {
        let event = Self::decode(status, additional)?;
        self.emit(event).await
    }

    /// Non-blocking variant for callbacks that cannot await.
    pub fn try_emit_wire(&self, status: &str, additional: Option<&Value>) -> Result<(), SinkError> {
        let event = Self::decode(status, additional)?;
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                tracing::warn!(status = %status, "Status event queue full, dropping event");
                SinkError::Full
            }
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn decode(status: &str, additional: Option<&Value>) -> Result<CaptureEvent, SinkError> {
        match wire::decode_status(status, additional) {
            Some((flow, event)) => Ok(CaptureEvent::from_flow(flow, event)),
            None => {
                tracing::warn!(status = %status, "Unhandled capture status");
                Err(SinkError::UnknownStatus(status.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (sink, mut rx) = EventSink::channel(8);

        sink.emit_wire("verificationDidStartCapturing", None).await.unwrap();
        sink.emit_wire("verificationDidStartProcessing", None).await.unwrap();
        sink.emit_wire("verificationDidComplete", None).await.unwrap();

        let received: Vec<StatusEvent> = vec![
            rx.recv().await.unwrap().event,
            rx.recv().await.unwrap().event,
            rx.recv().await.unwrap().event,
        ];
        assert_eq!(
            received,
            vec![
                StatusEvent::StartCapturing,
                StatusEvent::StartProcessing,
                StatusEvent::Completed
            ]
        );
    }

    #[tokio::test]
    async fn unknown_status_never_reaches_the_channel() {
        let (sink, mut rx) = EventSink::channel(8);

        let err = sink
            .emit_wire("somethingElse", Some(&json!({})))
            .await
            .unwrap_err();
        assert_eq!(err, SinkError::UnknownStatus("somethingElse".to_string()));

        drop(sink);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn try_emit_reports_full_queue() {
        let (sink, _rx) = EventSink::channel(1);

        sink.try_emit_wire("verificationDidStartCapturing", None).unwrap();
        let err = sink
            .try_emit_wire("verificationDidStartProcessing", None)
            .unwrap_err();
        assert_eq!(err, SinkError::Full);
    }

    #[tokio::test]
    async fn emit_after_consumer_stops_is_closed() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);

        let err = sink.emit(CaptureEvent::new(StatusEvent::Canceled)).await.unwrap_err();
        assert_eq!(err, SinkError::Closed);
    }
}
