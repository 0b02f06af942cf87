//! Status payloads as the native capture bridge reports them:
//! `{ "status": "<name>", "additionalData": <string | {"error": <string>} | null> }`.

use crate::models::FlowKind;
use crate::status::{CaptureErrorCode, RecaptureReason, StatusEvent};
use serde_json::Value;

const UNKNOWN_CODE: &str = "unknown";

/// Decode one bridge payload. Returns `None` for status names this crate
/// does not understand.
pub fn decode_status(status: &str, additional: Option<&Value>) -> Option<(FlowKind, StatusEvent)> {
    let decoded = match status {
        "verificationDidStartCapturing" => (FlowKind::Verification, StatusEvent::StartCapturing),
        "verificationDidStartProcessing" => (FlowKind::Verification, StatusEvent::StartProcessing),
        "verificationDidComplete" => (FlowKind::Verification, StatusEvent::Completed),
        "verificationDidCancel" => (FlowKind::Verification, StatusEvent::Canceled),
        "verificationDidFail" => (FlowKind::Verification, failed(additional)),
        "verificationRequiresRecapture" => (
            FlowKind::Verification,
            StatusEvent::RequiresRecapture(RecaptureReason::new(detail(additional))),
        ),

        "faceAuthenticationDidStartCapturing" => (FlowKind::FaceAuth, StatusEvent::StartCapturing),
        "faceAuthenticationDidStartProcessing" => (FlowKind::FaceAuth, StatusEvent::StartProcessing),
        "faceAuthenticationDidComplete" => (FlowKind::FaceAuth, StatusEvent::Completed),
        "faceAuthenticationDidCancel" => (FlowKind::FaceAuth, StatusEvent::Canceled),
        "faceAuthenticationDidFail" => (FlowKind::FaceAuth, failed(additional)),

        // Hosted (mosaic) UI drives the same verification session
        "mosaicUIVerificationDidComplete" => (FlowKind::Verification, StatusEvent::Completed),
        "mosaicUIVerificationDidCancel" => (FlowKind::Verification, StatusEvent::Canceled),
        "mosaicUIVerificationDidFail" => (FlowKind::Verification, failed(additional)),

        _ => return None,
    };

    Some(decoded)
}

fn failed(additional: Option<&Value>) -> StatusEvent {
    StatusEvent::Failed(CaptureErrorCode::new(detail(additional)))
}

fn detail(additional: Option<&Value>) -> String {
    match additional {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Object(map)) => match map.get("error") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => UNKNOWN_CODE.to_string(),
        },
        _ => UNKNOWN_CODE.to_string(),
    }
}
