pub mod event;
pub mod machine;

pub use event::{CaptureErrorCode, RecaptureReason, StatusEvent};
pub use machine::{
    Ignored, SideEffect, SurfacedError, Transition, VerificationState, VerificationStatusMachine,
};
