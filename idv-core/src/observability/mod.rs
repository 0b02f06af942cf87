pub mod logging;
pub mod trace_context;

pub use logging::{init_tracing, TelemetryError};
pub use trace_context::{
    current_trace_headers, format_traceparent, WithTraceContext, TRACEPARENT_HEADER,
    TRACESTATE_HEADER,
};
