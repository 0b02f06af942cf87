//! W3C Trace Context propagation for calls against the verification API.
//!
//! See: https://www.w3.org/TR/trace-context/

use opentelemetry::trace::{SpanContext, TraceContextExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::RequestBuilder;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const TRACEPARENT_HEADER: &str = "traceparent";
pub const TRACESTATE_HEADER: &str = "tracestate";

/// `version-trace_id-span_id-trace_flags`
pub fn format_traceparent(span_context: &SpanContext) -> String {
    format!(
        "00-{}-{}-{:02x}",
        span_context.trace_id(),
        span_context.span_id(),
        span_context.trace_flags().to_u8()
    )
}

/// Trace headers for the current span. Empty when the span carries no valid
/// OpenTelemetry context, e.g. when no OTLP exporter is installed.
pub fn current_trace_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    let context = Span::current().context();
    let span = context.span();
    let span_context = span.span_context();
    if !span_context.is_valid() {
        return headers;
    }

    if let Ok(value) = HeaderValue::from_str(&format_traceparent(span_context)) {
        headers.insert(TRACEPARENT_HEADER, value);
    }

    let tracestate = span_context.trace_state().header();
    if !tracestate.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&tracestate) {
            headers.insert(TRACESTATE_HEADER, value);
        }
    }

    headers
}

/// Attach the current trace context to an outbound request.
pub trait WithTraceContext {
    fn with_trace_context(self) -> Self;
}

impl WithTraceContext for RequestBuilder {
    fn with_trace_context(self) -> Self {
        self.headers(current_trace_headers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{SpanId, TraceFlags, TraceId, TraceState};

    #[test]
    fn no_headers_without_a_span() {
        assert!(current_trace_headers().is_empty());
    }

    #[test]
    fn no_headers_inside_a_plain_tracing_span() {
        let span = tracing::info_span!("verification_attempt");
        let _guard = span.enter();

        assert!(current_trace_headers().get(TRACEPARENT_HEADER).is_none());
    }

    #[test]
    fn traceparent_layout() {
        let span_context = SpanContext::new(
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
            SpanId::from_hex("b7ad6b7169203331").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );

        assert_eq!(
            format_traceparent(&span_context),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
    }
}
