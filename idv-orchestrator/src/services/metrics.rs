use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static FLOWS_STARTED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static STATUS_EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RESULT_FETCHES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Register the orchestration counters. Later calls are no-ops.
pub fn init_metrics() {
    if PROMETHEUS_REGISTRY.get().is_some() {
        return;
    }

    let registry = Registry::new();

    let flows_started = IntCounterVec::new(
        Opts::new("idv_flows_started_total", "Capture flows launched by flow kind"),
        &["flow"],
    )
    .expect("Failed to create idv_flows_started_total metric");

    let status_events = IntCounterVec::new(
        Opts::new("idv_status_events_total", "Capture status events received"),
        &["event"],
    )
    .expect("Failed to create idv_status_events_total metric");

    let result_fetches = IntCounterVec::new(
        Opts::new(
            "idv_result_fetches_total",
            "Result fetches by flow kind and outcome",
        ),
        &["flow", "outcome"],
    )
    .expect("Failed to create idv_result_fetches_total metric");

    registry
        .register(Box::new(flows_started.clone()))
        .expect("Failed to register idv_flows_started_total");
    registry
        .register(Box::new(status_events.clone()))
        .expect("Failed to register idv_status_events_total");
    registry
        .register(Box::new(result_fetches.clone()))
        .expect("Failed to register idv_result_fetches_total");

    // Lost race with a concurrent init: the winner's counters stay in place.
    if PROMETHEUS_REGISTRY.set(registry).is_err() {
        return;
    }
    let _ = FLOWS_STARTED_TOTAL.set(flows_started);
    let _ = STATUS_EVENTS_TOTAL.set(status_events);
    let _ = RESULT_FETCHES_TOTAL.set(result_fetches);
}

/// Text exposition of every registered counter.
pub fn get_metrics() -> String {
    let Some(registry) = PROMETHEUS_REGISTRY.get() else {
        return "# Metrics registry not initialized\n".to_string();
    };

    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer).ok();

    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_flow_started(flow: &str) {
    if let Some(counter) = FLOWS_STARTED_TOTAL.get() {
        counter.with_label_values(&[flow]).inc();
    }
}

pub fn record_status_event(event: &str) {
    if let Some(counter) = STATUS_EVENTS_TOTAL.get() {
        counter.with_label_values(&[event]).inc();
    }
}

/// `outcome` is "success" or "failure".
pub fn record_result_fetch(flow: &str, outcome: &str) {
    if let Some(counter) = RESULT_FETCHES_TOTAL.get() {
        counter.with_label_values(&[flow, outcome]).inc();
    }
}
