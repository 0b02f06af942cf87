//! Application wiring and lifecycle.
//!
//! There is no server here: the host embeds [`Application`], hands
//! [`Application::event_sink`] to its capture bridge and drives
//! [`Application::run_until_stopped`] on its runtime.

use crate::capture::{CaptureEvent, CaptureSubsystem, EventSink};
use crate::config::{Settings, TelemetrySettings};
use crate::lifecycle::store::KeyValueStore;
use crate::lifecycle::{FlowUpdate, VerificationLifecycle};
use crate::orchestrator::SessionOrchestrator;
use crate::services::{init_metrics, ClientCredentials, ImageResolver, SessionGateway, TokenProvider};
use anyhow::Context;
use idv_core::observability::{init_tracing, TelemetryError};
use idv_core::ApiClient;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Install the global tracing subscriber from telemetry settings.
pub fn init_telemetry(telemetry: &TelemetrySettings) -> Result<(), TelemetryError> {
    init_tracing(
        &telemetry.service_name,
        &telemetry.log_level,
        telemetry.otlp_endpoint.as_deref(),
    )
}

/// Application container for the orchestrator and its event loop.
pub struct Application {
    lifecycle: Arc<VerificationLifecycle>,
    sink: EventSink,
    events: Mutex<Option<mpsc::Receiver<CaptureEvent>>>,
    shutdown: CancellationToken,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(
        settings: Settings,
        capture: Arc<dyn CaptureSubsystem>,
        store: Arc<dyn KeyValueStore>,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<FlowUpdate>)> {
        settings
            .ensure_configured()
            .context("Verification API is not configured")?;

        init_metrics();

        let api = ApiClient::new(&settings.api.base_url, settings.api.request_timeout())
            .context("Failed to build HTTP client")?;

        let tokens = TokenProvider::new(api.clone(), ClientCredentials::from(&settings.api));
        let sessions = SessionGateway::new(api.clone(), settings.face_auth.use_case.clone());
        let images = ImageResolver::new(api.clone());

        capture
            .initialize(&settings.api.client_id, api.base_url())
            .context("Failed to initialize capture subsystem")?;
        tracing::info!(base_url = %api.base_url(), "Capture subsystem initialized");

        let orchestrator = Arc::new(SessionOrchestrator::new(
            Arc::new(tokens),
            Arc::new(sessions),
            Arc::new(images),
            capture,
        ));
        let (lifecycle, updates) = VerificationLifecycle::new(orchestrator, store);
        let (sink, events) = EventSink::channel(settings.events.queue_size);

        tracing::info!(
            queue_size = settings.events.queue_size,
            use_case = %settings.face_auth.use_case,
            "Verification orchestrator ready"
        );

        Ok((
            Self {
                lifecycle: Arc::new(lifecycle),
                sink,
                events: Mutex::new(Some(events)),
                shutdown: CancellationToken::new(),
            },
            updates,
        ))
    }

    pub fn lifecycle(&self) -> &Arc<VerificationLifecycle> {
        &self.lifecycle
    }

    /// Producer end of the status-event channel for the capture bridge.
    pub fn event_sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// Drive the status-event loop until [`Application::shutdown`] is called.
    pub async fn run_until_stopped(&self) -> anyhow::Result<()> {
        let events = self
            .events
            .lock()
            .await
            .take()
            .context("Status event loop is already running")?;

        self.lifecycle.run(events, self.shutdown.clone()).await;
        Ok(())
    }

    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.shutdown.cancel();
    }
}
