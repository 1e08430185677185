//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded; a second call fails.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

fn describe() {
    describe_counter!(WS_CONNECTIONS_TOTAL, "WebSocket connections accepted");
    describe_counter!(WS_DISCONNECTIONS_TOTAL, "WebSocket connections closed");
    describe_histogram!(
        WS_CONNECTION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Lifetime of WebSocket connections"
    );
    describe_gauge!(SESSIONS_ACTIVE, "Sessions currently joined");
    describe_counter!(SESSIONS_EVICTED_TOTAL, "Sessions disconnected after a failed delivery");
    describe_counter!(BROADCAST_DROPS_TOTAL, "Frames that could not be queued");
    describe_counter!(EVENTS_BROADCAST_TOTAL, "Fan-outs performed");
    describe_counter!(MESSAGES_RELAYED_TOTAL, "Chat messages accepted and relayed");
    describe_counter!(INVALID_INPUT_TOTAL, "Client frames dropped or rejected");
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// WebSocket connection duration seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Joined sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "sessions_active";
/// Sessions evicted by a failed fan-out (counter).
pub const SESSIONS_EVICTED_TOTAL: &str = "sessions_evicted_total";
/// Broadcast drops total (counter, labels: reason).
pub const BROADCAST_DROPS_TOTAL: &str = "broadcast_drops_total";
/// Events fanned out (counter, labels: event).
pub const EVENTS_BROADCAST_TOTAL: &str = "events_broadcast_total";
/// Chat messages relayed (counter).
pub const MESSAGES_RELAYED_TOTAL: &str = "messages_relayed_total";
/// Invalid client input (counter, labels: code).
pub const INVALID_INPUT_TOTAL: &str = "invalid_input_total";
