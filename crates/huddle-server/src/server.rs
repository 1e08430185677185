//! `HuddleServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use huddle_settings::{HuddleSettings, ServerSettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::relay::Relay;
use crate::websocket::connection::run_connection;

/// Smallest frame the socket will accept, whatever `maxMessageBytes` says.
const MIN_FRAME_BYTES: usize = 16 * 1024;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry, broadcaster, and protocol settings.
    pub relay: Arc<Relay>,
    /// Fires on shutdown; open sockets close when it does.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The chat relay server.
pub struct HuddleServer {
    settings: ServerSettings,
    relay: Arc<Relay>,
    shutdown: CancellationToken,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HuddleServer {
    /// Create a server with an empty relay.
    pub fn new(settings: &HuddleSettings, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            settings: settings.server.clone(),
            relay: Arc::new(Relay::new(settings.relay.clone())),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            relay: Arc::clone(&self.relay),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback_service(ServeDir::new(&self.settings.static_dir))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serve on `listener` until [`shutdown`](Self::shutdown) fires.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let port = listener.local_addr().map_err(ServerError::Serve)?.port();
        info!(port, "Chat server running on http://localhost:{port}");

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(ServerError::Serve)?;

        info!("server stopped");
        Ok(())
    }

    /// Bind and serve in a background task. Returns the bound address.
    pub async fn listen(
        self: &Arc<Self>,
    ) -> Result<(SocketAddr, JoinHandle<Result<(), ServerError>>), ServerError> {
        let listener = self.bind().await?;
        let addr = listener.local_addr().map_err(ServerError::Serve)?;
        let server = Arc::clone(self);
        let handle = tokio::spawn(async move { server.serve(listener).await });
        Ok((addr, handle))
    }

    /// The shared relay.
    pub fn relay(&self) -> &Arc<Relay> {
        &self.relay
    }

    /// Cancel to stop accepting connections and close open sockets.
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Listener settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limit = state
        .relay
        .settings()
        .max_message_bytes
        .saturating_mul(4)
        .max(MIN_FRAME_BYTES);
    ws.max_message_size(limit)
        .on_upgrade(move |socket| run_connection(socket, state.relay, state.shutdown))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.relay.registry().count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server(static_dir: &std::path::Path) -> HuddleServer {
        let mut settings = HuddleSettings::default();
        settings.server.static_dir = static_dir.to_path_buf();
        HuddleServer::new(&settings, None)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path());

        let (status, body) = get_body(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["sessions"], 0);
    }

    #[tokio::test]
    async fn metrics_absent_without_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path());
        let (status, _) = get_body(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_rendered_with_handle() {
        let dir = tempfile::tempdir().unwrap();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let mut settings = HuddleSettings::default();
        settings.server.static_dir = dir.path().to_path_buf();
        let server = HuddleServer::new(&settings, Some(handle));

        let (status, _) = get_body(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn static_files_served_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>huddle</h1>").unwrap();
        let server = make_server(dir.path());

        let (status, body) = get_body(server.router(), "/index.html").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>huddle</h1>");

        let (status, body) = get_body(server.router(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"<h1>huddle</h1>");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path());
        let (status, _) = get_body(server.router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_requires_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path());
        let (status, _) = get_body(server.router(), "/ws").await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn bind_reports_address_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut settings = HuddleSettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = taken.local_addr().unwrap().port();
        let server = HuddleServer::new(&settings, None);

        let err = server.bind().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn shutdown_stops_serving() {
        let mut settings = HuddleSettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;
        let server = Arc::new(HuddleServer::new(&settings, None));

        let (_addr, handle) = server.listen().await.unwrap();
        server.shutdown().cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
