//! # huddle-server
//!
//! Axum HTTP + `WebSocket` chat relay.
//!
//! - `WebSocket` gateway at `/ws`: join, chat messages, typing indicators
//! - Session registry and presence snapshots ordered by join time
//! - Non-blocking fan-out; clients that cannot keep up are disconnected
//! - HTTP endpoints: health check, Prometheus metrics, static client assets
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod errors;
pub mod health;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod websocket;

pub use errors::ServerError;
pub use relay::Relay;
pub use server::HuddleServer;
