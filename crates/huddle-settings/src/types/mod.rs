//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Types marked `#[serde(default)]` accept
//! partial JSON; missing fields get their default during deserialization.

mod relay;
mod server;

pub use relay::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the Huddle relay.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "relay": { "outboundBuffer": 128 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Network listener and static assets.
    pub server: ServerSettings,
    /// Relay fan-out and input limits.
    pub relay: RelaySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl HuddleSettings {
    /// Correct out-of-range values in place.
    ///
    /// Called automatically during loading. Invalid values are replaced with
    /// the nearest valid one and a warning, not rejected.
    pub fn validate(&mut self) {
        let relay = &mut self.relay;
        if relay.outbound_buffer == 0 {
            tracing::warn!("relay.outboundBuffer must be at least 1, correcting");
            relay.outbound_buffer = 1;
        }
        if relay.send_timeout_ms == 0 {
            let fallback = RelaySettings::default().send_timeout_ms;
            tracing::warn!(fallback, "relay.sendTimeoutMs must be positive, correcting");
            relay.send_timeout_ms = fallback;
        }
        if relay.max_display_name_chars == 0 {
            let fallback = RelaySettings::default().max_display_name_chars;
            tracing::warn!(
                fallback,
                "relay.maxDisplayNameChars must be positive, correcting"
            );
            relay.max_display_name_chars = fallback;
        }
        if relay.max_message_bytes == 0 {
            let fallback = RelaySettings::default().max_message_bytes;
            tracing::warn!(fallback, "relay.maxMessageBytes must be positive, correcting");
            relay.max_message_bytes = fallback;
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit newline-delimited JSON instead of human-readable lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
