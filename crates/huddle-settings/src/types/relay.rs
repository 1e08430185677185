//! Relay fan-out and protocol settings.

use serde::{Deserialize, Serialize};

/// Fan-out, liveness, and input limit settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Per-session outbound queue depth. A session whose queue is full when
    /// an event is broadcast is disconnected.
    pub outbound_buffer: usize,
    /// Maximum time a single socket write may take before the connection is
    /// considered dead.
    pub send_timeout_ms: u64,
    /// Interval between server pings. `0` disables pings.
    pub heartbeat_interval_secs: u64,
    /// Largest accepted message body, in bytes, as sent.
    pub max_message_bytes: usize,
    /// Display names longer than this many characters are truncated.
    pub max_display_name_chars: usize,
    /// Also unicast a `usersList` presence snapshot to each new joiner.
    pub announce_snapshot_to_joiner: bool,
    /// Answer invalid join/message requests with an `error` event instead of
    /// dropping them silently.
    pub reject_invalid_input: bool,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 256,
            send_timeout_ms: 5_000,
            heartbeat_interval_secs: 30,
            max_message_bytes: 4096,
            max_display_name_chars: 32,
            announce_snapshot_to_joiner: false,
            reject_invalid_input: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let r = RelaySettings::default();
        assert_eq!(r.outbound_buffer, 256);
        assert_eq!(r.send_timeout_ms, 5_000);
        assert_eq!(r.heartbeat_interval_secs, 30);
        assert!(!r.announce_snapshot_to_joiner);
        assert!(!r.reject_invalid_input);
    }

    #[test]
    fn serde_camel_case() {
        let json = serde_json::to_value(RelaySettings::default()).unwrap();
        assert!(json.get("heartbeatIntervalSecs").is_some());
        assert!(json.get("maxDisplayNameChars").is_some());
        assert!(json.get("rejectInvalidInput").is_some());
    }
}
