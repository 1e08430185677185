//! Wire events exchanged between clients and the relay.
//!
//! Two event families:
//!
//! - **[`ClientEvent`]**: requests a client sends (join, chat message, typing).
//! - **[`ServerEvent`]**: notifications the relay pushes (messages, system
//!   notices, presence snapshots, typing status).
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`. The
//! event names and payload field names are the client contract and must not
//! change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RelayError;
use crate::ids::SessionId;

// ─────────────────────────────────────────────────────────────────────────────
// ClientEvent: client → server
// ─────────────────────────────────────────────────────────────────────────────

/// Events a client may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Announce a display name. Activates the session.
    #[serde(rename = "join")]
    Join(String),

    /// Post a chat message to the room.
    #[serde(rename = "chatMessage")]
    Message {
        /// Name the client believes it joined with. The relay attributes the
        /// message to the session's own display name instead.
        #[serde(rename = "username", default)]
        display_name: String,
        /// Message body.
        #[serde(rename = "message")]
        text: String,
    },

    /// Start or stop the typing indicator.
    #[serde(rename = "typing")]
    Typing {
        /// Name the client believes it joined with (ignored, see `Message`).
        #[serde(rename = "username", default)]
        display_name: String,
        /// Whether the user is currently typing.
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

impl ClientEvent {
    /// Decode one text frame.
    pub fn from_json(frame: &str) -> Result<Self, RelayError> {
        serde_json::from_str(frame).map_err(|e| RelayError::Protocol {
            reason: e.to_string(),
        })
    }

    /// Wire name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Message { .. } => "chatMessage",
            Self::Typing { .. } => "typing",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServerEvent: server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Public view of one active session, as carried by presence snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    /// Session ID.
    pub id: SessionId,
    /// Display name chosen at join.
    #[serde(rename = "username")]
    pub display_name: String,
    /// When the session joined.
    #[serde(rename = "joinTime")]
    pub joined_at: DateTime<Utc>,
}

/// Human-readable system notice announcing a join or departure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemNotice {
    /// Subject of the notice.
    #[serde(rename = "username")]
    pub display_name: String,
    /// Rendered notice text, e.g. `"Alice joined the chat"`.
    pub message: String,
    /// When the notice was produced.
    pub timestamp: DateTime<Utc>,
}

/// Events the relay pushes to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// A chat message, delivered to every active session including the sender.
    #[serde(rename = "message")]
    MessageBroadcast {
        /// Session ID of the sender, so clients can tag their own messages.
        id: SessionId,
        /// Sender's display name.
        #[serde(rename = "username")]
        display_name: String,
        /// Message body.
        #[serde(rename = "message")]
        text: String,
        /// When the relay accepted the message.
        timestamp: DateTime<Utc>,
    },

    /// Typing status of another session.
    #[serde(rename = "typing")]
    Typing {
        /// Display name of the typist.
        #[serde(rename = "username")]
        display_name: String,
        /// Whether they are typing.
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    /// Someone joined.
    #[serde(rename = "userJoined")]
    UserJoined(SystemNotice),

    /// Someone left.
    #[serde(rename = "userLeft")]
    UserLeft(SystemNotice),

    /// Full presence list, ordered by join time. Sent to everyone on every
    /// membership change.
    #[serde(rename = "updateUsersList")]
    PresenceSnapshot(Vec<PresenceEntry>),

    /// Presence list unicast to a session that just joined.
    #[serde(rename = "usersList")]
    UsersList(Vec<PresenceEntry>),

    /// A request was rejected.
    #[serde(rename = "error")]
    Error {
        /// Machine-readable code, e.g. `"INVALID_DISPLAY_NAME"`.
        code: String,
        /// Human-readable description.
        message: String,
    },
}

impl ServerEvent {
    /// Build a `userJoined` notice.
    pub fn user_joined(display_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self::UserJoined(SystemNotice {
            display_name: display_name.to_owned(),
            message: format!("{display_name} joined the chat"),
            timestamp,
        })
    }

    /// Build a `userLeft` notice.
    pub fn user_left(display_name: &str, timestamp: DateTime<Utc>) -> Self {
        Self::UserLeft(SystemNotice {
            display_name: display_name.to_owned(),
            message: format!("{display_name} left the chat"),
            timestamp,
        })
    }

    /// Wire name of this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageBroadcast { .. } => "message",
            Self::Typing { .. } => "typing",
            Self::UserJoined(_) => "userJoined",
            Self::UserLeft(_) => "userLeft",
            Self::PresenceSnapshot(_) => "updateUsersList",
            Self::UsersList(_) => "usersList",
            Self::Error { .. } => "error",
        }
    }

    /// Encode as one text frame.
    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Protocol {
            reason: e.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
