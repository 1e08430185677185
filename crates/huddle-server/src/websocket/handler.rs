//! Per-connection protocol state machine.
//!
//! ```text
//! Pending --join(name)--> Active --disconnect--> Closed
//!    |                    |  ^
//!    |                    +--+ message / typing
//!    +----------disconnect-------------------> Closed
//! ```
//!
//! Everything here is synchronous: registry updates and fan-out enqueue
//! without waiting, so the socket task can call straight in.

use std::sync::Arc;

use chrono::Utc;
use huddle_core::errors::RelayError;
use huddle_core::events::{ClientEvent, ServerEvent};
use huddle_core::ids::SessionId;
use huddle_core::text::{normalize_display_name, normalize_message};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::session::{Outbound, Session};
use crate::metrics::{INVALID_INPUT_TOTAL, MESSAGES_RELAYED_TOTAL};
use crate::relay::Relay;

/// Observable connection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no display name yet.
    Pending,
    /// Joined and registered.
    Active,
    /// Terminal.
    Closed,
}

enum State {
    Pending(Outbound),
    Active(Arc<Session>),
    Closed,
}

/// Drives one connection through `Pending → Active → Closed`.
pub struct ConnectionHandler {
    id: SessionId,
    relay: Arc<Relay>,
    state: State,
    close_signal: CancellationToken,
}

impl ConnectionHandler {
    /// Start a pending connection with a fresh session ID.
    pub fn new(relay: Arc<Relay>, outbound: Outbound) -> Self {
        Self::with_id(SessionId::new(), relay, outbound)
    }

    /// Start a pending connection with a given session ID.
    pub fn with_id(id: SessionId, relay: Arc<Relay>, outbound: Outbound) -> Self {
        let close_signal = outbound.close_signal();
        Self {
            id,
            relay,
            state: State::Pending(outbound),
            close_signal,
        }
    }

    /// Session ID of this connection.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        match self.state {
            State::Pending(_) => ConnectionState::Pending,
            State::Active(_) => ConnectionState::Active,
            State::Closed => ConnectionState::Closed,
        }
    }

    /// Display name, once joined.
    pub fn display_name(&self) -> Option<&str> {
        match &self.state {
            State::Active(session) => Some(&session.display_name),
            _ => None,
        }
    }

    /// Fires when the connection is closed from either side, including
    /// eviction by a failed fan-out.
    pub fn close_signal(&self) -> CancellationToken {
        self.close_signal.clone()
    }

    /// Decode and handle one text frame. Undecodable frames are dropped.
    pub fn handle_frame(&mut self, frame: &str) {
        match ClientEvent::from_json(frame) {
            Ok(event) => self.handle(event),
            Err(e) => {
                counter!(INVALID_INPUT_TOTAL, "code" => e.code()).increment(1);
                debug!(session_id = %self.id, error = %e, "dropping undecodable frame");
            }
        }
    }

    /// Apply one client event.
    pub fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Join(name) => self.join(&name),
            ClientEvent::Message { text, .. } => self.message(&text),
            ClientEvent::Typing { is_typing, .. } => self.typing(is_typing),
        }
    }

    fn join(&mut self, requested: &str) {
        if !matches!(self.state, State::Pending(_)) {
            debug!(session_id = %self.id, state = ?self.state(), "join ignored");
            return;
        }
        let display_name =
            match normalize_display_name(requested, self.relay.settings().max_display_name_chars) {
                Ok(name) => name,
                Err(e) => {
                    self.reject(&e);
                    return;
                }
            };

        let outbound = match std::mem::replace(&mut self.state, State::Closed) {
            State::Pending(outbound) => outbound,
            other => {
                self.state = other;
                return;
            }
        };
        if outbound.is_closed() {
            debug!(session_id = %self.id, "join on closed connection ignored");
            return;
        }

        let session = Arc::new(Session::new(self.id.clone(), display_name, outbound));
        if let Err(e) = self.relay.registry().add(Arc::clone(&session)) {
            error!(session_id = %self.id, error = %e, "session registry invariant violated");
            session.outbound().close();
            return;
        }
        info!(session_id = %self.id, display_name = %session.display_name, "session joined");
        self.state = State::Active(Arc::clone(&session));

        let relay = &self.relay;
        relay.broadcast_except(
            &ServerEvent::user_joined(&session.display_name, session.joined_at),
            &self.id,
        );
        if relay.settings().announce_snapshot_to_joiner {
            relay.send_presence_to(&self.id);
        }
        relay.broadcast_presence();
    }

    fn message(&mut self, raw: &str) {
        let Some(session) = self.active() else {
            debug!(session_id = %self.id, "message before join ignored");
            return;
        };
        let text = match normalize_message(raw, self.relay.settings().max_message_bytes) {
            Ok(text) => text,
            Err(e) => {
                self.reject(&e);
                return;
            }
        };
        counter!(MESSAGES_RELAYED_TOTAL).increment(1);
        debug!(session_id = %self.id, bytes = text.len(), "relaying message");
        self.relay.broadcast_all(&ServerEvent::MessageBroadcast {
            id: self.id.clone(),
            display_name: session.display_name.clone(),
            text,
            timestamp: Utc::now(),
        });
    }

    fn typing(&mut self, is_typing: bool) {
        let Some(session) = self.active() else {
            return;
        };
        self.relay.broadcast_except(
            &ServerEvent::Typing {
                display_name: session.display_name.clone(),
                is_typing,
            },
            &self.id,
        );
    }

    /// Transition to `Closed`.
    ///
    /// An active session is unregistered and its departure announced, unless
    /// a failed fan-out already did so. A pending connection leaves silently.
    /// Further calls do nothing.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Active(session) => {
                session.outbound().close();
                let _ = self.relay.disconnect(&self.id);
            }
            State::Pending(outbound) => {
                outbound.close();
                debug!(session_id = %self.id, "pending connection closed");
            }
            State::Closed => {}
        }
    }

    /// Active session, unless the relay has since evicted it.
    fn active(&self) -> Option<Arc<Session>> {
        let State::Active(session) = &self.state else {
            return None;
        };
        if session.outbound().is_closed() {
            return None;
        }
        Some(Arc::clone(session))
    }

    fn reject(&self, err: &RelayError) {
        counter!(INVALID_INPUT_TOTAL, "code" => err.code()).increment(1);
        debug!(session_id = %self.id, error = %err, "invalid input");
        if !self.relay.settings().reject_invalid_input {
            return;
        }
        let reply = ServerEvent::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        };
        match &self.state {
            State::Pending(outbound) => {
                if let Ok(frame) = reply.to_json() {
                    let _ = outbound.send(Arc::from(frame));
                }
            }
            State::Active(_) => self.relay.send_to(&reply, &self.id),
            State::Closed => {}
        }
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
