//! Per-connection outbound handle and the active session record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_core::events::PresenceEntry;
use huddle_core::ids::SessionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Why a frame could not be queued for a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendFailure {
    /// The client's queue is at capacity.
    Full,
    /// The connection is gone or has been marked closed.
    Closed,
}

impl SendFailure {
    /// Label used in logs, metrics, and [`huddle_core::errors::RelayError`].
    pub fn reason(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Closed => "closed",
        }
    }
}

/// Outbound side of one client connection.
///
/// Frames are pre-serialized JSON shared across recipients. Sending never
/// blocks: a full queue is reported as a failure so one stalled client cannot
/// hold up a fan-out. The close signal is shared with the socket task, which
/// tears the connection down once it fires.
#[derive(Debug)]
pub struct Outbound {
    tx: mpsc::Sender<Arc<str>>,
    closed: CancellationToken,
}

impl Outbound {
    /// Create a handle and the receiver the socket writer drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                closed: CancellationToken::new(),
            },
            rx,
        )
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Arc<str>) -> Result<(), SendFailure> {
        if self.closed.is_cancelled() {
            return Err(SendFailure::Closed);
        }
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }

    /// Mark the connection closed. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) was called or the receiver is gone.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }

    /// Token that fires when the connection is closed from either side.
    pub fn close_signal(&self) -> CancellationToken {
        self.closed.clone()
    }
}

/// One joined client.
///
/// Created by the connection handler on a valid join and shared (behind an
/// `Arc`) between the handler and the registry. Owns the client's
/// [`Outbound`] handle exclusively.
#[derive(Debug)]
pub struct Session {
    /// Connection-scoped ID.
    pub id: SessionId,
    /// Display name, fixed at join.
    pub display_name: String,
    /// When the session became active.
    pub joined_at: DateTime<Utc>,
    outbound: Outbound,
}

impl Session {
    /// Activate a session now.
    pub fn new(id: SessionId, display_name: String, outbound: Outbound) -> Self {
        Self::with_joined_at(id, display_name, Utc::now(), outbound)
    }

    /// Activate a session with an explicit join time.
    pub fn with_joined_at(
        id: SessionId,
        display_name: String,
        joined_at: DateTime<Utc>,
        outbound: Outbound,
    ) -> Self {
        Self {
            id,
            display_name,
            joined_at,
            outbound,
        }
    }

    /// The client's outbound handle.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Public fields only, as shown in presence lists.
    pub fn presence(&self) -> PresenceEntry {
        PresenceEntry {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            joined_at: self.joined_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_frame() {
        let (outbound, mut rx) = Outbound::channel(4);
        outbound.send(Arc::from("hello")).unwrap();
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
    }

    #[test]
    fn send_reports_full_queue() {
        let (outbound, _rx) = Outbound::channel(1);
        outbound.send(Arc::from("a")).unwrap();
        assert_eq!(outbound.send(Arc::from("b")), Err(SendFailure::Full));
    }

    #[test]
    fn send_reports_dropped_receiver() {
        let (outbound, rx) = Outbound::channel(4);
        drop(rx);
        assert_eq!(outbound.send(Arc::from("a")), Err(SendFailure::Closed));
        assert!(outbound.is_closed());
    }

    #[test]
    fn close_rejects_further_sends() {
        let (outbound, _rx) = Outbound::channel(4);
        outbound.close();
        outbound.close();
        assert!(outbound.is_closed());
        assert_eq!(outbound.send(Arc::from("a")), Err(SendFailure::Closed));
    }

    #[tokio::test]
    async fn close_signal_fires() {
        let (outbound, _rx) = Outbound::channel(4);
        let signal = outbound.close_signal();
        outbound.close();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let (outbound, _rx) = Outbound::channel(0);
        assert!(outbound.send(Arc::from("a")).is_ok());
    }

    #[test]
    fn presence_exposes_public_fields() {
        let (outbound, _rx) = Outbound::channel(1);
        let session = Session::new(SessionId::from("s1"), "Alice".into(), outbound);
        let entry = session.presence();
        assert_eq!(entry.id, SessionId::from("s1"));
        assert_eq!(entry.display_name, "Alice");
        assert_eq!(entry.joined_at, session.joined_at);
    }

    #[test]
    fn failure_reasons() {
        assert_eq!(SendFailure::Full.reason(), "full");
        assert_eq!(SendFailure::Closed.reason(), "closed");
    }
}
