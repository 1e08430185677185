//! Event fan-out to joined sessions.

use std::sync::Arc;

use huddle_core::errors::RelayError;
use huddle_core::events::{PresenceEntry, ServerEvent};
use huddle_core::ids::SessionId;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::registry::SessionRegistry;
use super::session::{SendFailure, Session};
use crate::metrics::{BROADCAST_DROPS_TOTAL, EVENTS_BROADCAST_TOTAL};

/// Outcome of one fan-out.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Sessions selected by the audience filter.
    pub recipients: usize,
    /// Sessions the frame was queued for.
    pub delivered: usize,
    /// Sessions that could not be reached and were removed from the registry
    /// by this call. Their departure has not been announced yet.
    pub evicted: Vec<Arc<Session>>,
}

/// Delivers events to a computed audience.
///
/// The audience is always drawn from a fresh registry snapshot. The registry
/// lock is released before any frame is queued, and queuing never waits, so
/// a stalled client cannot hold up joins, leaves, or other recipients.
///
/// Fan-outs are sequenced by an internal lock held only while frames are
/// queued. Any two events therefore reach every common recipient in the same
/// relative order.
pub struct Broadcaster {
    registry: Arc<SessionRegistry>,
    sequence: Mutex<()>,
}

impl Broadcaster {
    /// Create a broadcaster over `registry`.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            sequence: Mutex::new(()),
        }
    }

    /// Deliver to every registered session.
    pub fn broadcast_all(&self, event: &ServerEvent) -> Delivery {
        self.fan_out(|_| event.clone(), |_| true, "all")
    }

    /// Deliver to every registered session except `excluded`.
    pub fn broadcast_except(&self, event: &ServerEvent, excluded: &SessionId) -> Delivery {
        self.fan_out(|_| event.clone(), |s| s.id != *excluded, "except")
    }

    /// Deliver to one session, if it is registered.
    pub fn send_to(&self, event: &ServerEvent, target: &SessionId) -> Delivery {
        self.fan_out(|_| event.clone(), |s| s.id == *target, "unicast")
    }

    /// Deliver the current presence list to every registered session.
    ///
    /// The list is built from the same snapshot the audience is drawn from,
    /// inside the sequencing lock, so it matches registry state at the moment
    /// it is queued.
    pub fn broadcast_presence(&self) -> Delivery {
        self.fan_out(
            |sessions| ServerEvent::PresenceSnapshot(presence_of(sessions)),
            |_| true,
            "presence",
        )
    }

    /// Deliver the current presence list to one session as `usersList`.
    pub fn send_presence_to(&self, target: &SessionId) -> Delivery {
        self.fan_out(
            |sessions| ServerEvent::UsersList(presence_of(sessions)),
            |s| s.id == *target,
            "presence_unicast",
        )
    }

    /// Serialize once, queue for matching sessions, evict unreachable ones.
    fn fan_out(
        &self,
        build: impl FnOnce(&[Arc<Session>]) -> ServerEvent,
        audience: impl Fn(&Session) -> bool,
        label: &'static str,
    ) -> Delivery {
        let mut delivery = Delivery::default();
        let mut failed: Vec<(Arc<Session>, SendFailure)> = Vec::new();
        let event_name;
        {
            let _turn = self.sequence.lock();
            let sessions = self.registry.sessions();
            let event = build(&sessions);
            event_name = event.event_name();
            let frame: Arc<str> = match event.to_json() {
                Ok(json) => Arc::from(json),
                Err(e) => {
                    warn!(event = event_name, error = %e, "failed to serialize event");
                    return delivery;
                }
            };

            for session in sessions.iter().filter(|s| audience(s)) {
                delivery.recipients += 1;
                match session.outbound().send(Arc::clone(&frame)) {
                    Ok(()) => delivery.delivered += 1,
                    Err(failure) => failed.push((Arc::clone(session), failure)),
                }
            }
        }

        counter!(EVENTS_BROADCAST_TOTAL, "event" => event_name).increment(1);
        debug!(
            event = event_name,
            label,
            recipients = delivery.recipients,
            delivered = delivery.delivered,
            "broadcast event"
        );

        for (session, failure) in failed {
            counter!(BROADCAST_DROPS_TOTAL, "reason" => failure.reason()).increment(1);
            let err = RelayError::RecipientUnreachable {
                id: session.id.clone(),
                reason: failure.reason(),
            };
            warn!(
                session_id = %session.id,
                event = event_name,
                label,
                error = %err,
                "disconnecting unreachable client"
            );
            session.outbound().close();
            if let Some(removed) = self.registry.remove(&session.id) {
                delivery.evicted.push(removed);
            }
        }
        delivery
    }
}

fn presence_of(sessions: &[Arc<Session>]) -> Vec<PresenceEntry> {
    sessions.iter().map(|s| s.presence()).collect()
}
