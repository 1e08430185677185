//! Shared relay state handed to every connection.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use huddle_core::events::ServerEvent;
use huddle_core::ids::SessionId;
use huddle_settings::RelaySettings;
use metrics::counter;
use tracing::info;

use crate::metrics::SESSIONS_EVICTED_TOTAL;
use crate::websocket::broadcast::{Broadcaster, Delivery};
use crate::websocket::registry::SessionRegistry;
use crate::websocket::session::Session;

/// Registry, broadcaster, and protocol settings shared by all connections.
///
/// The `broadcast_*` wrappers forward to the [`Broadcaster`] and then announce
/// the departure of any session the fan-out had to evict, repeating until no
/// further evictions occur.
pub struct Relay {
    registry: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
    settings: RelaySettings,
}

impl Relay {
    /// Create an empty relay.
    pub fn new(settings: RelaySettings) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            registry,
            broadcaster,
            settings,
        }
    }

    /// The session registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The underlying broadcaster. Prefer the `broadcast_*` wrappers, which
    /// also settle evictions.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Protocol settings.
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Deliver to everyone.
    pub fn broadcast_all(&self, event: &ServerEvent) {
        self.settle(self.broadcaster.broadcast_all(event));
    }

    /// Deliver to everyone except `excluded`.
    pub fn broadcast_except(&self, event: &ServerEvent, excluded: &SessionId) {
        self.settle(self.broadcaster.broadcast_except(event, excluded));
    }

    /// Deliver to one session.
    pub fn send_to(&self, event: &ServerEvent, target: &SessionId) {
        self.settle(self.broadcaster.send_to(event, target));
    }

    /// Push the current presence list to everyone.
    pub fn broadcast_presence(&self) {
        self.settle(self.broadcaster.broadcast_presence());
    }

    /// Push the current presence list to one session as `usersList`.
    pub fn send_presence_to(&self, target: &SessionId) {
        self.settle(self.broadcaster.send_presence_to(target));
    }

    /// Disconnect a session: unregister it, close its outbound handle, and
    /// announce the departure.
    ///
    /// Both the transport-close path and the eviction path end here. Only the
    /// caller that actually removes the session announces it, so calling this
    /// twice, or for a session that never joined, broadcasts nothing the
    /// second time. Returns whether this call removed the session.
    pub fn disconnect(&self, id: &SessionId) -> bool {
        let Some(gone) = self.registry.remove(id) else {
            return false;
        };
        gone.outbound().close();
        info!(session_id = %gone.id, display_name = %gone.display_name, "session left");
        let mut evicted = self.announce_departure(&gone);
        self.drain(&mut evicted);
        true
    }

    fn settle(&self, delivery: Delivery) {
        let mut evicted: VecDeque<Arc<Session>> = delivery.evicted.into();
        self.drain(&mut evicted);
    }

    fn drain(&self, evicted: &mut VecDeque<Arc<Session>>) {
        while let Some(gone) = evicted.pop_front() {
            counter!(SESSIONS_EVICTED_TOTAL).increment(1);
            info!(session_id = %gone.id, display_name = %gone.display_name, "session evicted");
            evicted.extend(self.announce_departure(&gone));
        }
    }

    /// Send `userLeft` and a fresh presence list. Returns sessions evicted
    /// while doing so.
    fn announce_departure(&self, gone: &Session) -> VecDeque<Arc<Session>> {
        let notice = ServerEvent::user_left(&gone.display_name, Utc::now());
        let mut evicted: VecDeque<Arc<Session>> = self
            .broadcaster
            .broadcast_except(&notice, &gone.id)
            .evicted
            .into();
        evicted.extend(self.broadcaster.broadcast_presence().evicted);
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::session::Outbound;
    use tokio::sync::mpsc;

    fn join(relay: &Relay, id: &str, name: &str, capacity: usize) -> mpsc::Receiver<Arc<str>> {
        let (outbound, rx) = Outbound::channel(capacity);
        relay
            .registry()
            .add(Arc::new(Session::new(id.into(), name.into(), outbound)))
            .unwrap();
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<str>>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            events.push(serde_json::from_str(&frame).unwrap());
        }
        events
    }

    #[test]
    fn disconnect_announces_once() {
        let relay = Relay::new(RelaySettings::default());
        let _alice = join(&relay, "a", "Alice", 8);
        let mut bob = join(&relay, "b", "Bob", 8);

        assert!(relay.disconnect(&"a".into()));
        assert!(!relay.disconnect(&"a".into()));

        let events = drain(&mut bob);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ServerEvent::UserLeft(n) if n.display_name == "Alice"));
        assert!(matches!(&events[1], ServerEvent::PresenceSnapshot(users) if users.len() == 1));
    }

    #[test]
    fn disconnect_unknown_is_silent() {
        let relay = Relay::new(RelaySettings::default());
        let mut bob = join(&relay, "b", "Bob", 8);
        assert!(!relay.disconnect(&"never-joined".into()));
        assert!(drain(&mut bob).is_empty());
    }

    #[test]
    fn disconnect_closes_outbound() {
        let relay = Relay::new(RelaySettings::default());
        let _alice = join(&relay, "a", "Alice", 8);
        let session = relay.registry().get(&"a".into()).unwrap();
        let _ = relay.disconnect(&"a".into());
        assert!(session.outbound().is_closed());
    }

    #[test]
    fn eviction_is_announced_to_survivors() {
        let relay = Relay::new(RelaySettings::default());
        let mut alice = join(&relay, "a", "Alice", 8);
        let dead = join(&relay, "d", "Dead", 8);
        drop(dead);

        relay.broadcast_all(&ServerEvent::user_joined("Carol", Utc::now()));

        let events = drain(&mut alice);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ServerEvent::UserJoined(_)));
        assert!(matches!(&events[1], ServerEvent::UserLeft(n) if n.display_name == "Dead"));
        assert!(matches!(&events[2], ServerEvent::PresenceSnapshot(users) if users.len() == 1));
        assert_eq!(relay.registry().count(), 1);
    }

    #[test]
    fn cascading_evictions_settle() {
        let relay = Relay::new(RelaySettings::default());
        let mut alice = join(&relay, "a", "Alice", 64);
        // Bob overflows on the second broadcast; Carol has one more slot and
        // overflows on Bob's departure notice.
        let _b = join(&relay, "b", "Bob", 1);
        let _c = join(&relay, "c", "Carol", 2);

        relay.broadcast_all(&ServerEvent::user_joined("x", Utc::now()));
        relay.broadcast_all(&ServerEvent::user_joined("y", Utc::now()));

        assert_eq!(relay.registry().count(), 1);
        let left: Vec<String> = drain(&mut alice)
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::UserLeft(n) => Some(n.display_name),
                _ => None,
            })
            .collect();
        assert_eq!(left.len(), 2);
        assert!(left.contains(&"Bob".to_string()));
        assert!(left.contains(&"Carol".to_string()));
    }

    #[test]
    fn evicted_session_cannot_be_disconnected_again() {
        let relay = Relay::new(RelaySettings::default());
        let _alice = join(&relay, "a", "Alice", 8);
        drop(join(&relay, "d", "Dead", 8));

        relay.broadcast_presence();
        assert!(!relay.disconnect(&"d".into()));
    }

    #[test]
    fn racing_disconnect_and_eviction_announce_once() {
        use std::sync::Barrier;
        use std::sync::atomic::{AtomicUsize, Ordering};

        const DISCONNECTORS: usize = 4;

        for _ in 0..200 {
            let relay = Relay::new(RelaySettings::default());
            let mut alice = join(&relay, "a", "Alice", 256);
            // Bob's receiver is gone, so any fan-out evicts him
            drop(join(&relay, "b", "Bob", 8));

            let barrier = Barrier::new(DISCONNECTORS + 1);
            let removed = AtomicUsize::new(0);
            std::thread::scope(|s| {
                for _ in 0..DISCONNECTORS {
                    let _ = s.spawn(|| {
                        let _ = barrier.wait();
                        if relay.disconnect(&"b".into()) {
                            let _ = removed.fetch_add(1, Ordering::SeqCst);
                        }
                    });
                }
                let _ = s.spawn(|| {
                    let _ = barrier.wait();
                    relay.broadcast_all(&ServerEvent::user_joined("x", Utc::now()));
                });
            });

            assert!(removed.load(Ordering::SeqCst) <= 1);
            assert_eq!(relay.registry().count(), 1);
            let left: Vec<String> = drain(&mut alice)
                .into_iter()
                .filter_map(|e| match e {
                    ServerEvent::UserLeft(n) => Some(n.display_name),
                    _ => None,
                })
                .collect();
            assert_eq!(left, ["Bob"]);
        }
    }
}
