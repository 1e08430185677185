//! WebSocket session management, broadcasting, and per-connection protocol.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `session` | Outbound queue handle and the joined-session record |
//! | `registry` | Authoritative set of joined sessions, presence snapshots |
//! | `broadcast` | Fan-out to all / all-but-one / one, eviction of unreachable clients |
//! | `handler` | `Pending → Active → Closed` state machine for one connection |
//! | `connection` | Socket read/write loops, heartbeat, write timeouts |
//!
//! ## Data Flow
//!
//! `connection` → `handler` → [`Relay`](crate::relay::Relay) → `broadcast` →
//! each session's `Outbound` → that session's `connection` writer.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod registry;
pub mod session;
