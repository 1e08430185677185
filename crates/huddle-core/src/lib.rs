//! # huddle-core
//!
//! Foundation types, errors, session IDs, and utilities for the Huddle chat relay.
//!
//! This crate provides the shared vocabulary the other Huddle crates depend on:
//!
//! - **Session IDs**: [`ids::SessionId`], an opaque newtype that is never reused
//! - **Wire events**: [`events::ClientEvent`] (client → server) and
//!   [`events::ServerEvent`] (server → client), closed sets of typed variants
//! - **Presence**: [`events::PresenceEntry`], the public view of one session
//! - **Errors**: [`errors::RelayError`] via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for the process-wide subscriber
//! - **Text**: input normalization for display names and message bodies
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other huddle crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod text;
