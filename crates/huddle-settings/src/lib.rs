//! # huddle-settings
//!
//! Configuration management with layered sources for the Huddle relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HuddleSettings::default()`]
//! 2. **Settings file**: JSON at the path named by `HUDDLE_SETTINGS`
//!    (partial files are fine; a missing variable or file means defaults)
//! 3. **Environment variables**: `PORT` and `HUDDLE_*` overrides (highest priority)
//!
//! Nothing is ever written back. All runtime state lives in memory.
//!
//! # Usage
//!
//! ```no_run
//! use huddle_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, load_settings, load_settings_from_path, settings_path};
pub use types::*;
