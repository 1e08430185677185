//! HTTP listener settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Network listener and static asset settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `PORT` in the environment overrides it.
    pub port: u16,
    /// Directory served at `/` for the browser client.
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: PathBuf::from("public"),
        }
    }
}
