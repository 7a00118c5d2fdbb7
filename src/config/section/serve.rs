//! `[serve]` section configuration.
//!
//! Contains listener settings. The session channel shares the HTTP port
//! and is mounted at `{base_path}api`.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 6543                 # Listen port (UI, rendered output, session channel)
//! base_path = "/"             # URL path the server is mounted at
//! ui_dir = "frontend/public"  # Prebuilt frontend files
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// HTTP port number.
    pub port: u16,

    /// URL path the server is mounted at. Starts and ends with `/`.
    pub base_path: String,

    /// Directory holding the prebuilt frontend.
    pub ui_dir: PathBuf,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 6543,
            base_path: "/".to_string(),
            ui_dir: PathBuf::from("frontend/public"),
        }
    }
}

impl ServeConfig {
    /// URL path of the session channel.
    pub fn api_path(&self) -> String {
        format!("{}api", self.base_path)
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            diag.error_with_hint(
                "serve.base_path",
                format!("`{}` must start and end with `/`", self.base_path),
                "use e.g. \"/\" or \"/author/\"",
            );
        }
    }
}
