//! `[sync]` section configuration.
//!
//! Controls the connection to the remote compile service and what the
//! agent sends to it.
//!
//! # Example
//!
//! ```toml
//! [sync]
//! server = "wss://latex.taptapp.xyz/ws"
//! main = "main.tex"               # entry-point file name
//! output = "output.pdf"           # artifact written into the project root
//! reconnect_delay_ms = 2000       # fixed delay between reconnect attempts
//! timeout_ms = 0                  # 0 = wait for a result indefinitely
//! ignore = ["node_modules"]       # directory names never scanned
//! ```

use serde::{Deserialize, Serialize};

/// Production endpoint of the live compile service.
pub const DEFAULT_SERVER: &str = "wss://latex.taptapp.xyz/ws";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// WebSocket URL of the compile service.
    pub server: String,

    /// Base name of the document entry point.
    pub main: String,

    /// File name of the compiled artifact, relative to the project root.
    pub output: String,

    /// Delay before each reconnect attempt after the link drops.
    pub reconnect_delay_ms: u64,

    /// Deadline for an outstanding sync; `0` disables it.
    pub timeout_ms: u64,

    /// Directory names skipped while scanning (dot-directories always are).
    pub ignore: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            main: "main.tex".to_string(),
            output: "output.pdf".to_string(),
            reconnect_delay_ms: 2000,
            timeout_ms: 0,
            ignore: vec!["node_modules".to_string()],
        }
    }
}
