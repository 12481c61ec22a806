//! `[watch]` section configuration.
//!
//! ```toml
//! [watch]
//! debounce_ms = 300   # quiet period before a burst of changes triggers a sync
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}
