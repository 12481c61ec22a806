//! Incremental project synchronization.
//!
//! ```text
//! scan ─> hash ─> HashCache lookup ─> SyncPayload ─> JSON frame
//!                      ^                                 |
//!                      └──── confirmed blob ids <────────┘ (compile_success)
//! ```
//!
//! - `hash` - blake3 content hashes
//! - `cache` - per-path local/confirmed hash records
//! - `payload` - payload construction (inline vs. cache reference)
//! - `protocol` - JSON wire format in both directions

mod cache;
mod hash;
mod payload;
mod protocol;

use std::path::PathBuf;

use thiserror::Error;

pub use cache::HashCache;
pub use hash::ContentHash;
pub use payload::{FileEntry, PayloadBuilder, SyncPayload};
pub use protocol::{CompileResult, parse_server_message};

use crate::project::ScanError;

/// Errors that abort a single sync attempt before anything is sent.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("cannot read `{}`", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode sync payload")]
    Encode(#[from] serde_json::Error),
}
