//! Actor Message Definitions
//!
//! Message types for inter-actor communication.
//!
//! ```text
//! FsActor --Trigger--> SyncActor --Send--> ConnectionActor ==ws==> service
//!                         ^  |                    |
//!                         |  +--Reload--> WsActor +--Result/Connected/Disconnected--+
//!                         +---------------------------------------------------------+
//! ```

use std::fmt;
use std::net::TcpStream;
use std::path::PathBuf;

use tungstenite::WebSocket;

use crate::sync::CompileResult;

// =============================================================================
// SyncActor Messages
// =============================================================================

/// What asked for a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerReason {
    /// First sync after the connection opened.
    Startup,
    /// Debounced batch of changed project files.
    FileChange(Vec<PathBuf>),
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::FileChange(paths) => match paths.as_slice() {
                [one] => write!(f, "{}", one.display()),
                many => write!(f, "{} files changed", many.len()),
            },
        }
    }
}

/// Messages to Sync Actor (the compile coordinator)
#[derive(Debug)]
pub enum SyncMsg {
    /// Start a sync unless one is outstanding or the link is down
    Trigger(TriggerReason),
    /// Link to the service is open
    Connected,
    /// Link to the service closed; any outstanding sync is abandoned
    Disconnected,
    /// The service answered the outstanding sync
    Result(CompileResult),
    /// Shutdown
    Shutdown,
}

// =============================================================================
// ConnectionActor Messages
// =============================================================================

/// Messages to Connection Actor
#[derive(Debug)]
pub enum ConnMsg {
    /// Send one text frame (a serialized payload)
    Send(String),
    /// Drop the current link and reconnect
    Reset,
    /// Shutdown
    Shutdown,
}

// =============================================================================
// WsActor Messages
// =============================================================================

/// Server side of one viewer's WebSocket (non-blocking after the handshake).
pub type ViewerSocket = WebSocket<TcpStream>;

/// Messages to WebSocket Actor (the notification bus)
pub enum WsMsg {
    /// Register a viewer that completed the handshake
    AddViewer(ViewerSocket),
    /// A new artifact is in place; tell every viewer to reload
    Reload { artifact: PathBuf },
    /// Shutdown
    Shutdown,
}

impl fmt::Debug for WsMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddViewer(_) => f.write_str("AddViewer(..)"),
            Self::Reload { artifact } => f
                .debug_struct("Reload")
                .field("artifact", artifact)
                .finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_reason_display() {
        assert_eq!(TriggerReason::Startup.to_string(), "startup");
        assert_eq!(
            TriggerReason::FileChange(vec![PathBuf::from("main.tex")]).to_string(),
            "main.tex"
        );
        assert_eq!(
            TriggerReason::FileChange(vec!["a.tex".into(), "b.png".into()]).to_string(),
            "2 files changed"
        );
    }
}
