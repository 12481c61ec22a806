//! Actor System for Live Sync
//!
//! Message-passing concurrency: every piece of mutable state (connection,
//! single-flight guard, hash cache, viewer registry) is owned by exactly one
//! task and only reached through its channel.
//!
//! ```text
//! FsActor --> SyncActor <--> ConnectionActor
//! (watch)    (single-flight)   (service link)
//!                 |
//!                 +--> WsActor (viewer broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `connection` - WebSocket link to the compile service, reconnects
//! - `sync` - Payload building and result handling, one at a time
//! - `ws` - Viewer registry and reload broadcast
//! - `coordinator` - Wires up and runs actors

pub mod connection;
pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod sync;
pub mod ws;

pub use coordinator::Coordinator;
pub use sync::SyncOutcome;
