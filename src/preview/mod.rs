//! Local preview server.
//!
//! | Path    | Response                                             |
//! |---------|------------------------------------------------------|
//! | `/`     | liveness text                                        |
//! | `/view` | viewer page (PDF iframe + live-reload client)        |
//! | `/pdf`  | latest artifact with caching disabled, 404 before it |
//!
//! Viewers hold their WebSocket on a second, OS-assigned port whose number
//! is baked into the `/view` page.

mod artifact;
mod response;
mod server;
mod viewers;

pub use artifact::{ArtifactSlot, ArtifactWriter};
pub use server::{PreviewContext, PreviewServer};
