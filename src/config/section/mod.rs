//! Configuration section definitions.
//!
//! Each module corresponds to a section in `qtex.toml`:
//!
//! | Module  | TOML Section | Purpose                                 |
//! |---------|--------------|-----------------------------------------|
//! | `serve` | `[serve]`    | Preview server interface and base port  |
//! | `sync`  | `[sync]`     | Compile service, entry point, output    |
//! | `watch` | `[watch]`    | File watcher debounce                   |

mod serve;
mod sync;
mod watch;

pub use serve::ServeConfig;
pub use sync::{DEFAULT_SERVER, SyncConfig};
pub use watch::WatchConfig;
