//! Command-line interface module.

mod args;
pub mod once;
pub mod watch;

pub use args::Cli;
