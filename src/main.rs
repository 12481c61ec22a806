//! qtex - live LaTeX sync agent.
//!
//! Streams a project directory to a remote compile service over a
//! persistent WebSocket and previews the returned PDF locally.

#![allow(dead_code)]

mod actor;
mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod preview;
mod project;
mod sync;

use std::sync::Arc;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::AgentConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = Arc::new(AgentConfig::load(&cli)?);
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    if cli.watch {
        cli::watch::serve_and_watch(config, &rt)
    } else {
        cli::once::compile_once(config, &rt)
    }
}
