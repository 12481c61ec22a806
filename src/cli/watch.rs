//! Watch mode: live preview server plus continuous sync.

use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel;

use crate::actor::Coordinator;
use crate::config::AgentConfig;
use crate::preview::PreviewServer;
use crate::{core::register_server, log};

/// Bind the preview server, then run the actor system until Ctrl+C.
pub fn serve_and_watch(config: Arc<AgentConfig>, rt: &tokio::runtime::Runtime) -> Result<()> {
    let serve = &config.serve;
    let preview = PreviewServer::bind(serve.interface, serve.port, serve.max_port_retries)?;

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(preview.handle(), shutdown_tx);

    log!("serve"; "viewer at http://{}/view", preview.addr());
    log!("watch"; "watching {}", config.get_root().display());

    rt.block_on(
        Coordinator::with_config(config)
            .with_shutdown_signal(shutdown_rx)
            .watch(preview),
    )
}
