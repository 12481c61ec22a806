//! One-shot mode: sync once, write the PDF, exit.

use std::sync::Arc;

use anyhow::{Result, bail};

use crate::actor::{Coordinator, SyncOutcome};
use crate::config::AgentConfig;
use crate::log;

pub fn compile_once(config: Arc<AgentConfig>, rt: &tokio::runtime::Runtime) -> Result<()> {
    log!("sync"; "compiling {}", config.get_root().display());

    match rt.block_on(Coordinator::with_config(config).run_once())? {
        SyncOutcome::Compiled { artifact, .. } => {
            crate::logger::status_detach();
            log!("sync"; "wrote {}", artifact.display());
            Ok(())
        }
        SyncOutcome::Failed(_) => bail!("compilation failed"),
        SyncOutcome::Abandoned => bail!("connection to the compile service was lost"),
    }
}
