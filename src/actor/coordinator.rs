//! Actor Coordinator - Wires up the Sync Actor System
//!
//! A thin orchestrator: it creates channels, opens the initial connection,
//! spawns actors and tears them down again. Behavior lives in the actors.
//!
//! ```text
//! FsActor ──> SyncActor <──> ConnectionActor <══> compile service
//!                 │
//!                 └──> WsActor ──> viewers (via ViewerListener)
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::connection::ConnectionActor;
use super::fs::FsActor;
use super::messages::{ConnMsg, SyncMsg, WsMsg};
use super::sync::{SyncActor, SyncOutcome};
use super::ws::WsActor;
use crate::config::AgentConfig;
use crate::preview::{ArtifactSlot, ArtifactWriter, PreviewContext, PreviewServer};
use crate::project::ScanRules;
use crate::sync::PayloadBuilder;

/// Channel buffer size
const CHANNEL_BUFFER: usize = 32;

/// How long actors get to wind down after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Coordinator - wires up and runs the actor system
pub struct Coordinator {
    config: Arc<AgentConfig>,
    /// Optional shutdown signal receiver
    shutdown_rx: Option<Receiver<()>>,
}

/// Handles to the actors every mode runs.
struct Core {
    sync_tx: mpsc::Sender<SyncMsg>,
    conn_tx: mpsc::Sender<ConnMsg>,
    sync_handle: JoinHandle<()>,
    conn_handle: JoinHandle<()>,
}

impl Coordinator {
    /// Create from Arc<AgentConfig>
    pub fn with_config(config: Arc<AgentConfig>) -> Self {
        Self {
            config,
            shutdown_rx: None,
        }
    }

    /// Set shutdown signal receiver
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Connect, run exactly one sync and report how it ended.
    pub async fn run_once(self) -> Result<SyncOutcome> {
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let sync_channel = mpsc::channel::<SyncMsg>(CHANNEL_BUFFER);
        let core = self.start_core(sync_channel, outcome_tx, None).await?;

        let outcome = outcome_rx.recv().await;
        core.stop().await;
        outcome.ok_or_else(|| anyhow!("sync stopped before producing a result"))
    }

    /// Serve viewers and resync on every project change until shutdown.
    pub async fn watch(mut self, preview: PreviewServer) -> Result<()> {
        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);
        let slot = ArtifactSlot::new();

        // watch before the startup sync so no edit slips between the two
        let (sync_tx, sync_rx) = mpsc::channel::<SyncMsg>(CHANNEL_BUFFER);
        let fs_actor = self.watcher(sync_tx.clone())?;

        // outcomes are only shown through the status line in watch mode
        let (outcome_tx, _outcome_rx) = mpsc::unbounded_channel();
        let core = self
            .start_core((sync_tx, sync_rx), outcome_tx, Some(ws_tx.clone()))
            .await?;

        let ws_handle = tokio::spawn(WsActor::new(ws_rx, slot.clone()).run());
        let fs_handle = tokio::spawn(fs_actor.run());
        let http_handle = preview.spawn(PreviewContext {
            slot,
            ws_tx: ws_tx.clone(),
        })?;

        crate::debug!("actor"; "start");
        match self.shutdown_rx.take() {
            Some(rx) => wait_for_signal(rx).await,
            None => std::future::pending().await,
        }

        fs_handle.abort();
        core.stop().await;
        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, ws_handle).await;

        // request loop ends once the shutdown handler unblocks the server
        if http_handle.is_finished() {
            let _ = http_handle.join();
        }
        crate::debug!("actor"; "stopped");
        Ok(())
    }

    /// Start watching the project root. Changes queue until the actor runs.
    fn watcher(&self, sync_tx: mpsc::Sender<SyncMsg>) -> Result<FsActor> {
        FsActor::new(
            self.config.get_root().to_path_buf(),
            ScanRules::from_config(&self.config),
            sync_tx,
            Duration::from_millis(self.config.watch.debounce_ms),
        )
        .map_err(|e| anyhow!("watcher failed: {}", e))
    }

    /// Open the initial connection and spawn the connection and sync actors.
    async fn start_core(
        &self,
        (sync_tx, sync_rx): (mpsc::Sender<SyncMsg>, mpsc::Receiver<SyncMsg>),
        outcome_tx: mpsc::UnboundedSender<SyncOutcome>,
        ws_tx: Option<mpsc::Sender<WsMsg>>,
    ) -> Result<Core> {
        let sync_cfg = &self.config.sync;
        let (conn_tx, conn_rx) = mpsc::channel::<ConnMsg>(CHANNEL_BUFFER);

        let connection = ConnectionActor::connect(
            sync_cfg.server.clone(),
            conn_rx,
            sync_tx.clone(),
            Duration::from_millis(sync_cfg.reconnect_delay_ms),
        )
        .await?;

        let timeout = (sync_cfg.timeout_ms > 0).then(|| Duration::from_millis(sync_cfg.timeout_ms));
        let mut sync_actor = SyncActor::new(
            sync_rx,
            conn_tx.clone(),
            PayloadBuilder::from_config(&self.config),
            ArtifactWriter::new(self.config.output_path()),
        )
        .with_outcomes(outcome_tx)
        .with_timeout(timeout);
        if let Some(ws_tx) = ws_tx {
            sync_actor = sync_actor.with_viewers(ws_tx);
        }

        // sync actor first: the connection announces itself on start
        let sync_handle = tokio::spawn(sync_actor.run());
        let conn_handle = tokio::spawn(connection.run());

        Ok(Core {
            sync_tx,
            conn_tx,
            sync_handle,
            conn_handle,
        })
    }
}

impl Core {
    async fn stop(self) {
        let _ = self.sync_tx.send(SyncMsg::Shutdown).await;
        let _ = self.conn_tx.send(ConnMsg::Shutdown).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.sync_handle).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, self.conn_handle).await;
    }
}

/// Wait for the shutdown signal (poll-based since crossbeam is sync).
async fn wait_for_signal(rx: Receiver<()>) {
    loop {
        if rx.try_recv().is_ok() {
            crate::debug!("actor"; "shutdown signal received");
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tempfile::TempDir;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Loopback service that answers every payload with a fixed pdf.
    async fn fake_service() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(frame)) = ws.next().await {
                if frame.is_text() {
                    let reply = r#"{"type":"compile_success","pdf":"JVBERi0xLjc=","compile_time_ms":42}"#;
                    if ws.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        });
        url
    }

    fn config(root: &std::path::Path, server: String) -> Arc<AgentConfig> {
        let mut config = crate::config::test_parse_config("");
        config.set_root(root);
        config.sync.server = server;
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_run_once_writes_artifact() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("main.tex"), "\\relax").unwrap();
        let url = fake_service().await;

        let outcome = Coordinator::with_config(config(dir.path(), url))
            .run_once()
            .await
            .unwrap();

        let artifact = dir.path().join("output.pdf");
        assert_eq!(
            outcome,
            SyncOutcome::Compiled {
                artifact: artifact.clone(),
                elapsed_ms: 42
            }
        );
        assert_eq!(std::fs::read(artifact).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_edit_during_startup_is_not_lost() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("main.tex"), "v1").unwrap();
        let coordinator = Coordinator::with_config(config(&root, String::new()));

        let (sync_tx, mut sync_rx) = mpsc::channel(CHANNEL_BUFFER);
        let fs_actor = coordinator.watcher(sync_tx).unwrap();

        // edit lands while the startup sync would still be in flight
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(root.join("main.tex"), "v2").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let handle = tokio::spawn(fs_actor.run());
        let msg = tokio::time::timeout(Duration::from_secs(10), sync_rx.recv())
            .await
            .expect("edit was dropped")
            .unwrap();
        assert!(matches!(msg, SyncMsg::Trigger(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_run_once_fails_without_service() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        drop(listener);

        let result = Coordinator::with_config(config(dir.path(), url))
            .run_once()
            .await;
        assert!(result.is_err());
    }
}
