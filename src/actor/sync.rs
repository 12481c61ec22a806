//! Sync Actor - Single-Flight Compile Coordinator
//!
//! At most one payload is outstanding at any time. The service answers
//! without a correlation id, so the next result always belongs to the
//! payload in flight. Triggers arriving while busy or offline are dropped,
//! not queued: the next accepted trigger rescans the disk and so carries
//! every change made in between.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::messages::{ConnMsg, SyncMsg, TriggerReason, WsMsg};
use crate::logger::{status_error, status_success, status_warning};
use crate::preview::ArtifactWriter;
use crate::sync::{CompileResult, PayloadBuilder};
use crate::{debug, log};

/// How a sync attempt ended, for callers waiting on it (one-shot mode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Compiled { artifact: PathBuf, elapsed_ms: u64 },
    Failed(String),
    /// The link dropped before the service answered.
    Abandoned,
}

/// The payload currently awaiting a result.
#[derive(Debug)]
struct InFlight {
    deadline: Option<Instant>,
    files: usize,
    cached: usize,
}

/// Sync Actor - builds payloads and resolves results
pub struct SyncActor {
    rx: mpsc::Receiver<SyncMsg>,
    conn_tx: mpsc::Sender<ConnMsg>,
    ws_tx: Option<mpsc::Sender<WsMsg>>,
    outcome_tx: Option<mpsc::UnboundedSender<SyncOutcome>>,
    builder: PayloadBuilder,
    writer: ArtifactWriter,
    timeout: Option<Duration>,
    connected: bool,
    ever_connected: bool,
    in_flight: Option<InFlight>,
}

impl SyncActor {
    pub fn new(
        rx: mpsc::Receiver<SyncMsg>,
        conn_tx: mpsc::Sender<ConnMsg>,
        builder: PayloadBuilder,
        writer: ArtifactWriter,
    ) -> Self {
        Self {
            rx,
            conn_tx,
            ws_tx: None,
            outcome_tx: None,
            builder,
            writer,
            timeout: None,
            connected: false,
            ever_connected: false,
            in_flight: None,
        }
    }

    /// Forward new artifacts to the notification bus.
    pub fn with_viewers(mut self, ws_tx: mpsc::Sender<WsMsg>) -> Self {
        self.ws_tx = Some(ws_tx);
        self
    }

    /// Report every finished attempt on `tx`.
    pub fn with_outcomes(mut self, tx: mpsc::UnboundedSender<SyncOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    /// Resolve an unanswered sync as failed after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        loop {
            let deadline = self.in_flight.as_ref().and_then(|f| f.deadline);
            tokio::select! {
                msg = self.rx.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.handle(msg).await {
                        break;
                    }
                }
                _ = sleep_until(deadline) => self.expire().await,
            }
        }
    }

    /// Process one message. Returns `false` on shutdown.
    pub(crate) async fn handle(&mut self, msg: SyncMsg) -> bool {
        match msg {
            SyncMsg::Trigger(reason) => self.trigger(reason).await,
            SyncMsg::Connected => {
                self.connected = true;
                if !self.ever_connected {
                    self.ever_connected = true;
                    self.trigger(TriggerReason::Startup).await;
                }
            }
            SyncMsg::Disconnected => {
                self.connected = false;
                if self.in_flight.take().is_some() {
                    status_warning("connection lost, pending sync abandoned");
                    self.report(SyncOutcome::Abandoned);
                }
            }
            SyncMsg::Result(result) => self.resolve(result).await,
            SyncMsg::Shutdown => {
                debug!("sync"; "shutting down");
                return false;
            }
        }
        true
    }

    async fn trigger(&mut self, reason: TriggerReason) {
        if !self.connected {
            debug!("sync"; "offline, skipping ({})", reason);
            return;
        }
        if self.in_flight.is_some() {
            debug!("sync"; "busy, dropping ({})", reason);
            return;
        }

        // nothing has been sent yet, so a failed build leaves the guard open
        let payload = match self.builder.build() {
            Ok(payload) => payload,
            Err(e) => return self.fail("sync aborted", anyhow::Error::from(e)),
        };
        let frame = match payload.to_json() {
            Ok(frame) => frame,
            Err(e) => return self.fail("sync aborted", anyhow::Error::from(e)),
        };

        let files = payload.files.len();
        let cached = payload.cached_count();
        log!("sync"; "{}: sending {} files ({} cached)", reason, files, cached);

        self.in_flight = Some(InFlight {
            deadline: self.timeout.map(|t| Instant::now() + t),
            files,
            cached,
        });
        if self.conn_tx.send(ConnMsg::Send(frame)).await.is_err() {
            self.in_flight = None;
            self.fail("sync aborted", anyhow::anyhow!("connection actor is gone"));
        }
    }

    async fn resolve(&mut self, result: CompileResult) {
        let Some(flight) = self.in_flight.take() else {
            debug!("sync"; "result without an outstanding sync, ignored");
            return;
        };

        match result {
            CompileResult::Success {
                artifact,
                elapsed_ms,
                confirmed,
            } => {
                self.builder.absorb_confirmations(&confirmed);
                match self.writer.persist(&artifact) {
                    Ok(path) => {
                        status_success(&format!(
                            "pdf updated in {}ms ({}/{} cached)",
                            elapsed_ms, flight.cached, flight.files
                        ));
                        if let Some(ws_tx) = &self.ws_tx {
                            let _ = ws_tx
                                .send(WsMsg::Reload {
                                    artifact: path.clone(),
                                })
                                .await;
                        }
                        self.report(SyncOutcome::Compiled {
                            artifact: path,
                            elapsed_ms,
                        });
                    }
                    Err(e) => self.fail("cannot write pdf", anyhow::Error::from(e)),
                }
            }
            CompileResult::Failure { message } => {
                status_error("compilation failed", &message);
                self.report(SyncOutcome::Failed(message));
            }
        }
    }

    /// The deadline passed without a result: fail it and start over.
    async fn expire(&mut self) {
        if self.in_flight.take().is_none() {
            return;
        }
        let timeout = self.timeout.unwrap_or_default();
        self.fail(
            "compilation failed",
            anyhow::anyhow!("timed out after {}ms", timeout.as_millis()),
        );

        // a late answer would be mistaken for the next payload's result
        self.connected = false;
        let _ = self.conn_tx.send(ConnMsg::Reset).await;
    }

    fn fail(&mut self, summary: &str, error: anyhow::Error) {
        let detail = format!("{error:#}");
        status_error(summary, &detail);
        self.report(SyncOutcome::Failed(detail));
    }

    fn report(&self, outcome: SyncOutcome) {
        if let Some(tx) = &self.outcome_tx {
            let _ = tx.send(outcome);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
