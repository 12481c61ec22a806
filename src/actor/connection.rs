//! Connection Actor - Link to the Remote Compile Service
//!
//! Owns the single WebSocket to the service and its state machine:
//!
//! ```text
//! Disconnected --connect--> Connecting --open--> Connected
//!      ^                                             |
//!      +--(fixed delay)<------ close / error --------+
//! ```
//!
//! Only the very first connection attempt can fail the command. Once the
//! link has been up, every close schedules another attempt after the same
//! fixed delay, forever, until shutdown.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::messages::{ConnMsg, SyncMsg};
use crate::sync::parse_server_message;
use crate::{debug, log};

type ServiceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One wake-up of the main loop.
enum Event {
    Command(Option<ConnMsg>),
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
}

/// Connection Actor - sends payloads, dispatches results
pub struct ConnectionActor {
    url: String,
    rx: mpsc::Receiver<ConnMsg>,
    sync_tx: mpsc::Sender<SyncMsg>,
    reconnect_delay: Duration,
    state: ConnectionState,
    socket: Option<ServiceSocket>,
}

impl ConnectionActor {
    /// Open the initial connection.
    ///
    /// Resolves only once the link is open; failure here is final.
    pub async fn connect(
        url: impl Into<String>,
        rx: mpsc::Receiver<ConnMsg>,
        sync_tx: mpsc::Sender<SyncMsg>,
        reconnect_delay: Duration,
    ) -> Result<Self> {
        let mut actor = Self {
            url: url.into(),
            rx,
            sync_tx,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            socket: None,
        };

        actor.set_state(ConnectionState::Connecting);
        let (socket, _) = tokio_tungstenite::connect_async(actor.url.as_str())
            .await
            .with_context(|| format!("cannot connect to compile service at {}", actor.url))?;
        actor.socket = Some(socket);
        actor.set_state(ConnectionState::Connected);
        log!("conn"; "connected to {}", actor.url);
        Ok(actor)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        self.notify(SyncMsg::Connected).await;

        loop {
            let Some(socket) = self.socket.as_mut() else {
                if self.reconnect().await {
                    continue;
                }
                break;
            };

            let event = tokio::select! {
                msg = self.rx.recv() => Event::Command(msg),
                frame = socket.next() => Event::Frame(frame),
            };

            match event {
                Event::Command(None | Some(ConnMsg::Shutdown)) => {
                    debug!("conn"; "shutting down");
                    if let Some(mut socket) = self.socket.take() {
                        let _ = socket.close(None).await;
                    }
                    break;
                }
                Event::Command(Some(ConnMsg::Send(text))) => {
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        self.drop_link(&format!("send failed: {e}")).await;
                    }
                }
                Event::Command(Some(ConnMsg::Reset)) => {
                    let _ = socket.close(None).await;
                    self.drop_link("reset").await;
                }
                Event::Frame(Some(Ok(Message::Text(text)))) => match parse_server_message(&text) {
                    Some(result) => self.notify(SyncMsg::Result(result)).await,
                    None => debug!("conn"; "ignoring message: {}", truncate(&text, 80)),
                },
                Event::Frame(Some(Ok(Message::Close(_))) | None) => {
                    self.drop_link("closed by service").await;
                }
                // ping/pong are answered by tungstenite; binary is not part of the protocol
                Event::Frame(Some(Ok(_))) => {}
                Event::Frame(Some(Err(e))) => {
                    self.drop_link(&e.to_string()).await;
                }
            }
        }
    }

    /// Forget the socket and tell the coordinator the link is down.
    async fn drop_link(&mut self, reason: &str) {
        self.socket = None;
        self.set_state(ConnectionState::Disconnected);
        log!(
            "conn";
            "connection lost ({}), reconnecting in {}ms",
            reason,
            self.reconnect_delay.as_millis()
        );
        self.notify(SyncMsg::Disconnected).await;
    }

    /// Wait the fixed delay, then try once to reconnect.
    ///
    /// Frames queued while offline are dropped. Returns `false` on shutdown.
    async fn reconnect(&mut self) -> bool {
        let delay = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                msg = self.rx.recv() => match msg {
                    None | Some(ConnMsg::Shutdown) => return false,
                    Some(ConnMsg::Send(_)) => debug!("conn"; "offline, dropping frame"),
                    Some(ConnMsg::Reset) => {}
                },
            }
        }

        self.set_state(ConnectionState::Connecting);
        let attempt = tokio_tungstenite::connect_async(self.url.clone());
        tokio::pin!(attempt);
        let outcome = loop {
            tokio::select! {
                outcome = &mut attempt => break outcome,
                msg = self.rx.recv() => match msg {
                    None | Some(ConnMsg::Shutdown) => return false,
                    Some(_) => debug!("conn"; "connecting, dropping command"),
                },
            }
        };

        match outcome {
            Ok((socket, _)) => {
                self.socket = Some(socket);
                self.set_state(ConnectionState::Connected);
                log!("conn"; "reconnected to {}", self.url);
                self.notify(SyncMsg::Connected).await;
            }
            Err(e) => {
                debug!("conn"; "reconnect failed: {}", e);
                self.set_state(ConnectionState::Disconnected);
            }
        }
        true
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("conn"; "{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    async fn notify(&self, msg: SyncMsg) {
        if self.sync_tx.send(msg).await.is_err() {
            debug!("conn"; "sync actor is gone");
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
