//! WebSocket Actor - Viewer Notification Bus
//!
//! Owns the registry of connected viewers and the "current artifact"
//! reference. Only this task touches the registry, so registration and
//! broadcast never race.
//!
//! ```text
//! ViewerListener --[AddViewer]--> WsActor <--[Reload]-- SyncActor
//!                                   |
//!                                   +--{"type":"reload"}--> viewers
//! ```
//!
//! Viewer sockets are non-blocking. Reads are polled on a short tick so
//! closed viewers leave the registry promptly and their close handshake
//! is answered.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tungstenite::protocol::Message;

use super::messages::{ViewerSocket, WsMsg};
use crate::preview::ArtifactSlot;

/// How often idle viewers are pinged to detect dead sockets.
const KEEPALIVE: Duration = Duration::from_secs(30);

/// How often viewer sockets are read.
const READ_POLL: Duration = Duration::from_millis(100);

/// Messages pushed to viewers.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ViewerMessage {
    Connected { version: &'static str },
    Reload,
}

impl ViewerMessage {
    fn to_frame(&self) -> Message {
        // unit and string-only variants always serialize
        let json = serde_json::to_string(self).unwrap_or_default();
        Message::Text(json.into())
    }
}

/// One registered viewer connection.
struct ViewerHandle {
    id: u64,
    ws: ViewerSocket,
}

/// WebSocket Actor - fans artifact updates out to viewers
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    slot: ArtifactSlot,
    viewers: Vec<ViewerHandle>,
    next_id: u64,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>, slot: ArtifactSlot) -> Self {
        Self {
            rx,
            slot,
            viewers: Vec::new(),
            next_id: 0,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut keepalive = tokio::time::interval(KEEPALIVE);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut reads = tokio::time::interval(READ_POLL);
        reads.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    let Some(msg) = msg else { break };
                    if !self.handle(msg) {
                        break;
                    }
                }
                _ = keepalive.tick() => self.ping(),
                _ = reads.tick() => self.poll_viewers(),
            }
        }
        self.close_all();
    }

    /// Process one message. Returns `false` on shutdown.
    fn handle(&mut self, msg: WsMsg) -> bool {
        match msg {
            WsMsg::AddViewer(ws) => self.add_viewer(ws),
            WsMsg::Reload { artifact } => self.notify(artifact),
            WsMsg::Shutdown => {
                crate::debug!("ws"; "shutting down");
                return false;
            }
        }
        true
    }

    fn add_viewer(&mut self, mut ws: ViewerSocket) {
        let hello = ViewerMessage::Connected {
            version: env!("CARGO_PKG_VERSION"),
        };
        if let Err(e) = deliver(&mut ws, hello.to_frame()) {
            crate::debug!("ws"; "viewer dropped during hello: {}", e);
            return;
        }

        self.next_id += 1;
        self.viewers.push(ViewerHandle {
            id: self.next_id,
            ws,
        });
        crate::debug!("ws"; "viewer {} connected (total: {})", self.next_id, self.viewers.len());
    }

    /// Publish `artifact` as current, then tell every registered viewer.
    fn notify(&mut self, artifact: PathBuf) {
        self.slot.set(artifact);
        self.broadcast(ViewerMessage::Reload.to_frame());
    }

    /// Broadcast a message to all connected viewers
    fn broadcast(&mut self, msg: Message) {
        let count = self.viewers.len();
        if count == 0 {
            crate::debug!("ws"; "no viewers connected");
            return;
        }

        self.viewers.retain_mut(|viewer| match deliver(&mut viewer.ws, msg.clone()) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("ws"; "viewer {} disconnected: {}", viewer.id, e);
                false
            }
        });
        crate::debug!("ws"; "reload sent to {} of {} viewers", self.viewers.len(), count);
    }

    fn ping(&mut self) {
        self.viewers
            .retain_mut(|viewer| deliver(&mut viewer.ws, Message::Ping(Default::default())).is_ok());
    }

    /// Drain whatever each viewer sent and drop the ones that went away.
    ///
    /// Viewers never send anything meaningful; reading still has to happen
    /// so pongs are consumed and close frames get their reply.
    fn poll_viewers(&mut self) {
        let before = self.viewers.len();
        self.viewers.retain_mut(|viewer| loop {
            match viewer.ws.read() {
                Ok(Message::Close(_)) => {
                    // the reply is queued by `read`, push it out
                    let _ = viewer.ws.flush();
                    crate::debug!("ws"; "viewer {} closed", viewer.id);
                    break false;
                }
                Ok(_) => continue,
                Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    break true;
                }
                Err(e) => {
                    crate::debug!("ws"; "viewer {} disconnected: {}", viewer.id, e);
                    break false;
                }
            }
        });
        if self.viewers.len() != before {
            crate::debug!("ws"; "viewers remaining: {}", self.viewers.len());
        }
    }

    fn close_all(&mut self) {
        for mut viewer in self.viewers.drain(..) {
            let _ = viewer.ws.close(None);
            let _ = viewer.ws.flush();
        }
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.len()
    }
}

/// Send a frame without blocking.
///
/// A full socket buffer leaves the frame queued inside tungstenite; the
/// next write or flush picks it up, so the viewer still counts as alive.
fn deliver(ws: &mut ViewerSocket, msg: Message) -> tungstenite::Result<()> {
    match ws.send(msg) {
        Err(tungstenite::Error::Io(ref e)) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};
    use tungstenite::protocol::{Role, WebSocket};
    use tempfile::TempDir;

    /// A connected (server, client) pair over loopback TCP.
    fn socket_pair() -> (ViewerSocket, WebSocket<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        (
            WebSocket::from_raw_socket(server, Role::Server, None),
            WebSocket::from_raw_socket(client, Role::Client, None),
        )
    }

    fn read_json(client: &mut WebSocket<TcpStream>) -> serde_json::Value {
        loop {
            match client.read().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    fn actor() -> (WsActor, ArtifactSlot) {
        let (_tx, rx) = mpsc::channel(4);
        let slot = ArtifactSlot::new();
        (WsActor::new(rx, slot.clone()), slot)
    }

    #[test]
    fn test_new_viewer_gets_hello() {
        let (mut actor, _) = actor();
        let (server, mut client) = socket_pair();

        assert!(actor.handle(WsMsg::AddViewer(server)));
        assert_eq!(actor.viewer_count(), 1);

        let hello = read_json(&mut client);
        assert_eq!(hello["type"], "connected");
        assert_eq!(hello["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_reload_reaches_only_registered_viewers() {
        let dir = TempDir::new().unwrap();
        let (mut actor, slot) = actor();

        let (early_server, mut early) = socket_pair();
        actor.handle(WsMsg::AddViewer(early_server));
        read_json(&mut early);

        let artifact = dir.path().join("output.pdf");
        actor.handle(WsMsg::Reload {
            artifact: artifact.clone(),
        });
        assert_eq!(slot.current().as_deref(), Some(&artifact));

        let (late_server, mut late) = socket_pair();
        actor.handle(WsMsg::AddViewer(late_server));

        assert_eq!(read_json(&mut early)["type"], "reload");
        // the late viewer only ever sees its hello
        assert_eq!(read_json(&mut late)["type"], "connected");
        late.get_mut()
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        assert!(late.read().is_err());
    }

    #[test]
    fn test_dead_viewer_is_dropped() {
        let (mut actor, _) = actor();
        let (server, client) = socket_pair();
        actor.handle(WsMsg::AddViewer(server));
        drop(client);

        // the first writes may still land in the kernel buffer
        for _ in 0..50 {
            actor.handle(WsMsg::Reload {
                artifact: PathBuf::from("output.pdf"),
            });
            if actor.viewer_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(actor.viewer_count(), 0);
    }

    #[test]
    fn test_closed_viewer_is_removed() {
        let (mut actor, _) = actor();
        let (server, mut client) = socket_pair();
        actor.handle(WsMsg::AddViewer(server));
        read_json(&mut client);

        client.close(None).unwrap();
        client.flush().unwrap();

        for _ in 0..25 {
            actor.poll_viewers();
            if actor.viewer_count() == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(actor.viewer_count(), 0);

        // the close handshake was answered
        loop {
            match client.read() {
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => panic!("no close reply: {e}"),
            }
        }
    }

    #[test]
    fn test_idle_viewer_survives_polling() {
        let (mut actor, _) = actor();
        let (server, mut client) = socket_pair();
        actor.handle(WsMsg::AddViewer(server));
        read_json(&mut client);

        client.send(Message::Text("hello".into())).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        actor.poll_viewers();
        actor.poll_viewers();
        assert_eq!(actor.viewer_count(), 1);
    }

    #[tokio::test]
    async fn test_run_answers_viewer_close() {
        let (tx, rx) = mpsc::channel(4);
        let task = tokio::spawn(WsActor::new(rx, ArtifactSlot::new()).run());

        let (server, mut client) = socket_pair();
        tx.send(WsMsg::AddViewer(server)).await.unwrap();

        let reply = tokio::task::spawn_blocking(move || {
            read_json(&mut client);
            client.close(None).unwrap();
            client.flush().unwrap();
            loop {
                match client.read() {
                    Ok(Message::Close(_)) => return true,
                    Ok(_) => continue,
                    Err(_) => return false,
                }
            }
        })
        .await
        .unwrap();
        assert!(reply);

        tx.send(WsMsg::Shutdown).await.unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_shutdown_stops_actor() {
        let (mut actor, _) = actor();
        assert!(!actor.handle(WsMsg::Shutdown));
    }
}
