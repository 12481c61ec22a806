//! Viewer channel listener.
//!
//! Viewers keep a WebSocket open on a listener of its own, next to the HTTP
//! server. tiny_http only hands out upgraded connections as opaque blocking
//! streams; sockets accepted here can be switched to non-blocking so the
//! notification bus polls them without ever stalling.

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::actor::messages::{ViewerSocket, WsMsg};
use crate::{debug, log};

/// Sleep between accept attempts when no viewer is waiting.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// Upper bound for a client to finish the opening handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound viewer listener, not yet accepting.
pub struct ViewerListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl ViewerListener {
    /// Bind an OS-assigned port on `interface`.
    pub fn bind(interface: IpAddr) -> Result<Self> {
        let listener = TcpListener::bind((interface, 0))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept viewers on a background thread and hand them to the bus.
    ///
    /// Stops on shutdown or once the bus has gone away.
    pub fn spawn(self, ws_tx: mpsc::Sender<WsMsg>) -> Result<JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name("qtex-viewers".into())
            .spawn(move || accept_loop(&self.listener, &ws_tx))?;
        Ok(handle)
    }
}

fn accept_loop(listener: &TcpListener, ws_tx: &mpsc::Sender<WsMsg>) {
    while !crate::core::is_shutdown() && !ws_tx.is_closed() {
        match listener.accept() {
            Ok((stream, addr)) => {
                debug!("ws"; "viewer connecting from {}", addr);
                let Some(socket) = handshake(stream) else {
                    continue;
                };
                if ws_tx.blocking_send(WsMsg::AddViewer(socket)).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                log!("ws"; "accept error: {}", e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    debug!("ws"; "viewer listener stopped");
}

/// Run the opening handshake in blocking mode, then go non-blocking.
fn handshake(stream: TcpStream) -> Option<ViewerSocket> {
    let prepared = stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)));
    if let Err(e) = prepared {
        debug!("ws"; "cannot prepare viewer socket: {}", e);
        return None;
    }

    let socket = match tungstenite::accept(stream) {
        Ok(socket) => socket,
        Err(e) => {
            log!("ws"; "handshake failed: {}", e);
            return None;
        }
    };

    let ready = socket
        .get_ref()
        .set_read_timeout(None)
        .and_then(|()| socket.get_ref().set_nonblocking(true));
    match ready {
        Ok(()) => Some(socket),
        Err(e) => {
            debug!("ws"; "cannot switch viewer socket to non-blocking: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tungstenite::protocol::Message;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn test_upgrade_registers_nonblocking_viewer() {
        let (ws_tx, mut ws_rx) = mpsc::channel(8);
        let listener = ViewerListener::bind(LOCALHOST).unwrap();
        let addr = listener.addr();
        listener.spawn(ws_tx).unwrap();

        let (_client, resp) = tungstenite::connect(format!("ws://{addr}/")).unwrap();
        assert_eq!(resp.status(), 101);

        let Some(WsMsg::AddViewer(mut socket)) = ws_rx.blocking_recv() else {
            panic!("expected a viewer registration");
        };
        // nothing sent yet: a read must not block
        match socket.read() {
            Err(tungstenite::Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::WouldBlock),
            other => panic!("unexpected {other:?}"),
        }
        socket.send(Message::Text("{}".into())).unwrap();
    }

    #[test]
    fn test_plain_request_is_not_registered() {
        use std::io::Write as _;

        let (ws_tx, mut ws_rx) = mpsc::channel(8);
        let listener = ViewerListener::bind(LOCALHOST).unwrap();
        let addr = listener.addr();
        listener.spawn(ws_tx).unwrap();

        let mut plain = TcpStream::connect(addr).unwrap();
        write!(plain, "GET / HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        drop(plain);

        // a real viewer after the failed handshake still gets through
        let (_client, _) = tungstenite::connect(format!("ws://{addr}/")).unwrap();
        assert!(matches!(ws_rx.blocking_recv(), Some(WsMsg::AddViewer(_))));
        assert!(ws_rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_stops_when_bus_is_gone() {
        let (ws_tx, ws_rx) = mpsc::channel(8);
        let listener = ViewerListener::bind(LOCALHOST).unwrap();
        let handle = listener.spawn(ws_tx).unwrap();
        drop(ws_rx);

        for _ in 0..50 {
            if handle.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(handle.is_finished());
    }
}
