//! Server lifecycle and request routing.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use tiny_http::{Request, Server};
use tokio::sync::mpsc;

use super::artifact::ArtifactSlot;
use super::response;
use super::viewers::ViewerListener;
use crate::actor::messages::WsMsg;
use crate::{debug, log};

/// Requests are served from a small pool so a slow `/pdf` download
/// never stalls the viewer page.
const REQUEST_THREADS: usize = 4;

/// Bind to `interface:base_port`, moving up one port per conflict.
pub fn bind_with_retry(
    interface: IpAddr,
    base_port: u16,
    max_attempts: u16,
) -> Result<(Server, SocketAddr)> {
    let attempts = max_attempts.max(1);
    for offset in 0..attempts {
        let Some(port) = base_port.checked_add(offset) else {
            break;
        };
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                // port 0 asks the OS for a free port; report the real one
                let addr = server.server_addr().to_ip().unwrap_or(addr);
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                return Ok((server, addr));
            }
            Err(e) if offset + 1 < attempts => {
                debug!("serve"; "cannot bind {}: {}", addr, e);
            }
            Err(e) => {
                return Err(anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    attempts,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    Err(anyhow!("no port available at or above {}", base_port))
}

/// Shared state every request handler needs.
#[derive(Clone)]
pub struct PreviewContext {
    pub slot: ArtifactSlot,
    /// Viewer registrations go to the notification bus.
    pub ws_tx: mpsc::Sender<WsMsg>,
}

/// Bound HTTP server plus its viewer channel, ready to accept.
pub struct PreviewServer {
    server: Arc<Server>,
    addr: SocketAddr,
    viewers: ViewerListener,
}

impl PreviewServer {
    pub fn bind(interface: IpAddr, base_port: u16, max_attempts: u16) -> Result<Self> {
        let (server, addr) = bind_with_retry(interface, base_port, max_attempts)?;
        let viewers = ViewerListener::bind(interface)?;
        debug!("serve"; "viewer channel at ws://{}", viewers.addr());
        Ok(Self {
            server: Arc::new(server),
            addr,
            viewers,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn viewer_addr(&self) -> SocketAddr {
        self.viewers.addr()
    }

    /// Handle used to unblock the request loop on shutdown.
    pub fn handle(&self) -> Arc<Server> {
        Arc::clone(&self.server)
    }

    /// Run the request loop and the viewer listener on background threads.
    ///
    /// The request loop ends once [`Server::unblock`] is called on
    /// [`Self::handle`]; the viewer listener stops with the notification bus.
    pub fn spawn(self, ctx: PreviewContext) -> Result<JoinHandle<()>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(REQUEST_THREADS)
            .thread_name(|i| format!("qtex-http-{i}"))
            .build()?;

        let viewer_port = self.viewers.addr().port();
        self.viewers.spawn(ctx.ws_tx.clone())?;

        let server = self.server;
        let handle = thread::Builder::new()
            .name("qtex-http".into())
            .spawn(move || {
                for request in server.incoming_requests() {
                    let ctx = ctx.clone();
                    pool.spawn(move || {
                        if let Err(e) = handle_request(request, &ctx, viewer_port) {
                            log!("serve"; "request error: {e}");
                        }
                    });
                }
                debug!("serve"; "request loop stopped");
            })?;
        Ok(handle)
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, ctx: &PreviewContext, viewer_port: u16) -> Result<()> {
    if crate::core::is_shutdown() {
        return response::respond_unavailable(request);
    }

    let path = request
        .url()
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();

    match path.as_str() {
        "/" => response::respond_alive(request),
        "/view" => response::respond_view(request, viewer_port),
        "/pdf" => response::respond_artifact(request, &ctx.slot),
        _ => response::respond_not_found(request),
    }
}
