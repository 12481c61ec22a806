//! HTTP response handlers.

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::artifact::ArtifactSlot;

mod mime {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const PDF: &str = "application/pdf";
}

/// Headers that keep browsers and proxies from reusing an old artifact.
const NO_CACHE: [(&str, &str); 3] = [
    (
        "Cache-Control",
        "no-store, no-cache, must-revalidate, proxy-revalidate",
    ),
    ("Pragma", "no-cache"),
    ("Expires", "0"),
];

/// Liveness text for `/`.
pub fn respond_alive(request: Request) -> Result<()> {
    send_body(request, 200, mime::PLAIN, b"qtex server is running".to_vec())
}

/// Viewer page with a fresh cache token, wired to the viewer channel.
pub fn respond_view(request: Request, viewer_port: u16) -> Result<()> {
    use crate::embed::serve::{VIEW_HTML, ViewVars};

    let cache_token = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let body = VIEW_HTML.render(&ViewVars {
        cache_token,
        viewer_port,
    });
    send_body(request, 200, mime::HTML, body.into_bytes())
}

/// Latest artifact, or 404 before the first successful compile.
pub fn respond_artifact(request: Request, slot: &ArtifactSlot) -> Result<()> {
    let Some(body) = slot.read() else {
        return send_body(request, 404, mime::PLAIN, b"No PDF generated yet".to_vec());
    };

    if is_head_request(&request) {
        let response = NO_CACHE.iter().fold(
            Response::empty(StatusCode(200)).with_header(make_header("Content-Type", mime::PDF)),
            |response, (key, value)| response.with_header(make_header(key, value)),
        );
        request.respond(response)?;
        return Ok(());
    }

    let response = NO_CACHE.iter().fold(
        Response::from_data(body).with_header(make_header("Content-Type", mime::PDF)),
        |response, (key, value)| response.with_header(make_header(key, value)),
    );
    request.respond(response)?;
    Ok(())
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send_body(request, 404, mime::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, mime::PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    if is_head_request(&request) {
        let response = Response::empty(StatusCode(status))
            .with_header(make_header("Content-Type", content_type));
        request.respond(response)?;
        return Ok(());
    }

    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Header {
    // Keys and values used here are static ASCII.
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .unwrap_or_else(|_| unreachable!("invalid header {key}"))
}
