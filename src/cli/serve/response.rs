//! HTTP response helpers.

use anyhow::Result;
use tiny_http::{Header, Request, Response, StatusCode};

const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain; charset=utf-8";

/// Respond with a rendered page.
pub fn respond_html(request: Request, body: Vec<u8>) -> Result<()> {
    send_body(request, 200, HTML, body)
}

/// Respond 404, listing the known routes.
pub fn respond_not_found(request: Request, routes: &[&str]) -> Result<()> {
    let body = format!(
        "404 not found: {}\n\navailable pages:\n{}\n",
        request.url(),
        routes
            .iter()
            .map(|r| format!("  {r}"))
            .collect::<Vec<_>>()
            .join("\n")
    );
    send_body(request, 404, TEXT, body.into_bytes())
}

/// Respond 500 when a render aborted.
pub fn respond_render_error(request: Request, message: &str) -> Result<()> {
    send_body(request, 500, TEXT, format!("render failed: {message}\n").into_bytes())
}

/// Respond 405 for anything but GET / HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, TEXT, b"method not allowed\n".to_vec())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let header = Header::from_bytes("Content-Type", content_type)
        .map_err(|()| anyhow::anyhow!("invalid content type `{content_type}`"))?;
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(header);
    request.respond(response)?;
    Ok(())
}
