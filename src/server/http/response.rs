//! HTTP response handlers.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::utils::mime::{HTML, PLAIN};

/// Respond with a static file.
pub fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = crate::utils::mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    send_body(request, 200, content_type, body)
}

/// Respond with the frontend entry page, filling in its placeholders.
pub fn respond_index(request: Request, path: &Path, app_path: &str) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 200, HTML);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = fill_index(&String::from_utf8_lossy(&body), app_path);
    send_body(request, 200, HTML, body.into_bytes())
}

/// Substitute `{app_path}` in the entry page.
pub fn fill_index(template: &str, app_path: &str) -> String {
    template.replace("{app_path}", app_path)
}

/// Respond with a 302 redirect.
pub fn respond_redirect(request: Request, location: &str) -> Result<()> {
    let location = Header::from_bytes("Location", location.as_bytes())
        .map_err(|()| anyhow::anyhow!("invalid redirect location `{}`", location))?;
    let response = Response::empty(StatusCode(302)).with_header(location);
    request.respond(response)?;
    Ok(())
}

/// Respond with 404.
pub fn respond_not_found(request: Request) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, 404, PLAIN);
    }
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

/// Respond with 405 for anything but GET and HEAD.
pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(request, 405, PLAIN, b"405 Method Not Allowed".to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &'static str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-cache"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &'static str) -> Header {
    Header::from_bytes(key, value).unwrap()
}
