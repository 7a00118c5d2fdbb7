//! HTTP shell: serves the frontend and rendered previews.
//!
//! Bound on loopback only; the public listener in `ws` forwards every
//! connection that is not a session upgrade. Routes, relative to the
//! configured base path:
//!
//! | Path              | Response                                          |
//! |-------------------|---------------------------------------------------|
//! | `{base}`          | 302 to `{base}app`                                |
//! | `{base}app/...`   | frontend file, unknown paths fall back to index   |
//! | `{base}rendered/` | build output of the matching block root           |

mod path;
mod response;

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tiny_http::{Method, Request, Server};

use crate::config::AuthorConfig;
use crate::log;

/// Request handler threads
const POOL_THREADS: usize = 4;

/// Where a request URL leads.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Redirect(String),
    App(String),
    Rendered(String),
    NotFound,
}

/// Static configuration of the HTTP shell.
#[derive(Debug, Clone)]
pub struct Shell {
    base_path: String,
    ui_dir: PathBuf,
    workspace: PathBuf,
    output_dir: PathBuf,
}

impl Shell {
    pub fn new(config: &AuthorConfig) -> Self {
        Self {
            base_path: config.serve.base_path.clone(),
            ui_dir: config.serve.ui_dir.clone(),
            workspace: config.location().to_path_buf(),
            output_dir: config.render.output_dir.clone(),
        }
    }

    fn app_path(&self) -> String {
        format!("{}app/", self.base_path)
    }

    fn route(&self, url: &str) -> Route {
        let url = path::normalize_url(url);
        let base = self.base_path.as_str();

        if url == base || url == base.trim_end_matches('/') {
            return Route::Redirect(format!("{base}app"));
        }
        let Some(rest) = url.strip_prefix(base) else {
            return Route::NotFound;
        };
        if let Some(sub) = mount(rest, "app") {
            return Route::App(sub.to_string());
        }
        if let Some(sub) = mount(rest, "rendered") {
            return Route::Rendered(sub.to_string());
        }
        Route::NotFound
    }

    fn handle_request(&self, request: Request) -> Result<()> {
        if crate::core::is_shutdown() {
            return response::respond_unavailable(request);
        }
        if !matches!(request.method(), Method::Get | Method::Head) {
            return response::respond_method_not_allowed(request);
        }

        match self.route(request.url()) {
            Route::Redirect(location) => response::respond_redirect(request, &location),
            Route::App(sub) => self.serve_app(request, &sub),
            Route::Rendered(sub) => {
                match path::resolve_rendered(&sub, &self.workspace, &self.output_dir) {
                    Some(file) => response::respond_file(request, &file),
                    None => response::respond_not_found(request),
                }
            }
            Route::NotFound => response::respond_not_found(request),
        }
    }

    /// Serve a frontend file; anything unknown gets the entry page.
    fn serve_app(&self, request: Request, sub: &str) -> Result<()> {
        let index = self.ui_dir.join("index.html").canonicalize().ok();

        let file = path::resolve_path(sub, &self.ui_dir).or_else(|| index.clone());
        match file {
            Some(file) if Some(&file) == index.as_ref() => {
                response::respond_index(request, &file, &self.app_path())
            }
            Some(file) => response::respond_file(request, &file),
            None => response::respond_not_found(request),
        }
    }
}

/// Strip a mount point: `app`, `app/...`, but not `application`.
fn mount<'a>(rest: &'a str, name: &str) -> Option<&'a str> {
    let sub = rest.strip_prefix(name)?;
    (sub.is_empty() || sub.starts_with('/')).then_some(sub)
}

/// Bind the HTTP server on an ephemeral loopback port.
pub fn bind_local() -> Result<(Server, SocketAddr)> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("Failed to bind HTTP shell on {}: {}", addr, e))?;
    let addr = server
        .server_addr()
        .to_ip()
        .context("HTTP shell is not on a TCP socket")?;
    Ok((server, addr))
}

/// Serve requests until the server is unblocked.
pub fn run_request_loop(server: &Server, shell: Arc<Shell>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(POOL_THREADS)
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        let shell = Arc::clone(&shell);
        pool.spawn(move || {
            if let Err(e) = shell.handle_request(request) {
                log!("serve"; "request error: {e}");
            }
        });
    }
    Ok(())
}
