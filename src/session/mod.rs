//! Editing session for one connected client.
//!
//! # Architecture
//!
//! ```text
//!  frames ──► Session::run ──dispatch──► handlers (file ops inline)
//!                ▲    │                     │
//!                │    │                     ├─spawn─► repository task ─┐
//!                │    │                     └─spawn─► render task ─────┤
//!                │    ▼                                                │
//!             events ◄─────────────────────────────────────────────────┘
//!                     │
//!                  Outbox ──► writer ──► client
//! ```
//!
//! The loop never waits on a subprocess: repository operations and renders
//! run on spawned tasks, which reply through the outbox or report back
//! through the event channel.

mod handlers;
mod messages;

pub use messages::{FileRef, Request, Response};

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AuthorConfig;
use crate::debug;
use crate::render::{RenderError, RenderPipeline};
use crate::repo::Repository;
use crate::utils::cancel::{CancelHandle, cancel_pair};
use crate::utils::exec::describe;
use crate::workspace::Workspace;

/// Everything a session needs to act on the workspace.
///
/// Shared by all sessions; holds no per-client state.
#[derive(Debug, Clone)]
pub struct Backend {
    pub workspace: Workspace,
    pub repo: Repository,
    pub pipeline: RenderPipeline,
    pub output_extension: String,
    /// Emit `operation-failed` for failed background operations
    pub diagnostics: bool,
}

impl Backend {
    pub fn from_config(config: &AuthorConfig) -> Self {
        Self {
            workspace: Workspace::from_config(config),
            repo: Repository::from_config(config),
            pipeline: RenderPipeline::from_config(config),
            output_extension: config.render.output_extension.clone(),
            diagnostics: config.session.diagnostics,
        }
    }
}

/// Sending half of the client connection.
///
/// Sends after the client has gone are dropped silently.
#[derive(Debug, Clone)]
pub struct Outbox(mpsc::UnboundedSender<Response>);

impl Outbox {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Response>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self(tx), rx)
    }

    pub fn send(&self, msg: Response) {
        if self.0.send(msg).is_err() {
            debug!("session"; "client gone, reply dropped");
        }
    }
}

/// Results reported back to the session loop by spawned tasks.
#[derive(Debug)]
pub(crate) enum Event {
    /// A render finished, was cancelled or failed
    Rendered {
        generation: u64,
        operation: &'static str,
        url: String,
        result: Result<Option<String>, RenderError>,
    },
    /// The checked-out branch changed (`None`: no working copy or fresh clone)
    Branch(Option<String>),
}

/// The in-flight render, at most one per session.
struct RenderTask {
    generation: u64,
    cancel: CancelHandle,
    handle: JoinHandle<()>,
}

/// Per-connection protocol state.
pub struct Session {
    backend: Arc<Backend>,
    outbox: Outbox,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    render: Option<RenderTask>,
    /// Bumped for every scheduled render; only the latest may be emitted
    generation: u64,
    branch: Option<String>,
    block: Option<String>,
}

impl Session {
    pub fn new(backend: Arc<Backend>, outbox: Outbox) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            outbox,
            events_tx,
            events_rx,
            render: None,
            generation: 0,
            branch: None,
            block: None,
        }
    }

    /// Serve text frames until the inbound channel closes.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>) {
        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(text) => self.handle_frame(&text),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        self.cancel_render();
        debug!("session"; "closed");
    }

    /// Decode and dispatch one frame. Undecodable frames are ignored.
    pub fn handle_frame(&mut self, text: &str) {
        match Request::from_json(text) {
            Ok(request) => {
                debug!("session"; "{}", request.kind());
                self.dispatch(request);
            }
            Err(err) => debug!("session"; "ignored frame: {}", err),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Rendered {
                generation,
                operation,
                url,
                result,
            } => {
                if generation != self.generation {
                    debug!("render"; "discarding stale result #{}", generation);
                    return;
                }
                self.render = None;
                match result {
                    Ok(Some(output)) => self.outbox.send(Response::FileRendered { url, output }),
                    Ok(None) => debug!("render"; "#{} cancelled", generation),
                    Err(err) => {
                        handlers::fail(&self.outbox, self.backend.diagnostics, operation, &describe(&err))
                    }
                }
            }
            Event::Branch(branch) => {
                debug!("session"; "branch {:?}", branch);
                self.branch = branch;
                self.block = None;
            }
        }
    }

    /// Schedule a render of the block at `block_dir`, superseding any
    /// render still in flight.
    fn schedule_render(&mut self, operation: &'static str, block_dir: PathBuf, url: String) {
        self.outbox.send(Response::FileRendering);
        self.cancel_render();

        self.generation += 1;
        let generation = self.generation;
        let (cancel, mut token) = cancel_pair();
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();

        let handle = tokio::spawn(async move {
            let result = backend.pipeline.run(&block_dir, &mut token).await;
            let _ = events.send(Event::Rendered {
                generation,
                operation,
                url,
                result,
            });
        });

        debug!("render"; "scheduled #{}", generation);
        self.render = Some(RenderTask {
            generation,
            cancel,
            handle,
        });
    }

    /// Cancel the in-flight render, if any. A result already queued from
    /// it becomes stale and will be discarded.
    fn cancel_render(&mut self) {
        self.generation += 1;
        if let Some(task) = self.render.take()
            && !task.handle.is_finished()
        {
            debug!("render"; "cancelling #{}", task.generation);
            task.cancel.cancel();
        }
    }

    /// Recompute change status in the background and emit it.
    fn spawn_change_status(&self) {
        let backend = Arc::clone(&self.backend);
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            change_status(&backend, &outbox).await;
        });
    }

    /// Branch checked out by the last successful `checkout-branch`.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Block named by the last successful `select-block`.
    pub fn block(&self) -> Option<&str> {
        self.block.as_deref()
    }
}

/// Emit the current change status. Failures are logged only.
async fn change_status(backend: &Backend, outbox: &Outbox) {
    match backend.repo.status().await {
        Ok(dirty) => outbox.send(Response::status(dirty)),
        Err(err) => debug!("repo"; "status unavailable: {}", err.chain()),
    }
}
