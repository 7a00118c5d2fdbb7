//! Public listener: the session channel at `{base}api`, everything else
//! forwarded to the HTTP shell.
//!
//! The request line of each new connection is peeked without consuming it.
//! An upgrade for the api path becomes a `Session` with a reader (this task)
//! and a writer task draining the session's outbox. Any other connection is
//! spliced onto the loopback tiny_http server. The runtime lives on its own
//! thread and stops when the shutdown signal arrives.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tungstenite::Message;

use super::MAX_PORT_RETRIES;
use crate::core::{SessionGuard, is_shutdown, session_count};
use crate::session::{Backend, Outbox, Session};
use crate::{debug, log};

/// Frames buffered between the socket reader and the session loop
const INBOUND_BUFFER: usize = 64;

/// Bytes peeked when looking for the request line
const HEAD_PEEK: usize = 2048;

/// Peek retries while the request line is still incomplete
const PEEK_ATTEMPTS: usize = 50;
const PEEK_INTERVAL: Duration = Duration::from_millis(10);

/// Where connections on the public port go.
pub struct FrontDoor {
    pub backend: Arc<Backend>,
    /// `{base}api`
    pub api_path: String,
    /// Loopback address of the HTTP shell
    pub upstream: SocketAddr,
}

impl FrontDoor {
    fn is_api(&self, target: &str) -> bool {
        target == self.api_path || target.strip_suffix('/') == Some(self.api_path.as_str())
    }
}

/// Bind the public listener, trying the next ports if `base_port` is taken.
pub fn bind(interface: IpAddr, base_port: u16) -> Result<(std::net::TcpListener, SocketAddr)> {
    let mut last_error = None;

    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        match std::net::TcpListener::bind(SocketAddr::new(interface, port)) {
            Ok(listener) => {
                let addr = listener.local_addr()?;
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, addr.port());
                }
                listener.set_nonblocking(true)?;
                return Ok((listener, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        MAX_PORT_RETRIES,
        base_port,
        base_port.saturating_add(MAX_PORT_RETRIES - 1),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

/// Run the public listener on a dedicated runtime thread.
pub fn spawn(
    listener: std::net::TcpListener,
    door: FrontDoor,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = run_runtime(listener, door, shutdown_rx) {
            log!("ws"; "error: {:#}", e);
        }
    })
}

fn run_runtime(
    listener: std::net::TcpListener,
    door: FrontDoor,
    shutdown_rx: Receiver<()>,
) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(async move {
        let listener = TcpListener::from_std(listener)?;
        let accept = tokio::spawn(accept_loop(listener, Arc::new(door)));

        // Poll-based: the signal arrives on a crossbeam channel
        loop {
            if shutdown_rx.try_recv().is_ok() || is_shutdown() {
                debug!("ws"; "shutdown signal received");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        accept.abort();
        Ok::<_, anyhow::Error>(())
    })?;

    rt.shutdown_timeout(Duration::from_millis(500));
    Ok(())
}

/// Accept connections until the task is aborted.
pub async fn accept_loop(listener: TcpListener, door: Arc<FrontDoor>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let door = Arc::clone(&door);
                tokio::spawn(async move {
                    if let Err(e) = dispatch(stream, &door).await {
                        debug!("ws"; "{}: {:#}", peer, e);
                    }
                });
            }
            Err(e) => log!("ws"; "accept failed: {}", e),
        }
    }
}

async fn dispatch(stream: TcpStream, door: &FrontDoor) -> Result<()> {
    match request_target(&stream).await? {
        Some(target) if door.is_api(&target) => {
            serve_session(stream, Arc::clone(&door.backend)).await?;
        }
        _ => proxy(stream, door.upstream).await?,
    }
    Ok(())
}

/// Peek at the request target without consuming any bytes.
async fn request_target(stream: &TcpStream) -> io::Result<Option<String>> {
    let mut buf = [0u8; HEAD_PEEK];
    for _ in 0..PEEK_ATTEMPTS {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf[..n].contains(&b'\n') || n == buf.len() {
            return Ok(parse_target(&buf[..n]).map(str::to_string));
        }
        tokio::time::sleep(PEEK_INTERVAL).await;
    }
    Ok(None)
}

/// Path of the request line's target, query and fragment removed.
fn parse_target(head: &[u8]) -> Option<&str> {
    let end = head.iter().position(|&b| b == b'\r' || b == b'\n')?;
    let line = std::str::from_utf8(&head[..end]).ok()?;
    let mut parts = line.split(' ');
    let _method = parts.next()?;
    let target = parts.next().filter(|t| t.starts_with('/'))?;
    target.split(['?', '#']).next()
}

async fn proxy(mut stream: TcpStream, upstream: SocketAddr) -> io::Result<()> {
    let mut shell = TcpStream::connect(upstream).await?;
    tokio::io::copy_bidirectional(&mut stream, &mut shell).await?;
    Ok(())
}

async fn serve_session(stream: TcpStream, backend: Arc<Backend>) -> Result<(), tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let _guard = SessionGuard::enter();
    debug!("ws"; "session opened ({} open)", session_count());

    let (mut sink, mut frames) = ws.split();
    let (outbox, mut replies) = Outbox::new();
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_BUFFER);

    let session = tokio::spawn(Session::new(backend, outbox).run(inbound_rx));

    // Outlives the reader so replies from tasks still in flight are delivered
    tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            if sink.send(Message::Text(reply.to_json().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = frames.next().await {
        match frame? {
            Message::Text(text) => {
                if inbound_tx.send(text.to_string()).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    drop(inbound_tx);
    let _ = session.await;
    debug!("ws"; "session closed");
    Ok(())
}
