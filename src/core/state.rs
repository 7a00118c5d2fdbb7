//! Process-wide server state.
//!
//! - `SHUTDOWN`: Has shutdown been requested? (Ctrl+C received)
//! - `SESSIONS`: Number of connected editing sessions

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Open session channels
static SESSIONS: AtomicUsize = AtomicUsize::new(0);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Shutdown signal sender for the session runtime
static SHUTDOWN_TX: OnceLock<crossbeam::channel::Sender<()>> = OnceLock::new();

// =============================================================================
// SHUTDOWN state
// =============================================================================

/// Setup the global Ctrl+C handler. Call once at program start
///
/// - Before `register_server()`: exit immediately, nothing to drain
/// - After `register_server()`: unblock the HTTP loop and notify the runtime
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        if let Some(tx) = SHUTDOWN_TX.get() {
            let _ = tx.send(());
        }

        if let Some(server) = SERVER.get() {
            crate::log!("serve"; "shutting down...");
            server.unblock();
        } else {
            std::process::exit(0);
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the HTTP server for graceful shutdown
///
/// Call this after binding the server, before entering the request loop
pub fn register_server(server: Arc<Server>, shutdown_tx: crossbeam::channel::Sender<()>) {
    let _ = SERVER.set(server);
    let _ = SHUTDOWN_TX.set(shutdown_tx);
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// =============================================================================
// SESSIONS counter
// =============================================================================

/// Guard counting one open session; decrements on drop.
pub struct SessionGuard(());

impl SessionGuard {
    pub fn enter() -> Self {
        SESSIONS.fetch_add(1, Ordering::SeqCst);
        Self(())
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        SESSIONS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Number of currently open sessions
pub fn session_count() -> usize {
    SESSIONS.load(Ordering::SeqCst)
}
