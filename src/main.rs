//! Scriptorium - authoring backend for git-hosted documentation workspaces.

mod cli;
mod config;
mod core;
mod logger;
mod render;
mod repo;
mod server;
mod session;
mod utils;
mod workspace;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::Cli;
use config::AuthorConfig;
use crossbeam::channel;
use server::http::{self, Shell};
use server::ws::FrontDoor;
use session::Backend;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = AuthorConfig::load(&cli)?;
    config.render.warn_missing_programs();

    serve(&config)
}

/// Bind the public port and the loopback shell, then serve until Ctrl+C.
fn serve(config: &AuthorConfig) -> Result<()> {
    let backend = Arc::new(Backend::from_config(config));
    log!("workspace"; "{}", config.location().display());

    let (listener, addr) = server::ws::bind(config.serve.interface, config.serve.port)?;
    let (server, upstream) = http::bind_local()?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    core::register_server(Arc::clone(&server), shutdown_tx);

    let door = FrontDoor {
        backend,
        api_path: config.serve.api_path(),
        upstream,
    };
    let ws_handle = server::ws::spawn(listener, door, shutdown_rx);
    log!("serve"; "http://{}{}app", addr, config.serve.base_path);
    debug!("ws"; "ws://{}{}", addr, config.serve.api_path());

    let shell = Arc::new(Shell::new(config));
    http::run_request_loop(&server, shell)?;

    wait_for_shutdown(ws_handle);
    Ok(())
}

/// Wait for the session runtime to stop (max 2 seconds).
fn wait_for_shutdown(handle: JoinHandle<()>) {
    for _ in 0..40 {
        if handle.is_finished() {
            let _ = handle.join();
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
}
