//! Core process state shared across the server.

mod state;

pub use state::{
    SessionGuard, is_shutdown, register_server, session_count, setup_shutdown_handler,
};
