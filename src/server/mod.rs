//! Network surfaces: the public listener and the HTTP shell behind it.
//!
//! ```text
//!  client ──► ws::accept_loop (tokio runtime thread, public port)
//!               ├─ GET {base}api + Upgrade ──► Session per connection
//!               └─ anything else ──splice──► http::Shell (tiny_http on loopback, rayon pool)
//! ```
//!
//! The public listener retries on the following ports when the configured
//! one is taken.

pub mod http;
pub mod ws;

/// Ports tried after the configured one before giving up.
const MAX_PORT_RETRIES: u16 = 10;
