//! Configuration section definitions.
//!
//! Each module corresponds to a section in `scriptorium.toml`:
//!
//! | Module      | TOML Section    | Purpose                               |
//! |-------------|-----------------|---------------------------------------|
//! | `serve`     | `[serve]`       | HTTP / WebSocket listeners            |
//! | `workspace` | `[workspace]`   | Working copy location and layout      |
//! | `render`    | `[render]`      | External build pipeline               |
//! | `session`   | `[session]`     | Protocol options                      |

mod render;
mod serve;
mod session;
mod workspace;

pub use render::RenderConfig;
pub use serve::ServeConfig;
pub use session::SessionConfig;
pub use workspace::WorkspaceConfig;
