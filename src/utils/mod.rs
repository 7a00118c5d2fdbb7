//! Utility modules shared by the server components.

pub mod cancel;
pub mod exec;
pub mod mime;
pub mod path;
