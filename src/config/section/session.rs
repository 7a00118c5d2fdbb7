//! `[session]` section configuration.
//!
//! ```toml
//! [session]
//! diagnostics = false   # emit `operation-failed` frames for failed operations
//! ```

use serde::{Deserialize, Serialize};

/// Session protocol settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Tell the client which operation failed (never why).
    pub diagnostics: bool,
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_diagnostics_default_off() {
        assert!(!test_parse_config("").session.diagnostics);
        assert!(test_parse_config("[session]\ndiagnostics = true").session.diagnostics);
    }
}
