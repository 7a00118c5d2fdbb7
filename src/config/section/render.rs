//! `[render]` section configuration.
//!
//! The two-stage external build that produces the preview.
//!
//! # Example
//!
//! ```toml
//! [render]
//! sync = ["poetry", "install"]            # dependency synchronisation
//! build = ["poetry", "run", "make", "html"]  # generation, stdout is the preview log
//! output_dir = "build/html"               # relative to the block root
//! output_extension = "html"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;
use crate::log;

/// Render pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Dependency synchronisation command, run first.
    pub sync: Vec<String>,

    /// Generation command, run after `sync` has finished.
    pub build: Vec<String>,

    /// Build output directory relative to the block root.
    pub output_dir: PathBuf,

    /// Extension of generated documents (without dot).
    pub output_extension: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sync: vec!["poetry".into(), "install".into()],
            build: vec!["poetry".into(), "run".into(), "make".into(), "html".into()],
            output_dir: PathBuf::from("build/html"),
            output_extension: "html".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.sync.is_empty() {
            diag.error("render.sync", "command must not be empty");
        }
        if self.build.is_empty() {
            diag.error("render.build", "command must not be empty");
        }
        if self.output_dir.is_absolute() {
            diag.error("render.output_dir", "must be relative to the block root");
        }
    }

    /// Warn about stage programs missing from PATH.
    ///
    /// Not an error: the toolchain may be installed after startup, and a
    /// failing stage only produces an empty preview.
    pub fn warn_missing_programs(&self) {
        for program in [self.sync.first(), self.build.first()].into_iter().flatten() {
            if which::which(program).is_err() {
                log!("warning"; "render program `{}` not found in PATH", program);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigDiagnostics, test_parse_config};

    #[test]
    fn test_render_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.render.sync, ["poetry", "install"]);
        assert_eq!(config.render.build, ["poetry", "run", "make", "html"]);
        assert_eq!(config.render.output_extension, "html");
    }

    #[test]
    fn test_render_override() {
        let config = test_parse_config(
            "[render]\nsync = [\"true\"]\nbuild = [\"make\", \"html\"]\noutput_dir = \"_build/html\"",
        );
        assert_eq!(config.render.sync, ["true"]);
        assert_eq!(config.render.build, ["make", "html"]);
        assert_eq!(config.render.output_dir.to_str(), Some("_build/html"));
    }

    #[test]
    fn test_empty_command_is_error() {
        let config = test_parse_config("[render]\nbuild = []");
        let mut diag = ConfigDiagnostics::new();
        config.render.validate(&mut diag);
        assert_eq!(diag.errors().len(), 1);
    }
}
