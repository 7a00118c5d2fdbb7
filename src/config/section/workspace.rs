//! `[workspace]` section configuration.
//!
//! Where the working copy lives and how blocks and content files are
//! recognised inside it.
//!
//! # Example
//!
//! ```toml
//! [workspace]
//! location = "~/scriptorium/workspace"
//! remote = "origin"
//! marker = "conf.py"
//! content_extension = "md"
//! source_dir = "source"
//! default_title = "# Page Title"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::ConfigDiagnostics;

/// Workspace settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Absolute path the remote repository is cloned to.
    pub location: Option<PathBuf>,

    /// Remote whose branches are offered and pushed to.
    pub remote: String,

    /// File name marking a block root.
    pub marker: String,

    /// Extension of editable content files (without dot).
    pub content_extension: String,

    /// Name of the editable-source directory inside a block.
    pub source_dir: String,

    /// Initial content for newly added content files.
    pub default_title: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            location: None,
            remote: "origin".to_string(),
            marker: "conf.py".to_string(),
            content_extension: "md".to_string(),
            source_dir: "source".to_string(),
            default_title: "# Page Title".to_string(),
        }
    }
}

impl WorkspaceConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match &self.location {
            None => diag.error_with_hint(
                "workspace.location",
                "no repository location configured",
                "pass --repository-location or set [workspace] location",
            ),
            Some(path) if !path.is_absolute() => {
                diag.error("workspace.location", "must resolve to an absolute path")
            }
            Some(_) => {}
        }
        if self.marker.is_empty() || self.marker.contains('/') {
            diag.error("workspace.marker", "must be a plain file name");
        }
        if self.content_extension.starts_with('.') {
            diag.error_with_hint(
                "workspace.content_extension",
                "must not start with a dot",
                format!("use \"{}\"", self.content_extension.trim_start_matches('.')),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ConfigDiagnostics, test_parse_config};

    #[test]
    fn test_workspace_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.workspace.remote, "origin");
        assert_eq!(config.workspace.marker, "conf.py");
        assert_eq!(config.workspace.content_extension, "md");
        assert_eq!(config.workspace.source_dir, "source");
        assert_eq!(config.workspace.default_title, "# Page Title");
    }

    #[test]
    fn test_missing_location_is_error() {
        let config = test_parse_config("");
        let mut diag = ConfigDiagnostics::new();
        config.workspace.validate(&mut diag);
        assert!(!diag.errors().is_empty());
    }

    #[test]
    fn test_dotted_extension_is_error() {
        let config = test_parse_config(
            "[workspace]\nlocation = \"/srv/ws\"\ncontent_extension = \".rst\"",
        );
        let mut diag = ConfigDiagnostics::new();
        config.workspace.validate(&mut diag);
        assert_eq!(diag.errors().len(), 1);
        assert!(diag.errors()[0].hint.as_deref().unwrap().contains("\"rst\""));
    }
}
