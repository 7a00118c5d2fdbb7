//! Server configuration management for `scriptorium.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── render     # [render]
//! │   ├── serve      # [serve]
//! │   ├── session    # [session]
//! │   └── workspace  # [workspace]
//! ├── error          # ConfigError, ConfigDiagnostics
//! └── mod.rs         # AuthorConfig (this file)
//! ```
//!
//! The config file is optional: every setting has a default or a CLI flag,
//! and only `workspace.location` must come from one of them.

mod error;
pub mod section;

pub use error::{ConfigDiagnostics, ConfigError};
pub use section::{RenderConfig, ServeConfig, SessionConfig, WorkspaceConfig};

use crate::{
    cli::Cli,
    log,
    utils::path::{expand_path, normalize_path},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing scriptorium.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorConfig {
    /// Absolute path to the config file, whether or not it exists
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory relative paths in the config file are resolved against
    #[serde(skip)]
    pub root: PathBuf,

    /// HTTP and WebSocket listeners
    #[serde(default)]
    pub serve: ServeConfig,

    /// Working copy location and layout
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// External render pipeline
    #[serde(default)]
    pub render: RenderConfig,

    /// Protocol options
    #[serde(default)]
    pub session: SessionConfig,
}

impl AuthorConfig {
    /// Load configuration from CLI arguments.
    ///
    /// A missing config file is not an error; defaults and CLI flags are used.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = normalize_path(&cwd.join(expand_path(&cli.config)));

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        config.config_path = config_path;
        config.root = root.clone();
        config.normalize_paths(&root);
        config.apply_cli(cli);

        crate::logger::set_verbose(cli.verbose);

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Absolute workspace location.
    ///
    /// Only meaningful after `validate()` has accepted the config.
    pub fn location(&self) -> &Path {
        self.workspace.location.as_deref().unwrap_or(Path::new("/"))
    }

    // ========================================================================
    // cli configuration updates
    // ========================================================================

    /// CLI flags override config file values.
    fn apply_cli(&mut self, cli: &Cli) {
        Self::update_option(&mut self.serve.interface, cli.interface.as_ref());
        Self::update_option(&mut self.serve.port, cli.port.as_ref());
        Self::update_option(&mut self.serve.base_path, cli.base_path.as_ref());

        // CLI paths are relative to the working directory, not the config file
        if let Some(location) = &cli.repository_location {
            self.workspace.location = Some(normalize_path(&expand_path(location)));
        }
        if let Some(ui_dir) = &cli.ui_dir {
            self.serve.ui_dir = normalize_path(&expand_path(ui_dir));
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    // ========================================================================
    // path normalization
    // ========================================================================

    /// Resolve config-file paths against the config file's directory.
    fn normalize_paths(&mut self, root: &Path) {
        if let Some(location) = self.workspace.location.take() {
            self.workspace.location = Some(normalize_path(&root.join(expand_path(&location))));
        }
        self.serve.ui_dir = normalize_path(&root.join(expand_path(&self.serve.ui_dir)));
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate all sections, collecting every problem before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();
        self.serve.validate(&mut diag);
        self.workspace.validate(&mut diag);
        self.render.validate(&mut diag);
        diag.into_result().map_err(ConfigError::Diagnostics)
    }
}

/// Parse a config snippet, failing the test on unknown fields.
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> AuthorConfig {
    let (config, ignored) = AuthorConfig::parse_with_ignored(extra).unwrap();
    assert!(ignored.is_empty(), "unknown fields: {ignored:?}");
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["scriptorium"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) =
            AuthorConfig::parse_with_ignored("[serve]\nport = 1\nwatch = true\n[deploy]\nx = 1")
                .unwrap();
        assert_eq!(ignored.len(), 2);
        assert!(ignored.iter().any(|f| f == "serve.watch"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = AuthorConfig::parse_with_ignored("[serve\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_load_without_config_file() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("scriptorium.toml");
        let location = dir.path().join("ws");

        let config = AuthorConfig::load(&cli(&[
            "-C",
            missing.to_str().unwrap(),
            "--repository-location",
            location.to_str().unwrap(),
            "--port",
            "7100",
        ]))
        .unwrap();

        assert_eq!(config.location(), location.as_path());
        assert_eq!(config.serve.port, 7100);
        assert_eq!(config.serve.api_path(), "/api");
    }

    #[test]
    fn test_load_requires_location() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("scriptorium.toml");
        let err = AuthorConfig::load(&cli(&["-C", missing.to_str().unwrap()])).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn test_file_paths_relative_to_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scriptorium.toml");
        fs::write(
            &path,
            "[workspace]\nlocation = \"ws/\"\n[serve]\nui_dir = \"ui\"\nport = 7200",
        )
        .unwrap();

        let config = AuthorConfig::load(&cli(&["-C", path.to_str().unwrap()])).unwrap();
        let root = normalize_path(dir.path());
        assert_eq!(config.location(), root.join("ws").as_path());
        assert_eq!(config.serve.ui_dir, root.join("ui"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scriptorium.toml");
        fs::write(
            &path,
            "[workspace]\nlocation = \"/srv/a\"\n[serve]\nport = 7300\nbase_path = \"/x/\"",
        )
        .unwrap();

        let config = AuthorConfig::load(&cli(&[
            "-C",
            path.to_str().unwrap(),
            "--repository-location",
            "/srv/b/",
            "--base-path",
            "/author/",
        ]))
        .unwrap();
        assert_eq!(config.location(), Path::new("/srv/b"));
        assert_eq!(config.serve.base_path, "/author/");
        assert_eq!(config.serve.port, 7300);
    }
}
