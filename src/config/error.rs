//! Configuration errors and validation diagnostics.

use owo_colors::{OwoColorize, Stream, Style};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a usable `AuthorConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    // No #[from]: the diagnostics print themselves in full
    #[error("{0}")]
    Diagnostics(ConfigDiagnostics),
}

/// One rejected config field.
#[derive(Debug, Clone)]
pub struct ConfigDiagnostic {
    /// Dotted field path, e.g. `workspace.location`
    pub field: String,
    pub message: String,
    pub hint: Option<String>,
}

impl fmt::Display for ConfigDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[{}]",
            self.field.if_supports_color(Stream::Stderr, |t| t.cyan())
        )?;
        write!(
            f,
            "{} {}",
            "→".if_supports_color(Stream::Stderr, |t| t.red()),
            self.message
        )?;
        if let Some(hint) = &self.hint {
            write!(
                f,
                "\n  {} {}",
                "hint:".if_supports_color(Stream::Stderr, |t| t.yellow()),
                hint
            )?;
        }
        Ok(())
    }
}

/// Every problem found by one validation pass.
#[derive(Debug, Default)]
pub struct ConfigDiagnostics {
    errors: Vec<ConfigDiagnostic>,
}

impl ConfigDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(field.into(), message.into(), None);
    }

    pub fn error_with_hint(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) {
        self.push(field.into(), message.into(), Some(hint.into()));
    }

    fn push(&mut self, field: String, message: String, hint: Option<String>) {
        self.errors.push(ConfigDiagnostic {
            field,
            message,
            hint,
        });
    }

    pub fn errors(&self) -> &[ConfigDiagnostic] {
        &self.errors
    }

    /// `Err(self)` if anything was reported.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = Style::new().red().bold();
        writeln!(
            f,
            "{}\n",
            "config validation failed:".if_supports_color(Stream::Stderr, |t| t.style(heading))
        )?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f, "\n")?;
            }
            write!(f, "{err}")?;
        }
        if self.errors.len() > 1 {
            write!(f, "\n\nfound {} errors", self.errors.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigDiagnostics {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("scriptorium.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        let display = format!("{io_err}");
        assert!(display.contains("IO error"));
        assert!(display.contains("scriptorium.toml"));
    }

    #[test]
    fn test_diagnostics_display_lists_fields() {
        owo_colors::set_override(false);
        let mut diag = ConfigDiagnostics::new();
        diag.error("workspace.location", "missing");
        diag.error_with_hint("serve.base_path", "bad", "use \"/\"");

        let text = ConfigError::Diagnostics(diag).to_string();
        assert!(!text.contains('\u{1b}'));
        assert!(text.contains("[workspace.location]"));
        assert!(text.contains("hint: use \"/\""));
        assert!(text.contains("found 2 errors"));
    }

    #[test]
    fn test_into_result() {
        assert!(ConfigDiagnostics::new().into_result().is_ok());
        let mut diag = ConfigDiagnostics::new();
        diag.error("render.build", "empty");
        let diag = diag.into_result().unwrap_err();
        assert_eq!(diag.errors()[0].field, "render.build");
    }
}
