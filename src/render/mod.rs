//! Two-stage external build producing the preview.
//!
//! ```text
//! block dir ──strip source──► project dir
//!                               │
//!                     sync (any exit status)
//!                               │
//!                     build (stdout captured) ──► output text
//! ```
//!
//! Both waits race a `CancelToken`; a cancelled run kills the running stage
//! and yields `Ok(None)`.

mod url;

pub use url::output_url;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AuthorConfig;
use crate::utils::cancel::CancelToken;
use crate::utils::exec::{Cmd, ExecError};
use crate::{debug, log};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render stage `{stage}` could not run")]
    Spawn {
        stage: &'static str,
        #[source]
        source: ExecError,
    },
}

/// The configured sync and build commands.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    sync: Vec<String>,
    build: Vec<String>,
    source_dir: String,
}

impl RenderPipeline {
    pub fn new(sync: Vec<String>, build: Vec<String>, source_dir: impl Into<String>) -> Self {
        Self {
            sync,
            build,
            source_dir: source_dir.into(),
        }
    }

    pub fn from_config(config: &AuthorConfig) -> Self {
        Self::new(
            config.render.sync.clone(),
            config.render.build.clone(),
            config.workspace.source_dir.clone(),
        )
    }

    /// Drop a trailing source-directory segment: the build runs in the
    /// project directory above it.
    pub fn project_dir<'a>(&self, block_dir: &'a Path) -> &'a Path {
        match (block_dir.file_name(), block_dir.parent()) {
            (Some(name), Some(parent)) if name == self.source_dir.as_str() => parent,
            _ => block_dir,
        }
    }

    /// Run both stages for the block at `block_dir`.
    ///
    /// Stage exit statuses are ignored; only a stage that cannot be run at
    /// all is an error.
    pub async fn run(
        &self,
        block_dir: &Path,
        token: &mut CancelToken,
    ) -> Result<Option<String>, RenderError> {
        let project: PathBuf = self.project_dir(block_dir).to_path_buf();
        debug!("render"; "building in {}", project.display());

        let Some(sync) = self.stage("sync", &self.sync, &project, token).await? else {
            return Ok(None);
        };
        if !sync.status.success() {
            log!("render"; "sync exited with {}", sync.status);
        }

        let Some(build) = self.stage("build", &self.build, &project, token).await? else {
            return Ok(None);
        };
        if !build.status.success() {
            log!("render"; "build exited with {}", build.status);
        }

        if token.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&build.stdout).into_owned()))
    }

    async fn stage(
        &self,
        stage: &'static str,
        command: &[String],
        cwd: &Path,
        token: &mut CancelToken,
    ) -> Result<Option<std::process::Output>, RenderError> {
        Cmd::from_slice(command)
            .cwd(cwd)
            .output_until(token)
            .await
            .map_err(|source| RenderError::Spawn { stage, source })
    }
}
