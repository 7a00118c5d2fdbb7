//! Version control operations on the workspace.
//!
//! Mutations run the `git` binary; refs are read with gix.
//!
//! Two behaviors are visible to users:
//! - `commit_and_push` pushes with `--force`.
//! - `discard` resets tracked files only; untracked files survive it.

mod refs;

#[cfg(test)]
pub(crate) mod fixture;

pub use refs::{local_branches, remote_branches};

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::AuthorConfig;
use crate::log;
use crate::utils::exec::{Cmd, ExecError, GIT_FILTER};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("no working copy at `{0}`")]
    Missing(PathBuf),

    #[error("failed to remove `{path}`")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to clone `{url}`")]
    Clone {
        url: String,
        #[source]
        source: ExecError,
    },

    #[error("git {operation} failed")]
    Command {
        operation: &'static str,
        #[source]
        source: ExecError,
    },

    #[error("failed to read refs in `{path}`")]
    Refs {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl RepoError {
    fn refs(path: &Path, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Refs {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    fn command(operation: &'static str) -> impl FnOnce(ExecError) -> Self {
        move |source| Self::Command { operation, source }
    }

    /// Full error chain for local logs.
    pub fn chain(&self) -> String {
        crate::utils::exec::describe(self)
    }
}

/// Author and committer identity for a commit.
#[derive(Debug, Clone)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// The workspace working copy and its upstream remote.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    remote: String,
}

impl Repository {
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
        }
    }

    pub fn from_config(config: &AuthorConfig) -> Self {
        Self::new(config.location(), config.workspace.remote.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `git` in the working copy, never prompting for credentials.
    fn git(&self) -> Cmd {
        Cmd::new("git")
            .cwd(&self.root)
            .envs([("GIT_TERMINAL_PROMPT", "0")])
            .filter(&GIT_FILTER)
    }

    fn ensure_exists(&self) -> Result<(), RepoError> {
        if self.root.join(".git").exists() {
            Ok(())
        } else {
            Err(RepoError::Missing(self.root.clone()))
        }
    }

    /// Replace the working copy with a fresh clone of `url`.
    ///
    /// Returns the branch names the configured remote offers.
    pub async fn clone_url(&self, url: &str) -> Result<Vec<String>, RepoError> {
        self.delete().await?;
        if let Some(parent) = self.root.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| RepoError::Remove {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        Cmd::new("git")
            .args(["clone", "--origin", self.remote.as_str(), "--", url])
            .arg(&self.root)
            .envs([("GIT_TERMINAL_PROMPT", "0")])
            .filter(&GIT_FILTER)
            .run()
            .await
            .map_err(|source| RepoError::Clone {
                url: url.to_string(),
                source,
            })?;

        log!("repo"; "cloned {}", url);
        remote_branches(&self.root, &self.remote)
    }

    /// Remove the working copy. Removing an absent one succeeds.
    pub async fn delete(&self) -> Result<(), RepoError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(RepoError::Remove {
                path: self.root.clone(),
                source: err,
            }),
            _ => Ok(()),
        }
    }

    /// Switch to `name`, creating a tracking branch from the remote if
    /// there is no local one. `Ok(false)` if neither exists.
    pub async fn checkout(&self, name: &str) -> Result<bool, RepoError> {
        self.ensure_exists()?;

        if local_branches(&self.root)?.iter().any(|b| b == name) {
            self.git()
                .args(["checkout", name])
                .run()
                .await
                .map_err(RepoError::command("checkout"))?;
        } else if remote_branches(&self.root, &self.remote)?
            .iter()
            .any(|b| b == name)
        {
            let upstream = format!("{}/{}", self.remote, name);
            self.git()
                .args(["checkout", "-b", name, "--track", upstream.as_str()])
                .run()
                .await
                .map_err(RepoError::command("checkout"))?;
        } else {
            return Ok(false);
        }

        log!("repo"; "checked out {}", name);
        Ok(true)
    }

    /// Whether the working copy differs from `HEAD`, untracked files included.
    ///
    /// Runs concurrently with other repository commands, so it never takes
    /// `index.lock` to refresh the index.
    pub async fn status(&self) -> Result<bool, RepoError> {
        self.ensure_exists()?;
        let output = self
            .git()
            .envs([("GIT_OPTIONAL_LOCKS", "0")])
            .args(["status", "--porcelain", "--untracked-files=all"])
            .run()
            .await
            .map_err(RepoError::command("status"))?;
        Ok(!output.stdout.trim_ascii().is_empty())
    }

    /// Stage everything, commit as `identity` and force-push to the
    /// upstream. Returns `false` without committing on a clean tree.
    pub async fn commit_and_push(
        &self,
        identity: &Identity,
        message: &str,
    ) -> Result<bool, RepoError> {
        if !self.status().await? {
            return Ok(false);
        }

        self.git()
            .args(["add", "--all"])
            .run()
            .await
            .map_err(RepoError::command("add"))?;

        self.git()
            .args(["commit", "--quiet", "-m", message])
            .envs([
                ("GIT_AUTHOR_NAME", identity.name.as_str()),
                ("GIT_AUTHOR_EMAIL", identity.email.as_str()),
                ("GIT_COMMITTER_NAME", identity.name.as_str()),
                ("GIT_COMMITTER_EMAIL", identity.email.as_str()),
            ])
            .run()
            .await
            .map_err(RepoError::command("commit"))?;

        self.git()
            .args(["push", "--force"])
            .run()
            .await
            .map_err(RepoError::command("push"))?;

        log!("repo"; "committed and pushed as {} <{}>", identity.name, identity.email);
        Ok(true)
    }

    /// Reset tracked files to `HEAD`. Untracked files are left alone.
    pub async fn discard(&self) -> Result<(), RepoError> {
        self.ensure_exists()?;
        self.git()
            .args(["reset", "--hard", "--quiet", "HEAD"])
            .run()
            .await
            .map_err(RepoError::command("reset"))?;
        Ok(())
    }
}
