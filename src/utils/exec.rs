//! External command execution utilities.
//!
//! Provides a Builder-based API for running external programs on the tokio
//! runtime, with stderr filtering and cooperative cancellation.
//!
//! On unix every command leads its own process group, so cancelling a
//! `poetry run make html` also stops the `make` and sphinx processes it
//! forked.
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Simple command, fails on non-zero exit
//! Cmd::new("git").args(["status", "--porcelain"]).cwd(root).run().await?;
//!
//! // Any exit status, abandoned when the token fires
//! let output = Cmd::from_slice(&["make", "html"])
//!     .cwd(root)
//!     .output_until(&mut token)
//!     .await?;
//! ```

use crate::debug;
use crate::utils::cancel::CancelToken;
use regex::Regex;
use std::{
    ffi::{OsStr, OsString},
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Output, Stdio},
    sync::OnceLock,
};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Errors raised while running an external program.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for `{program}`")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command `{program}` failed with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        /// Filtered stderr, kept for local logs only
        detail: String,
    },
}

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
    filter: Option<&'static FilterRule>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Create from a command array (e.g., `["poetry", "install"]`).
    pub fn from_slice<S: AsRef<OsStr>>(cmd: &[S]) -> Self {
        let mut iter = cmd.iter();
        let program = iter
            .next()
            .map(|s| s.as_ref().to_owned())
            .unwrap_or_default();
        let args: Vec<_> = iter.map(|s| s.as_ref().to_owned()).collect();
        Self {
            program,
            args,
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Set environment variables for the subprocess.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Set output filter for logging.
    pub fn filter(mut self, filter: &'static FilterRule) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Execute the command, failing on a non-zero exit status.
    pub async fn run(self) -> Result<Output, ExecError> {
        let name = self.program_name();
        let filter = self.filter.unwrap_or(&EMPTY_FILTER);
        let output = self.output().await?;

        if !output.status.success() {
            return Err(ExecError::Failed {
                program: name,
                status: output.status,
                detail: format_error(&output, filter),
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        filter.log(&name, stderr.trim());
        Ok(output)
    }

    /// Execute the command and return its output whatever the exit status.
    pub async fn output(self) -> Result<Output, ExecError> {
        let name = self.program_name();
        let mut child = self.spawn()?;
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());

        let (status, stdout, stderr) =
            tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
        let status = status.map_err(|source| ExecError::Wait {
            program: name,
            source,
        })?;

        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }

    /// Execute the command, racing its completion against `token`.
    ///
    /// Returns `Ok(None)` when cancelled; the child is killed and its output
    /// discarded.
    pub async fn output_until(self, token: &mut CancelToken) -> Result<Option<Output>, ExecError> {
        if token.is_cancelled() {
            return Ok(None);
        }

        let name = self.program_name();
        let filter = self.filter.unwrap_or(&EMPTY_FILTER);
        let mut child = self.spawn()?;
        let group = ProcessGroup(child.id());
        let (stdout, stderr) = (child.stdout.take(), child.stderr.take());

        let finished = tokio::select! {
            _ = token.cancelled() => None,
            done = async {
                tokio::join!(child.wait(), read_all(stdout), read_all(stderr))
            } => Some(done),
        };

        let Some((status, stdout, stderr)) = finished else {
            drop(group);
            let _ = child.kill().await;
            debug!(&name; "cancelled");
            return Ok(None);
        };
        group.disarm();

        let status = status.map_err(|source| ExecError::Wait {
            program: name.clone(),
            source,
        })?;
        filter.log(&name, String::from_utf8_lossy(&stderr).trim());

        Ok(Some(Output {
            status,
            stdout,
            stderr,
        }))
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    fn spawn(self) -> Result<Child, ExecError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().cloned())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.spawn().map_err(|source| ExecError::Spawn {
            program: self.program_name(),
            source,
        })
    }
}

/// Kills a child's whole process group on drop unless disarmed.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    /// The leader exited on its own; leave the group alone.
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.0.take() {
            // SAFETY: killpg only sends a signal
            unsafe {
                libc::killpg(pid as libc::pid_t, libc::SIGKILL);
            }
        }
    }
}

/// Drain a child pipe to the end.
async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

// ============================================================================
// Output Filtering
// ============================================================================

/// Filter rule for command output logging.
///
/// Used to reduce noise by skipping known warnings or irrelevant messages.
pub struct FilterRule {
    /// Prefixes to skip when logging output.
    pub skip_prefixes: &'static [&'static str],
}

impl FilterRule {
    /// Create a new filter rule.
    pub const fn new(skip_prefixes: &'static [&'static str]) -> Self {
        Self { skip_prefixes }
    }

    /// Check if a line should be skipped.
    fn should_skip(&self, line: &str) -> bool {
        line.is_empty() || self.skip_prefixes.iter().any(|p| line.starts_with(p))
    }

    /// Keep the lines that pass the filter.
    fn apply(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .map(|line| strip_ansi(line).trim().to_string())
            .filter(|line| !self.should_skip(line))
            .collect()
    }

    /// Log output lines that pass the filter (verbose only).
    pub fn log(&self, name: &str, output: &str) {
        let lines = self.apply(output);
        if !lines.is_empty() {
            debug!(name; "{}", lines.join("\n"));
        }
    }
}

/// Empty filter (no skipping).
pub const EMPTY_FILTER: FilterRule = FilterRule::new(&[]);

/// Git progress chatter that is not worth logging.
pub const GIT_FILTER: FilterRule = FilterRule::new(&[
    "Cloning into",
    "remote: ",
    "Receiving objects",
    "Resolving deltas",
    "Switched to",
    "Already on",
]);

// ============================================================================
// Helpers
// ============================================================================

/// Strip ANSI escape codes from string.
fn strip_ansi(s: &str) -> std::borrow::Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").unwrap());
    re.replace_all(s, "")
}

/// Render an error and its sources on one line for local logs.
///
/// A failed command contributes its filtered stderr on following lines.
pub fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = String::new();
    let mut current = Some(err);
    while let Some(e) = current {
        if !text.is_empty() {
            text.push_str(": ");
        }
        text.push_str(&e.to_string());
        if let Some(ExecError::Failed { detail, .. }) = e.downcast_ref::<ExecError>()
            && !detail.is_empty()
        {
            text.push('\n');
            text.push_str(detail);
        }
        current = e.source();
    }
    text
}

/// Collect filtered stderr (and stdout if stderr is silent) for a failure.
fn format_error(output: &Output, filter: &'static FilterRule) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines = filter.apply(&stderr);
    if !lines.is_empty() {
        return lines.join("\n");
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::cancel::cancel_pair;
    use std::time::{Duration, Instant};

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("echo")
            .arg("hello")
            .args(["world", "!"])
            .cwd("/tmp");

        assert_eq!(cmd.program, OsString::from("echo"));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_from_slice() {
        let cmd = Cmd::from_slice(&["poetry", "run", "make", "html"]);
        assert_eq!(cmd.program, OsString::from("poetry"));
        assert_eq!(cmd.args.len(), 3);
    }

    #[test]
    fn test_empty_args_filtered() {
        let cmd = Cmd::new("echo").arg("").args(["a", "", "b"]);
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn test_filter_rule() {
        let filter = FilterRule::new(&["WARN:", "INFO:"]);
        assert!(filter.should_skip("WARN: something"));
        assert!(filter.should_skip("INFO: something"));
        assert!(!filter.should_skip("ERROR: something"));
        assert!(filter.should_skip(""));
        assert_eq!(filter.apply("WARN: a\nERROR: b\n\n"), vec!["ERROR: b"]);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mRed\x1b[0m"), "Red");
        assert_eq!(strip_ansi("Plain text"), "Plain text");
    }

    #[tokio::test]
    async fn test_simple_command() {
        let output = Cmd::new("echo").arg("hello").run().await.unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_failed_command() {
        let err = Cmd::from_slice(&["sh", "-c", "echo broken >&2; exit 3"])
            .run()
            .await
            .unwrap_err();
        match err {
            ExecError::Failed { detail, .. } => assert_eq!(detail, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_output_ignores_status() {
        let output = Cmd::from_slice(&["sh", "-c", "echo partial; exit 1"])
            .output()
            .await
            .unwrap();
        assert!(!output.status.success());
        assert_eq!(output.stdout, b"partial\n");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = Cmd::new("definitely-not-a-real-program-4711")
            .output()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_runs_in_cwd() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = Cmd::new("pwd").cwd(dir.path()).run().await.unwrap();
        let printed = String::from_utf8_lossy(&output.stdout);
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            PathBuf::from(printed.trim()).canonicalize().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn test_output_until_cancelled() {
        let (handle, mut token) = cancel_pair();
        let started = Instant::now();

        let run = tokio::spawn(async move {
            Cmd::from_slice(&["sleep", "30"])
                .output_until(&mut token)
                .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Ok(None)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_stops_grandchildren() {
        let dir = tempfile::TempDir::new().unwrap();
        let cwd = dir.path().to_path_buf();
        let (handle, mut token) = cancel_pair();

        let run = tokio::spawn(async move {
            Cmd::from_slice(&["sh", "-c", "sh -c 'sleep 1; touch still-building'"])
                .cwd(cwd)
                .output_until(&mut token)
                .await
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Ok(None)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("still-building").exists());
    }

    #[tokio::test]
    async fn test_output_until_completes() {
        let mut token = CancelToken::never();
        let output = Cmd::from_slice(&["sh", "-c", "echo done"])
            .output_until(&mut token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(output.stdout, b"done\n");
    }
}
