//! Scratch git remotes for tests.
//!
//! A bare repository with two branches:
//! - `main`: block `docs/source/conf.py` with `index.md` and `guide/intro.md`
//! - `draft`: `main` plus block `handbook/conf.py`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

pub struct Fixture {
    /// Keeps the scratch tree alive.
    pub dir: TempDir,
    /// Clone URL of the bare remote.
    pub url: String,
    /// Where the workspace should be cloned to (absent initially).
    pub workspace: PathBuf,
}

/// Run git in `cwd` with a fixed identity, panicking on failure.
pub fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Fixture",
            "-c",
            "user.email=fixture@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Build the remote, or `None` when git is not installed.
pub fn remote() -> Option<Fixture> {
    if which::which("git").is_err() {
        eprintln!("git not found, skipping");
        return None;
    }

    let dir = TempDir::new().unwrap();
    let root = dir.path();
    git(root, &["init", "--quiet", "--bare", "-b", "main", "remote.git"]);
    git(root, &["init", "--quiet", "-b", "main", "seed"]);

    let seed = root.join("seed");
    let bare = root.join("remote.git");
    let bare = bare.to_str().unwrap();

    write(&seed, "docs/source/conf.py", "project = 'docs'\n");
    write(&seed, "docs/source/index.md", "# Index\n");
    write(&seed, "docs/source/guide/intro.md", "# Intro\n");
    git(&seed, &["add", "--all"]);
    git(&seed, &["commit", "--quiet", "-m", "initial"]);
    git(&seed, &["remote", "add", "origin", bare]);
    git(&seed, &["push", "--quiet", "origin", "main"]);

    git(&seed, &["checkout", "--quiet", "-b", "draft"]);
    write(&seed, "handbook/conf.py", "project = 'handbook'\n");
    write(&seed, "handbook/welcome.md", "# Welcome\n");
    git(&seed, &["add", "--all"]);
    git(&seed, &["commit", "--quiet", "-m", "draft"]);
    git(&seed, &["push", "--quiet", "origin", "draft"]);

    Some(Fixture {
        url: bare.to_string(),
        workspace: root.join("ws"),
        dir,
    })
}
