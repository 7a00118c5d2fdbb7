//! Client path resolution with workspace containment.
//!
//! Every path the client names is a `(block, directory, filename)` triple.
//! Resolution joins it under the canonical workspace root and rejects
//! anything that lands outside, lexically (`..`) or through a symlink.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::utils::path::clean_path;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("workspace root `{path}` is not accessible")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{0}` is outside the workspace")]
    Containment(PathBuf),
}

/// Strip leading separators so a client value can never restart the join.
#[inline]
fn relative(segment: &str) -> &Path {
    Path::new(segment.trim_start_matches('/'))
}

/// Directory of a block, relative to the workspace root.
///
/// The block id is the marker file's path; its parent is the block directory.
pub fn block_dir(block: &str) -> &Path {
    relative(block).parent().unwrap_or(Path::new(""))
}

/// Resolve a client-supplied location to an absolute path under `root`.
///
/// The returned path is lexically clean (no `.` or `..`), so the file
/// system sees exactly the path that was checked.
pub fn resolve(
    root: &Path,
    block: &str,
    directory: &str,
    filename: &str,
) -> Result<PathBuf, PathError> {
    let root = root.canonicalize().map_err(|source| PathError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let target = clean_path(
        &root
            .join(block_dir(block))
            .join(relative(directory))
            .join(relative(filename)),
    );
    if !target.starts_with(&root) {
        return Err(PathError::Containment(target));
    }

    // A symlink below the root may still point outside of it
    let anchor = deepest_existing(&target);
    match anchor.canonicalize() {
        Ok(real) if real.starts_with(&root) => Ok(target),
        _ => Err(PathError::Containment(target)),
    }
}

/// Deepest ancestor of `path` (inclusive) that is present on disk.
///
/// Uses `symlink_metadata` so a dangling link counts as present and then
/// fails canonicalization, instead of being silently skipped.
fn deepest_existing(path: &Path) -> &Path {
    path.ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("docs/source/guide")).unwrap();
        fs::write(root.join("docs/source/conf.py"), "").unwrap();
        (dir, root)
    }

    #[test]
    fn test_block_dir() {
        assert_eq!(block_dir("docs/source/conf.py"), Path::new("docs/source"));
        assert_eq!(block_dir("/docs/source/conf.py"), Path::new("docs/source"));
        assert_eq!(block_dir("conf.py"), Path::new(""));
    }

    #[test]
    fn test_resolve_inside() {
        let (_dir, root) = setup();
        let path = resolve(&root, "docs/source/conf.py", "guide", "intro.md").unwrap();
        assert_eq!(path, root.join("docs/source/guide/intro.md"));

        let path = resolve(&root, "/docs/source/conf.py", "", "index.md").unwrap();
        assert_eq!(path, root.join("docs/source/index.md"));
    }

    #[test]
    fn test_resolve_dot_segments_inside() {
        let (_dir, root) = setup();
        let path = resolve(&root, "docs/source/conf.py", "guide/../guide/.", "a.md").unwrap();
        assert_eq!(path, root.join("docs/source/guide/a.md"));
    }

    #[test]
    fn test_parent_escape_rejected() {
        let (_dir, root) = setup();
        let err = resolve(&root, "docs/source/conf.py", "../../..", "etc/passwd");
        assert!(matches!(err, Err(PathError::Containment(_))));

        let err = resolve(&root, "../../etc/conf.py", "", "passwd");
        assert!(matches!(err, Err(PathError::Containment(_))));
    }

    #[test]
    fn test_absolute_segments_stay_inside() {
        let (_dir, root) = setup();
        let path = resolve(&root, "docs/source/conf.py", "/etc", "passwd").unwrap();
        assert!(path.starts_with(&root));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (_dir, root) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("docs/source/out")).unwrap();

        let err = resolve(&root, "docs/source/conf.py", "out", "x.md");
        assert!(matches!(err, Err(PathError::Containment(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_rejected() {
        let (_dir, root) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("missing.md"),
            root.join("docs/source/evil.md"),
        )
        .unwrap();

        let err = resolve(&root, "docs/source/conf.py", "", "evil.md");
        assert!(matches!(err, Err(PathError::Containment(_))));
    }

    #[test]
    fn test_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = resolve(&dir.path().join("gone"), "conf.py", "", "a.md");
        assert!(matches!(err, Err(PathError::Root { .. })));
    }
}
