//! Path normalization utilities.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `clean_path` - lexical `.`/`..` resolution without touching the disk
//! - `expand_path` - tilde expansion for user-supplied paths

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return lexically cleaned path if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            clean_path(path)
        } else {
            std::env::current_dir()
                .map_or_else(|_| path.to_path_buf(), |cwd| clean_path(&cwd.join(path)))
        }
    })
}

/// Resolve `.` and `..` components lexically.
///
/// `..` never climbs above the root of an absolute path; for relative paths
/// leading `..` components are kept.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                );
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_absolute() {
        let path = Path::new("/absolute/path/../file.txt");
        let normalized = normalize_path(path);
        assert_eq!(normalized, PathBuf::from("/absolute/file.txt"));
    }

    #[test]
    fn test_normalize_path_relative() {
        let path = Path::new("relative/path/file.txt");
        let normalized = normalize_path(path);
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean_path(Path::new("/a/../../etc")), PathBuf::from("/etc"));
        assert_eq!(clean_path(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(clean_path(Path::new("/ws/docs/")), PathBuf::from("/ws/docs"));
    }

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path(Path::new("~/workspace"));
        assert!(!expanded.starts_with("~"));
        assert!(expanded.ends_with("workspace"));
        assert_eq!(expand_path(Path::new("/srv/ws")), PathBuf::from("/srv/ws"));
    }
}
