//! Block discovery and content file listing.

use std::path::Path;

use jwalk::WalkDir;
use serde::{Deserialize, Serialize};

/// Directories never descended into.
const IGNORED_DIRS: &[&str] = &[".git"];

/// A content file inside a block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockFile {
    /// Directory relative to the block directory, `""` for the block itself.
    #[serde(default)]
    pub directory: String,
    pub filename: String,
}

impl BlockFile {
    pub fn new(directory: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename: filename.into(),
        }
    }
}

/// Sorted, hidden-inclusive walk that skips `IGNORED_DIRS`.
fn walk(dir: &Path) -> WalkDir {
    WalkDir::new(dir)
        .sort(true)
        .skip_hidden(false)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    let name = e.file_name().to_str().unwrap_or_default();
                    !(e.file_type().is_dir() && IGNORED_DIRS.contains(&name))
                })
            });
        })
}

/// Join relative path components with `/`, whatever the platform separator.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Find every block under `root`.
///
/// A block id is the path of a `marker` file relative to `root`, with `/`
/// separators and no leading slash.
pub fn discover_blocks(root: &Path, marker: &str) -> Vec<String> {
    let mut blocks: Vec<String> = walk(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && e.file_name().to_str() == Some(marker))
        .filter_map(|e| {
            let path = e.path();
            path.strip_prefix(root).ok().map(slash_path)
        })
        .collect();
    blocks.sort();
    blocks
}

/// List content files below `block_dir`.
///
/// Only regular files whose extension equals `extension` are listed.
pub fn scan_block(block_dir: &Path, extension: &str) -> Vec<BlockFile> {
    let mut files: Vec<BlockFile> = walk(block_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                return None;
            }
            let rel = path.strip_prefix(block_dir).ok()?;
            let filename = rel.file_name()?.to_string_lossy().into_owned();
            let directory = rel.parent().map(slash_path).unwrap_or_default();
            Some(BlockFile::new(directory, filename))
        })
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_blocks() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "docs/source/conf.py");
        touch(root, "handbook/conf.py");
        touch(root, "README.md");
        touch(root, ".git/hooks/conf.py");

        let blocks = discover_blocks(root, "conf.py");
        assert_eq!(blocks, ["docs/source/conf.py", "handbook/conf.py"]);
    }

    #[test]
    fn test_discover_no_blocks() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.md");
        assert!(discover_blocks(dir.path(), "conf.py").is_empty());
    }

    #[test]
    fn test_scan_block_lists_content_files() {
        let dir = TempDir::new().unwrap();
        let block = dir.path().join("docs/source");
        touch(&block, "conf.py");
        touch(&block, "index.md");
        touch(&block, "guide/intro.md");
        touch(&block, "guide/deep/more.md");
        touch(&block, "guide/image.png");
        touch(&block, ".hidden.md");

        let files = scan_block(&block, "md");
        assert_eq!(
            files,
            [
                BlockFile::new("", ".hidden.md"),
                BlockFile::new("", "index.md"),
                BlockFile::new("guide", "intro.md"),
                BlockFile::new("guide/deep", "more.md"),
            ]
        );
    }

    #[test]
    fn test_scan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        for name in ["c.md", "a.md", "b/z.md", "b/a.md"] {
            touch(dir.path(), name);
        }
        assert_eq!(scan_block(dir.path(), "md"), scan_block(dir.path(), "md"));
    }

    #[test]
    fn test_block_file_json_shape() {
        let json = serde_json::to_string(&BlockFile::new("guide", "intro.md")).unwrap();
        assert_eq!(json, r#"{"directory":"guide","filename":"intro.md"}"#);
    }
}
