//! The working copy on disk and the blocks inside it.
//!
//! # Module Structure
//!
//! ```text
//! workspace/
//! ├── resolve    # (block, directory, filename) -> contained absolute path
//! ├── scan       # block discovery, content file listing
//! └── mod.rs     # Workspace (this file)
//! ```
//!
//! Nothing here is cached: every call looks at the file system again, so a
//! clone, checkout or external edit is visible on the next operation.

mod resolve;
mod scan;

pub use resolve::{PathError, block_dir, resolve};
pub use scan::{BlockFile, discover_blocks, scan_block};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::AuthorConfig;

/// Layout rules for one workspace location.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    marker: String,
    content_extension: String,
    default_title: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            marker: "conf.py".to_string(),
            content_extension: "md".to_string(),
            default_title: "# Page Title".to_string(),
        }
    }

    pub fn from_config(config: &AuthorConfig) -> Self {
        Self {
            root: config.location().to_path_buf(),
            marker: config.workspace.marker.clone(),
            content_extension: config.workspace.content_extension.clone(),
            default_title: config.workspace.default_title.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Normalize a client block id: no leading slash.
    pub fn block_id(block: &str) -> &str {
        block.trim_start_matches('/')
    }

    /// All blocks in the checked-out tree, empty if there is no workspace.
    pub fn blocks(&self) -> Vec<String> {
        if !self.exists() {
            return Vec::new();
        }
        discover_blocks(&self.root, &self.marker)
    }

    /// Absolute directory of `block`, if it names an existing marker file
    /// inside the workspace.
    pub fn block_path(&self, block: &str) -> Option<PathBuf> {
        let block = Self::block_id(block);
        if Path::new(block).file_name()?.to_str()? != self.marker {
            return None;
        }
        let marker = resolve(&self.root, block, "", self.marker.as_str()).ok()?;
        if !marker.is_file() {
            return None;
        }
        marker.parent().map(Path::to_path_buf)
    }

    /// Content files of `block`, `None` if the block does not exist.
    pub fn files(&self, block: &str) -> Option<Vec<BlockFile>> {
        let dir = self.block_path(block)?;
        Some(scan_block(&dir, &self.content_extension))
    }

    /// Resolve a file inside an existing block.
    pub fn file_path(&self, block: &str, file: &BlockFile) -> Option<PathBuf> {
        self.block_path(block)?;
        match resolve(&self.root, block, &file.directory, &file.filename) {
            Ok(path) => Some(path),
            Err(err) => {
                crate::debug!("workspace"; "rejected {}/{}: {}", file.directory, file.filename, err);
                None
            }
        }
    }

    /// Whether `filename` is an editable content file.
    pub fn is_content_file(&self, filename: &str) -> bool {
        Path::new(filename).extension().and_then(|e| e.to_str())
            == Some(self.content_extension.as_str())
    }

    /// Create `path` if absent; content files start with the default title.
    ///
    /// Returns `false` when the file already existed.
    pub fn create_file(&self, path: &Path) -> io::Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let initial = if self.is_content_file(name) {
            self.default_title.clone()
        } else {
            String::new()
        };
        fs::write(path, initial)?;
        Ok(true)
    }

    /// Block directory relative to the root, with `/` separators.
    pub fn block_root(block: &str) -> String {
        block_dir(Self::block_id(block))
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
