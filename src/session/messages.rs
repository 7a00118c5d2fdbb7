//! Session Message Protocol
//!
//! JSON text frames with a `type` discriminator, in both directions.
//!
//! # Inbound
//!
//! - `clone-repository`, `delete-repository`, `checkout-branch`
//! - `select-block`, `add-file`, `delete-file`
//! - `load-file-content`, `save-file-content`
//! - `commit-changes`, `discard-changes`
//!
//! # Outbound
//!
//! One reply type per operation, plus the asynchronous `file-rendering` /
//! `file-rendered` pair and the `changes-found` / `no-changes-found` status.

use serde::{Deserialize, Serialize};

use crate::workspace::BlockFile;

/// File location inside a block, as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileRef {
    pub directory: String,
    pub filename: String,
    /// Some clients nest the saved content here
    #[serde(default)]
    pub content: Option<String>,
}

impl FileRef {
    pub fn block_file(&self) -> BlockFile {
        BlockFile::new(self.directory.as_str(), self.filename.as_str())
    }
}

/// Message received from the client.
///
/// Field-less operations are struct variants so extra keys are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    CloneRepository {
        url: String,
    },
    DeleteRepository {},
    CheckoutBranch {
        branch: String,
    },
    SelectBlock {
        block: String,
    },
    LoadFileContent {
        block: String,
        file: FileRef,
    },
    SaveFileContent {
        block: String,
        file: FileRef,
        #[serde(default)]
        content: Option<String>,
    },
    CommitChanges {
        name: String,
        email: String,
        message: String,
    },
    DiscardChanges {},
    AddFile {
        block: String,
        file: FileRef,
    },
    DeleteFile {
        block: String,
        file: FileRef,
    },
}

impl Request {
    /// Parse a text frame. Unknown types and missing fields are errors.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CloneRepository { .. } => "clone-repository",
            Self::DeleteRepository {} => "delete-repository",
            Self::CheckoutBranch { .. } => "checkout-branch",
            Self::SelectBlock { .. } => "select-block",
            Self::LoadFileContent { .. } => "load-file-content",
            Self::SaveFileContent { .. } => "save-file-content",
            Self::CommitChanges { .. } => "commit-changes",
            Self::DiscardChanges {} => "discard-changes",
            Self::AddFile { .. } => "add-file",
            Self::DeleteFile { .. } => "delete-file",
        }
    }
}

/// Message sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    /// Fresh clone with the branches the remote offers
    Repository { branches: Vec<String> },

    RepositoryDeleted,

    /// Branch checked out; blocks of the new tree
    Branch { blocks: Vec<String> },

    /// Content files of a block
    Block { path: String, files: Vec<BlockFile> },

    FileContent { content: String },

    /// A render has been scheduled
    FileRendering,

    /// Render finished for the current file
    FileRendered { url: String, output: String },

    ChangesCommitted,
    ChangesDiscarded,
    ChangesFound,
    NoChangesFound,

    /// Named operation failed (diagnostics mode only, no detail)
    OperationFailed { operation: String },
}

impl Response {
    /// Change-status message for a dirty flag.
    pub fn status(dirty: bool) -> Self {
        if dirty {
            Self::ChangesFound
        } else {
            Self::NoChangesFound
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
