//! One handler per inbound message type.
//!
//! Guards at the top of each handler turn a missing workspace, an unknown
//! block or a rejected path into a silent no-op.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Event, Outbox, Request, Response, Session, change_status};
use crate::render::output_url;
use crate::repo::Identity;
use crate::workspace::{BlockFile, Workspace};
use crate::{debug, log};

/// Block directory and target file for a file operation.
struct Target {
    block_dir: PathBuf,
    path: PathBuf,
}

impl Session {
    pub(super) fn dispatch(&mut self, request: Request) {
        match request {
            Request::CloneRepository { url } => self.clone_repository(url),
            Request::DeleteRepository {} => self.delete_repository(),
            Request::CheckoutBranch { branch } => self.checkout_branch(branch),
            Request::SelectBlock { block } => self.select_block(block),
            Request::LoadFileContent { block, file } => self.load_file_content(&block, &file.block_file()),
            Request::SaveFileContent {
                block,
                file,
                content,
            } => {
                match content.or_else(|| file.content.clone()) {
                    Some(content) => self.save_file_content(&block, &file.block_file(), &content),
                    None => debug!("session"; "save-file-content without content"),
                }
            }
            Request::CommitChanges {
                name,
                email,
                message,
            } => self.commit_changes(name, email, message),
            Request::DiscardChanges {} => self.discard_changes(),
            Request::AddFile { block, file } => self.add_file(&block, &file.block_file()),
            Request::DeleteFile { block, file } => self.delete_file(&block, &file.block_file()),
        }
    }

    // ========================================================================
    // repository
    // ========================================================================

    fn clone_repository(&mut self, url: String) {
        self.cancel_render();
        let (backend, outbox, events) = self.task_handles();
        let diagnostics = backend.diagnostics;

        tokio::spawn(async move {
            match backend.repo.clone_url(&url).await {
                Ok(branches) => {
                    let _ = events.send(Event::Branch(None));
                    outbox.send(Response::Repository { branches });
                }
                Err(err) => fail(&outbox, diagnostics, "clone-repository", &err.chain()),
            }
        });
    }

    fn delete_repository(&mut self) {
        self.cancel_render();
        let (backend, outbox, events) = self.task_handles();
        let diagnostics = backend.diagnostics;

        tokio::spawn(async move {
            match backend.repo.delete().await {
                Ok(()) => {
                    log!("repo"; "deleted {}", backend.repo.root().display());
                    let _ = events.send(Event::Branch(None));
                    outbox.send(Response::RepositoryDeleted);
                }
                Err(err) => fail(&outbox, diagnostics, "delete-repository", &err.chain()),
            }
        });
    }

    fn checkout_branch(&mut self, branch: String) {
        if !self.backend.workspace.exists() {
            return;
        }
        let (backend, outbox, events) = self.task_handles();
        let diagnostics = backend.diagnostics;

        tokio::spawn(async move {
            match backend.repo.checkout(&branch).await {
                Ok(true) => {
                    let blocks = backend.workspace.blocks();
                    let _ = events.send(Event::Branch(Some(branch)));
                    outbox.send(Response::Branch { blocks });
                }
                Ok(false) => debug!("repo"; "no branch named {}", branch),
                Err(err) => fail(&outbox, diagnostics, "checkout-branch", &err.chain()),
            }
        });
    }

    fn commit_changes(&mut self, name: String, email: String, message: String) {
        if name.is_empty() || email.is_empty() || message.is_empty() {
            debug!("session"; "commit-changes with empty identity or message");
            return;
        }
        if !self.backend.workspace.exists() {
            return;
        }
        let (backend, outbox, _) = self.task_handles();
        let diagnostics = backend.diagnostics;
        let identity = Identity { name, email };

        tokio::spawn(async move {
            match backend.repo.commit_and_push(&identity, &message).await {
                Ok(committed) => {
                    if !committed {
                        debug!("repo"; "nothing to commit");
                    }
                    outbox.send(Response::ChangesCommitted);
                    change_status(&backend, &outbox).await;
                }
                Err(err) => fail(&outbox, diagnostics, "commit-changes", &err.chain()),
            }
        });
    }

    fn discard_changes(&mut self) {
        if !self.backend.workspace.exists() {
            return;
        }
        let (backend, outbox, _) = self.task_handles();
        let diagnostics = backend.diagnostics;

        tokio::spawn(async move {
            match backend.repo.discard().await {
                Ok(()) => {
                    outbox.send(Response::ChangesDiscarded);
                    change_status(&backend, &outbox).await;
                }
                Err(err) => fail(&outbox, diagnostics, "discard-changes", &err.chain()),
            }
        });
    }

    // ========================================================================
    // blocks and files
    // ========================================================================

    fn select_block(&mut self, block: String) {
        if self.send_block(&block) {
            self.block = Some(Workspace::block_id(&block).to_string());
        }
    }

    fn load_file_content(&mut self, block: &str, file: &BlockFile) {
        let Some(target) = self.target(block, file) else {
            return;
        };
        if !target.path.is_file() {
            return;
        }
        let content = match fs::read(&target.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                log!("error"; "read {}: {}", target.path.display(), err);
                return;
            }
        };

        self.outbox.send(Response::FileContent { content });
        self.render_file("load-file-content", block, file, target.block_dir);
    }

    fn save_file_content(&mut self, block: &str, file: &BlockFile, content: &str) {
        let Some(target) = self.target(block, file) else {
            return;
        };
        if target.path.is_file() {
            match fs::write(&target.path, content) {
                Ok(()) => self.render_file("save-file-content", block, file, target.block_dir),
                Err(err) => log!("error"; "write {}: {}", target.path.display(), err),
            }
        }
        self.spawn_change_status();
    }

    fn add_file(&mut self, block: &str, file: &BlockFile) {
        let Some(target) = self.target(block, file) else {
            return;
        };
        if let Err(err) = self.backend.workspace.create_file(&target.path) {
            log!("error"; "create {}: {}", target.path.display(), err);
        }
        self.send_block(block);
        self.spawn_change_status();
    }

    fn delete_file(&mut self, block: &str, file: &BlockFile) {
        let Some(target) = self.target(block, file) else {
            return;
        };
        if target.path.is_file()
            && let Err(err) = fs::remove_file(&target.path)
        {
            log!("error"; "delete {}: {}", target.path.display(), err);
        }
        self.send_block(block);
        self.spawn_change_status();
    }

    // ========================================================================
    // helpers
    // ========================================================================

    /// Reply with the block's file listing. `false` if there is no such block.
    fn send_block(&self, block: &str) -> bool {
        match self.backend.workspace.files(block) {
            Some(files) => {
                self.outbox.send(Response::Block {
                    path: block.to_string(),
                    files,
                });
                true
            }
            None => false,
        }
    }

    /// Resolve a file operation's target inside an existing block.
    fn target(&self, block: &str, file: &BlockFile) -> Option<Target> {
        let workspace = &self.backend.workspace;
        let block_dir = workspace.block_path(block)?;
        let path = workspace.file_path(block, file)?;
        Some(Target { block_dir, path })
    }

    /// Schedule a render for `file` and work out where its output will be.
    fn render_file(&mut self, operation: &'static str, block: &str, file: &BlockFile, block_dir: PathBuf) {
        let block_root = Workspace::block_root(block);
        let project = self.backend.pipeline.project_dir(Path::new(&block_root));
        let url = output_url(
            &project.to_string_lossy(),
            &file.directory,
            &file.filename,
            &self.backend.output_extension,
        );
        self.schedule_render(operation, block_dir, url);
    }

    fn task_handles(
        &self,
    ) -> (
        Arc<super::Backend>,
        Outbox,
        tokio::sync::mpsc::UnboundedSender<Event>,
    ) {
        (
            Arc::clone(&self.backend),
            self.outbox.clone(),
            self.events_tx.clone(),
        )
    }
}

/// Log a failed background operation; name it to the client if configured.
pub(super) fn fail(outbox: &Outbox, diagnostics: bool, operation: &'static str, detail: &str) {
    log!("error"; "{} failed: {}", operation, detail);
    if diagnostics {
        outbox.send(Response::OperationFailed {
            operation: operation.to_string(),
        });
    }
}
