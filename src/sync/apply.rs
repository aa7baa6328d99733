use std::cmp::Reverse;
use std::io::ErrorKind;
use std::path::Path;

use compio::fs;
use snafu::IntoError;
use tracing::{debug, info};

use crate::ext::AsyncTryFrom;
use crate::filesystem::{PathKind, RelativePath};
use crate::fingerprint::FileFingerprint;
use crate::report::{Step, SyncEvent, SyncReporter};
use crate::sync::error::{
    CompareSnafu, CopyFileSnafu, CreateDirSnafu, DirectoryNotEmptySnafu,
    InconsistentPathKindSnafu, ReadLinkSnafu, RemoveDirSnafu, RemoveFileSnafu,
};
use crate::sync::{
    ChangeSet, ItemError, PassSummary, PathKindConflict, link_target, replicate_file,
};

/// Tracks whether a step wrote any per-item line.
struct StepLog {
    step: Step,
    reported: bool,
}

/// Applies a [`ChangeSet`] to the replica, one filesystem operation at a time.
///
/// Steps run in a fixed order so every operation finds the state it needs:
/// directories exist before files are copied into them, files are gone
/// before their directories are removed, and directories are removed
/// deepest first. A failing item is reported and skipped; it never stops
/// the remaining items or steps.
pub struct Applier<'a, R> {
    source_root: &'a Path,
    replica_root: &'a Path,
    reporter: &'a R,
    summary: PassSummary,
}

impl<'a, R: SyncReporter> Applier<'a, R> {
    pub fn new(source_root: &'a Path, replica_root: &'a Path, reporter: &'a R) -> Self {
        Self {
            source_root,
            replica_root,
            reporter,
            summary: PassSummary::default(),
        }
    }

    pub async fn apply(mut self, changes: &ChangeSet) -> PassSummary {
        let conflicts = changes.kind_conflicts();
        let replaced_by_files: Vec<&RelativePath> = conflicts
            .iter()
            .filter(|conflict| conflict.source_kind == PathKind::File)
            .map(|conflict| &conflict.path)
            .collect();

        if !conflicts.is_empty() {
            self.resolve_conflicts(conflicts).await;
        }

        let mut directories_to_create: Vec<&RelativePath> = changes.new_dirs().iter().collect();
        directories_to_create.extend(
            conflicts
                .iter()
                .filter(|conflict| conflict.source_kind == PathKind::Directory)
                .map(|conflict| &conflict.path),
        );
        directories_to_create.sort();
        self.create_directories(&directories_to_create).await;

        self.copy_new_files(changes.new_files()).await;
        self.delete_files(changes.removed_files()).await;

        let mut directories_to_delete: Vec<&RelativePath> = changes.removed_dirs().iter().collect();
        directories_to_delete.extend(replaced_by_files.iter().copied());
        self.delete_directories(directories_to_delete).await;

        self.rewrite_files(changes.common_files(), &replaced_by_files)
            .await;

        info!("Applied changes to replica: {}", self.summary);
        self.summary
    }

    /// Reports every path that changed kind and deletes replica files that
    /// must make room for a directory. Replica directories that must make
    /// room for a file go through the regular directory deletion.
    async fn resolve_conflicts(&mut self, conflicts: &[PathKindConflict]) {
        let mut log = self.begin(Step::ResolveConflicts);
        for conflict in conflicts {
            self.summary.kind_conflicts += 1;
            let error = InconsistentPathKindSnafu {
                path: conflict.path.clone(),
                source_kind: conflict.source_kind,
                replica_kind: conflict.replica_kind(),
            }
            .build();
            self.fail(&mut log, error);

            if conflict.source_kind == PathKind::Directory {
                self.delete_file(&mut log, &conflict.path).await;
            }
        }
    }

    async fn create_directories(&mut self, directories: &[&RelativePath]) {
        let mut log = self.begin(Step::CreateDirectories);
        for &path in directories {
            let target = path.under(self.replica_root);
            if target.is_dir() {
                debug!("Directory {path} already present in replica");
                continue;
            }
            match fs::create_dir_all(&target).await {
                Ok(()) => {
                    self.summary.directories_created += 1;
                    self.report(&mut log, SyncEvent::DirectoryCreated(path.clone()));
                }
                Err(e) => {
                    let error = CreateDirSnafu { path: path.clone() }.into_error(e);
                    self.fail(&mut log, error);
                }
            }
        }
        self.finish(log);
    }

    async fn copy_new_files(&mut self, files: &[RelativePath]) {
        let mut log = self.begin(Step::CopyFiles);
        for path in files {
            match self.copy_from_source(path).await {
                Ok(()) => {
                    self.summary.files_copied += 1;
                    self.report(&mut log, SyncEvent::FileCopied(path.clone()));
                }
                Err(e) => self.fail(&mut log, e),
            }
        }
        self.finish(log);
    }

    async fn delete_files(&mut self, files: &[RelativePath]) {
        let mut log = self.begin(Step::DeleteFiles);
        for path in files {
            self.delete_file(&mut log, path).await;
        }
        self.finish(log);
    }

    /// Deletes directories deepest first. Deletion is never recursive: a
    /// directory that still has entries is reported, not emptied.
    async fn delete_directories(&mut self, mut directories: Vec<&RelativePath>) {
        directories.sort_by_key(|path| (Reverse(path.depth()), *path));

        let mut log = self.begin(Step::DeleteDirectories);
        for path in directories {
            match fs::remove_dir(path.under(self.replica_root)).await {
                Ok(()) => {
                    self.summary.directories_deleted += 1;
                    self.report(&mut log, SyncEvent::DirectoryDeleted(path.clone()));
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    self.summary.already_absent += 1;
                    self.report(&mut log, SyncEvent::DirectoryAlreadyAbsent(path.clone()));
                }
                Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
                    let error = DirectoryNotEmptySnafu { path: path.clone() }.build();
                    self.fail(&mut log, error);
                }
                Err(e) => {
                    let error = RemoveDirSnafu { path: path.clone() }.into_error(e);
                    self.fail(&mut log, error);
                }
            }
        }
        self.finish(log);
    }

    /// Replaces replica files whose content differs from the source, and
    /// fills in files that took the place of a removed replica directory.
    async fn rewrite_files(&mut self, common: &[RelativePath], replaced_by_files: &[&RelativePath]) {
        let mut log = self.begin(Step::RewriteFiles);

        for path in common {
            match self.content_differs(path).await {
                Ok(true) => self.rewrite_file(&mut log, path).await,
                Ok(false) => debug!("{path} is unchanged"),
                Err(e) => self.fail(&mut log, e),
            }
        }

        for &path in replaced_by_files {
            if path.under(self.replica_root).is_dir() {
                debug!("{path} is still a directory in the replica, not copying over it");
                continue;
            }
            self.rewrite_file(&mut log, path).await;
        }

        self.finish(log);
    }

    async fn rewrite_file(&mut self, log: &mut StepLog, path: &RelativePath) {
        match self.copy_from_source(path).await {
            Ok(()) => {
                self.summary.files_rewritten += 1;
                self.report(log, SyncEvent::FileRewritten(path.clone()));
            }
            Err(e) => self.fail(log, e),
        }
    }

    async fn delete_file(&mut self, log: &mut StepLog, path: &RelativePath) {
        match fs::remove_file(path.under(self.replica_root)).await {
            Ok(()) => {
                self.summary.files_deleted += 1;
                self.report(log, SyncEvent::FileDeleted(path.clone()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.summary.already_absent += 1;
                self.report(log, SyncEvent::FileAlreadyAbsent(path.clone()));
            }
            Err(e) => {
                let error = RemoveFileSnafu { path: path.clone() }.into_error(e);
                self.fail(log, error);
            }
        }
    }

    async fn copy_from_source(&self, path: &RelativePath) -> Result<(), ItemError> {
        replicate_file(&path.under(self.source_root), &path.under(self.replica_root))
            .await
            .map_err(|e| CopyFileSnafu { path: path.clone() }.into_error(e))
    }

    /// Symlinks are compared by target, everything else by content.
    async fn content_differs(&self, path: &RelativePath) -> Result<bool, ItemError> {
        let source_path = path.under(self.source_root);
        let replica_path = path.under(self.replica_root);

        let source_link = link_target(&source_path)
            .await
            .map_err(|e| ReadLinkSnafu { path: path.clone() }.into_error(e))?;
        let replica_link = link_target(&replica_path)
            .await
            .map_err(|e| ReadLinkSnafu { path: path.clone() }.into_error(e))?;
        if source_link.is_some() || replica_link.is_some() {
            return Ok(source_link != replica_link);
        }

        let source = FileFingerprint::async_try_from(source_path.as_path())
            .await
            .map_err(|e| CompareSnafu { path: path.clone() }.into_error(e))?;
        let replica = FileFingerprint::async_try_from(replica_path.as_path())
            .await
            .map_err(|e| CompareSnafu { path: path.clone() }.into_error(e))?;

        Ok(source != replica)
    }

    fn begin(&self, step: Step) -> StepLog {
        self.reporter.record(SyncEvent::StepStarted(step));
        StepLog {
            step,
            reported: false,
        }
    }

    fn report(&self, log: &mut StepLog, event: SyncEvent) {
        log.reported = true;
        self.reporter.record(event);
    }

    fn fail(&mut self, log: &mut StepLog, error: ItemError) {
        if !matches!(error, ItemError::InconsistentPathKind { .. }) {
            self.summary.failures += 1;
        }
        self.report(log, SyncEvent::ItemFailed(error));
    }

    fn finish(&self, log: StepLog) {
        if !log.reported {
            self.reporter.record(SyncEvent::NothingToDo(log.step));
        }
    }
}
