use std::error::Error;
use std::fmt;

use chrono::{DateTime, Local};
use derive_more::Display;

use crate::filesystem::RelativePath;
use crate::sync::{ItemError, PassSummary};

/// The stages of applying a change set, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Step {
    #[display("Resolving paths that changed kind")]
    ResolveConflicts,
    #[display("Adding new subdirectories")]
    CreateDirectories,
    #[display("Adding new files")]
    CopyFiles,
    #[display("Deleting old files")]
    DeleteFiles,
    #[display("Deleting old subdirectories")]
    DeleteDirectories,
    #[display("Rewriting changed files")]
    RewriteFiles,
}

impl Step {
    /// The line for a step that found nothing to change. Conflict resolution
    /// only runs when there are conflicts, so it has none.
    pub fn nothing_to_do(&self) -> Option<&'static str> {
        match self {
            Step::ResolveConflicts => None,
            Step::CreateDirectories => Some("no new subdirectory was created since last check"),
            Step::CopyFiles => Some("no new file was created since last check"),
            Step::DeleteFiles => Some("no file was removed since last check"),
            Step::DeleteDirectories => Some("no subdirectory was removed since last check"),
            Step::RewriteFiles => Some("no file was rewritten since last check"),
        }
    }
}

#[derive(Debug)]
pub enum SyncEvent {
    PassStarted { at: DateTime<Local> },
    StepStarted(Step),
    DirectoryCreated(RelativePath),
    FileCopied(RelativePath),
    FileDeleted(RelativePath),
    FileAlreadyAbsent(RelativePath),
    DirectoryDeleted(RelativePath),
    DirectoryAlreadyAbsent(RelativePath),
    FileRewritten(RelativePath),
    NothingToDo(Step),
    ItemFailed(ItemError),
    PassFinished(PassSummary),
    PassAborted { reason: String },
}

impl SyncEvent {
    /// Whether the line reports a failure rather than an action.
    pub fn is_error(&self) -> bool {
        matches!(self, SyncEvent::ItemFailed(_) | SyncEvent::PassAborted { .. })
    }

    /// Whether the event marks the start of a new section of the trail.
    pub fn is_heading(&self) -> bool {
        matches!(self, SyncEvent::PassStarted { .. } | SyncEvent::StepStarted(_))
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::PassStarted { at } => write!(
                f,
                " ----- Synchronization started at {} ----- ",
                at.format("%Y-%m-%d %H:%M:%S")
            ),
            SyncEvent::StepStarted(step) => write!(f, "{step}:"),
            SyncEvent::DirectoryCreated(path) => write!(f, "{path} was created"),
            SyncEvent::FileCopied(path) => write!(f, "{path} was copied"),
            SyncEvent::FileDeleted(path) => write!(f, "{path} was deleted"),
            SyncEvent::FileAlreadyAbsent(path) => write!(f, "{path} was already deleted"),
            SyncEvent::DirectoryDeleted(path) => write!(f, "{path} was deleted"),
            SyncEvent::DirectoryAlreadyAbsent(path) => write!(f, "{path} was already deleted"),
            SyncEvent::FileRewritten(path) => write!(f, "{path} was rewritten"),
            SyncEvent::NothingToDo(step) => f.write_str(step.nothing_to_do().unwrap_or_default()),
            SyncEvent::ItemFailed(error) => {
                write!(f, "ERROR: {error}")?;
                let mut source = error.source();
                while let Some(cause) = source {
                    write!(f, ": {cause}")?;
                    source = cause.source();
                }
                Ok(())
            }
            SyncEvent::PassFinished(summary) => {
                write!(f, " ----- Synchronization finished: {summary} ----- ")
            }
            SyncEvent::PassAborted { reason } => write!(f, "ERROR: synchronization aborted: {reason}"),
        }
    }
}
