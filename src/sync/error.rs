use snafu::Snafu;

use crate::filesystem::{PathKind, RelativePath};
use crate::fingerprint::FingerprintError;
use crate::sync::CopyError;

/// A failure affecting a single path. The pass reports it and moves on.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ItemError {
    #[snafu(display("Failed to create directory {}", path))]
    CreateDirError {
        path: RelativePath,
        source: std::io::Error,
    },
    #[snafu(display("Failed to copy {}", path))]
    CopyFileError { path: RelativePath, source: CopyError },
    #[snafu(display("Failed to delete file {}", path))]
    RemoveFileError {
        path: RelativePath,
        source: std::io::Error,
    },
    #[snafu(display("Failed to delete directory {}", path))]
    RemoveDirError {
        path: RelativePath,
        source: std::io::Error,
    },
    #[snafu(display(
        "Directory {} still has entries that are not scheduled for deletion",
        path
    ))]
    DirectoryNotEmpty { path: RelativePath },
    #[snafu(display("Failed to read link {}", path))]
    ReadLinkError {
        path: RelativePath,
        source: std::io::Error,
    },
    #[snafu(display("Failed to compare contents of {}", path))]
    CompareError {
        path: RelativePath,
        source: FingerprintError,
    },
    #[snafu(display(
        "{} is a {} in the source but a {} in the replica",
        path,
        source_kind,
        replica_kind
    ))]
    InconsistentPathKind {
        path: RelativePath,
        source_kind: PathKind,
        replica_kind: PathKind,
    },
}
