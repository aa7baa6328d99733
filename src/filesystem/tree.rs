use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu, ensure};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ext::BestEffortPathExt;
use crate::filesystem::RelativePath;

/// Directories and files found strictly beneath one root.
///
/// Every directory on the way to a file is listed in `directories`, so
/// deletion can always work bottom-up through explicitly known paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    directories: BTreeSet<RelativePath>,
    files: BTreeSet<RelativePath>,
}

impl TreeSnapshot {
    /// Walks `root` without following symlinks.
    ///
    /// A symlink is recorded as a file whatever it points at, so link cycles
    /// cannot be entered and the link itself gets mirrored. Sockets, FIFOs
    /// and device nodes are skipped.
    pub fn scan(root: &Path) -> Result<Self, ScanError> {
        ensure!(
            root.exists(),
            RootNotFoundSnafu {
                root: root.to_path_buf(),
            }
        );
        ensure!(
            root.is_dir(),
            RootNotDirectorySnafu {
                root: root.to_path_buf(),
            }
        );

        let mut snapshot = Self::default();
        let walker = WalkDir::new(root).min_depth(1).follow_links(false);

        for entry in walker {
            let entry = entry.context(WalkSnafu {
                root: root.to_path_buf(),
            })?;
            let path = entry.path();
            let Some(relative) = RelativePath::from_root(root, path) else {
                warn!("Skipping entry outside of scan root: {}", path.display());
                continue;
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                snapshot.directories.insert(relative);
            } else if file_type.is_file() || file_type.is_symlink() {
                snapshot.files.insert(relative);
            } else {
                warn!("Skipping special file {}", path.best_effort_path_display());
            }
        }

        debug!(
            "Scanned {}: {} directories, {} files",
            root.best_effort_path_display(),
            snapshot.directories.len(),
            snapshot.files.len()
        );
        Ok(snapshot)
    }

    /// Builds a snapshot from already known paths. Parent directories of the
    /// given files are added as directories.
    #[cfg(test)]
    pub fn from_paths<D, F>(directories: D, files: F) -> Self
    where
        D: IntoIterator<Item = RelativePath>,
        F: IntoIterator<Item = RelativePath>,
    {
        let mut snapshot = Self {
            directories: directories.into_iter().collect(),
            files: BTreeSet::new(),
        };
        for file in files {
            let mut parent = file.as_path().parent().map(Path::to_path_buf);
            while let Some(directory) = parent.as_deref().and_then(RelativePath::new) {
                parent = directory.as_path().parent().map(Path::to_path_buf);
                snapshot.directories.insert(directory);
            }
            snapshot.files.insert(file);
        }
        snapshot
    }

    pub fn directories(&self) -> &BTreeSet<RelativePath> {
        &self.directories
    }

    pub fn files(&self) -> &BTreeSet<RelativePath> {
        &self.files
    }

    #[cfg(test)]
    pub fn kind_of(&self, path: &RelativePath) -> Option<crate::filesystem::PathKind> {
        use crate::filesystem::PathKind;

        if self.directories.contains(path) {
            Some(PathKind::Directory)
        } else if self.files.contains(path) {
            Some(PathKind::File)
        } else {
            None
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ScanError {
    #[snafu(display("Root directory {} does not exist", root.best_effort_path_display()))]
    RootNotFound { root: PathBuf },
    #[snafu(display("Root {} is not a directory", root.best_effort_path_display()))]
    RootNotDirectory { root: PathBuf },
    #[snafu(display("Failed to walk the tree under {}", root.best_effort_path_display()))]
    Walk {
        root: PathBuf,
        source: walkdir::Error,
    },
}
