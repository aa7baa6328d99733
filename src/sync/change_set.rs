use std::collections::BTreeSet;

use crate::filesystem::{PathKind, RelativePath, TreeSnapshot};

/// A path that is a directory in one tree and a file in the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathKindConflict {
    pub path: RelativePath,
    pub source_kind: PathKind,
}

impl PathKindConflict {
    pub fn replica_kind(&self) -> PathKind {
        match self.source_kind {
            PathKind::Directory => PathKind::File,
            PathKind::File => PathKind::Directory,
        }
    }
}

/// Differences between a source and a replica snapshot.
///
/// The five path lists are disjoint. Paths that changed kind are kept out of
/// them and listed in `kind_conflicts` instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    new_dirs: Vec<RelativePath>,
    new_files: Vec<RelativePath>,
    removed_dirs: Vec<RelativePath>,
    removed_files: Vec<RelativePath>,
    common_files: Vec<RelativePath>,
    kind_conflicts: Vec<PathKindConflict>,
}

impl ChangeSet {
    pub fn diff(source: &TreeSnapshot, replica: &TreeSnapshot) -> Self {
        let only_in = |ours: &BTreeSet<RelativePath>,
                       theirs: &BTreeSet<RelativePath>,
                       theirs_other_kind: &BTreeSet<RelativePath>| {
            ours.iter()
                .filter(|path| !theirs.contains(*path) && !theirs_other_kind.contains(*path))
                .cloned()
                .collect::<Vec<_>>()
        };

        let mut kind_conflicts: Vec<PathKindConflict> = source
            .directories()
            .intersection(replica.files())
            .map(|path| PathKindConflict {
                path: path.clone(),
                source_kind: PathKind::Directory,
            })
            .chain(
                source
                    .files()
                    .intersection(replica.directories())
                    .map(|path| PathKindConflict {
                        path: path.clone(),
                        source_kind: PathKind::File,
                    }),
            )
            .collect();
        kind_conflicts.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            new_dirs: only_in(source.directories(), replica.directories(), replica.files()),
            new_files: only_in(source.files(), replica.files(), replica.directories()),
            removed_dirs: only_in(replica.directories(), source.directories(), source.files()),
            removed_files: only_in(replica.files(), source.files(), source.directories()),
            common_files: source.files().intersection(replica.files()).cloned().collect(),
            kind_conflicts,
        }
    }

    pub fn new_dirs(&self) -> &[RelativePath] {
        &self.new_dirs
    }

    pub fn new_files(&self) -> &[RelativePath] {
        &self.new_files
    }

    pub fn removed_dirs(&self) -> &[RelativePath] {
        &self.removed_dirs
    }

    pub fn removed_files(&self) -> &[RelativePath] {
        &self.removed_files
    }

    pub fn common_files(&self) -> &[RelativePath] {
        &self.common_files
    }

    pub fn kind_conflicts(&self) -> &[PathKindConflict] {
        &self.kind_conflicts
    }

    /// True when the trees have the same structure. Common files may still
    /// differ in content.
    pub fn is_structurally_empty(&self) -> bool {
        self.new_dirs.is_empty()
            && self.new_files.is_empty()
            && self.removed_dirs.is_empty()
            && self.removed_files.is_empty()
            && self.kind_conflicts.is_empty()
    }
}
