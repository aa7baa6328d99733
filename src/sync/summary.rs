use std::fmt;

/// Counts of what one pass did to the replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub directories_created: usize,
    pub files_copied: usize,
    pub files_deleted: usize,
    pub directories_deleted: usize,
    pub files_rewritten: usize,
    /// Deletions that found nothing to delete.
    pub already_absent: usize,
    pub kind_conflicts: usize,
    pub failures: usize,
}

impl PassSummary {
    /// Number of filesystem changes made to the replica.
    pub fn total_actions(&self) -> usize {
        self.directories_created
            + self.files_copied
            + self.files_deleted
            + self.directories_deleted
            + self.files_rewritten
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} directories created, {} files copied, {} files deleted, {} directories deleted, {} files rewritten, {} already absent, {} kind conflicts, {} failures",
            self.directories_created,
            self.files_copied,
            self.files_deleted,
            self.directories_deleted,
            self.files_rewritten,
            self.already_absent,
            self.kind_conflicts,
            self.failures
        )
    }
}
