//! The synchronization engine: diff two snapshots, then converge the replica.

mod apply;
mod change_set;
mod copy;
mod error;
mod mirror;
mod summary;

pub use apply::Applier;
pub use change_set::{ChangeSet, PathKindConflict};
pub use copy::{CopyError, link_target, replicate_file};
pub use error::ItemError;
pub use mirror::{Mirror, PassError};
pub use summary::PassSummary;
