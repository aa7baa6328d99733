//! Point-in-time enumeration of directory trees.
//!
//! A [`TreeSnapshot`] lists every directory and file beneath a root as
//! [`RelativePath`]s, which is all the diffing stage needs to know about a tree.

mod relative_path;
mod tree;

pub use relative_path::{PathKind, RelativePath};
pub use tree::{ScanError, TreeSnapshot};
