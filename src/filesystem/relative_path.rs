use std::fmt;
use std::path::{Component, Path, PathBuf};

use derive_more::Display;

/// A path relative to a tree root.
///
/// Holds only normal components, so it never has a leading separator, a
/// trailing separator, `.` or `..`. Comparison is component-wise, which makes
/// it independent of the platform separator.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Builds a relative path from `path` with `root` stripped off.
    /// Returns `None` if `path` is not strictly beneath `root`.
    pub fn from_root(root: &Path, path: &Path) -> Option<Self> {
        let stripped = path.strip_prefix(root).ok()?;
        Self::new(stripped)
    }

    /// Returns `None` for empty paths and for anything that is not made of
    /// normal components only.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                _ => return None,
            }
        }
        if normalized.as_os_str().is_empty() {
            return None;
        }
        Some(Self(normalized))
    }

    /// Number of components; `a/b/c` has depth 3.
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The location of this path inside the tree rooted at `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in self.as_path().components() {
            if !first {
                f.write_str("/")?;
            }
            write!(f, "{}", component.as_os_str().to_string_lossy())?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelativePath({self})")
    }
}

/// What a path is in one particular tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PathKind {
    #[display("directory")]
    Directory,
    #[display("file")]
    File,
}
