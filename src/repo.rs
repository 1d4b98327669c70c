//! Repository layout resolution.
//!
//! Bulk scans get handed paths of varying shapes: a worktree root with a
//! `.git` directory, a bare repository, or a gitdir itself. All the reader
//! needs from any of them is the `objects` directory; everything else
//! (refs, config, worktree state) is outside its scope.
//!
//! Only two failures are fatal to a load: the root being unreadable and
//! the absence of an `objects` directory. Anything below `objects` is
//! handled per artifact by the store.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Error resolving a repository root.
#[derive(Debug)]
#[non_exhaustive]
pub enum OpenError {
    /// Root or objects directory I/O failed.
    Io(io::Error),
    /// No `objects` directory under the root or its `.git`.
    NotAnObjectDatabase,
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "repository open failed: {err}"),
            Self::NotAnObjectDatabase => {
                write!(f, "no objects directory (not a Git repository?)")
            }
        }
    }
}

impl std::error::Error for OpenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::NotAnObjectDatabase => None,
        }
    }
}

impl From<io::Error> for OpenError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Resolved object database paths for one repository.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    /// Canonicalized root the caller handed in.
    pub root: PathBuf,
    /// The `objects` directory holding loose fan-out dirs and `pack/`.
    pub objects_dir: PathBuf,
    /// The `objects/pack` directory; may not exist in an empty repository.
    pub pack_dir: PathBuf,
}

impl RepoLayout {
    /// Resolves a repository root to its objects directory.
    ///
    /// Accepts a worktree root (`<root>/.git/objects`), a bare repository
    /// or gitdir (`<root>/objects`). The worktree form wins when both
    /// exist, matching how Git itself reads a checkout.
    ///
    /// # Errors
    /// `Io` if the root cannot be canonicalized, `NotAnObjectDatabase` if
    /// neither candidate exists.
    pub fn resolve(root: &Path) -> Result<Self, OpenError> {
        let root = fs::canonicalize(root)?;

        let candidates = [root.join(".git").join("objects"), root.join("objects")];
        let objects_dir = candidates
            .into_iter()
            .find(|dir| is_dir(dir))
            .ok_or(OpenError::NotAnObjectDatabase)?;

        let pack_dir = objects_dir.join("pack");
        Ok(Self {
            root,
            objects_dir,
            pack_dir,
        })
    }
}

#[inline]
fn is_dir(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
