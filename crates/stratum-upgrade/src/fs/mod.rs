//! Filesystem abstraction for the project tree.
//!
//! The reorganizer, config writer, checkpoint store and metadata resync all
//! go through [`Filesystem`], so the whole upgrade can run against
//! [`MemFs`] in tests and against [`OsFs`] for real.

mod memory;
mod os;

use std::io;
use std::path::Path;

pub use memory::MemFs;
pub use os::OsFs;

/// Kind of a directory entry. Symlinks are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryKind {
    File,
    Dir,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Operations the upgrade performs on the project tree.
///
/// All methods take `&self`; implementations with state use interior
/// mutability.
pub trait Filesystem {
    /// Returns the kind of `path`, or `NotFound`.
    fn stat(&self, path: &Path) -> io::Result<EntryKind>;

    /// Lists the immediate children of `path`, sorted by name.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Creates `path` and any missing parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Removes `path` recursively. Succeeds if it does not exist.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Copies a single file, replacing `to` if present.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copies a directory tree, creating `to` and merging into it.
    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Writes `contents` to `path`, creating or truncating it.
    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }
}
