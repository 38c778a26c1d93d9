//! In-memory [`Filesystem`] with copy fault injection.
//!
//! Paths are stored exactly as given; callers are expected to build them
//! with `Path::join` from a common root. A path with no parent (`/` or the
//! empty path) is always an existing directory.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{DirEntry, EntryKind, Filesystem};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug, Default)]
struct Tree {
    nodes: BTreeMap<PathBuf, Node>,
    failing_copies: BTreeSet<PathBuf>,
}

impl Tree {
    fn is_root(path: &Path) -> bool {
        path.parent().is_none() || path.as_os_str().is_empty()
    }

    fn kind(&self, path: &Path) -> Option<EntryKind> {
        if Self::is_root(path) {
            return Some(EntryKind::Dir);
        }
        match self.nodes.get(path)? {
            Node::File(_) => Some(EntryKind::File),
            Node::Dir => Some(EntryKind::Dir),
        }
    }

    fn require_parent_dir(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if self.kind(parent) == Some(EntryKind::Dir) => Ok(()),
            None => Ok(()),
            Some(parent) => Err(not_found(parent)),
        }
    }

    fn mkdir_all(&mut self, path: &Path) -> io::Result<()> {
        for ancestor in path.ancestors().collect::<Vec<_>>().into_iter().rev() {
            if Self::is_root(ancestor) {
                continue;
            }
            match self.nodes.get(ancestor) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} is a file", ancestor.display()),
                    ))
                }
                None => {
                    self.nodes.insert(ancestor.to_path_buf(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn check_fault(&self, path: &Path) -> io::Result<()> {
        if self.failing_copies.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected copy failure for {}", path.display()),
            ));
        }
        Ok(())
    }

    fn copy_file(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        self.check_fault(from)?;
        let contents = match self.nodes.get(from) {
            Some(Node::File(contents)) => contents.clone(),
            Some(Node::Dir) => return Err(is_a_directory(from)),
            None => return Err(not_found(from)),
        };
        self.require_parent_dir(to)?;
        if self.kind(to) == Some(EntryKind::Dir) {
            return Err(is_a_directory(to));
        }
        self.nodes.insert(to.to_path_buf(), Node::File(contents));
        Ok(())
    }

    fn copy_dir(&mut self, from: &Path, to: &Path) -> io::Result<()> {
        self.check_fault(from)?;
        if self.kind(from) != Some(EntryKind::Dir) {
            return Err(not_found(from));
        }
        self.mkdir_all(to)?;
        let children: Vec<(PathBuf, Node)> = self
            .nodes
            .range(from.to_path_buf()..)
            .skip_while(|(p, _)| p.as_path() == from)
            .take_while(|(p, _)| p.starts_with(from))
            .filter(|(p, _)| p.parent() == Some(from))
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect();
        for (child, node) in children {
            let Some(name) = child.file_name() else {
                continue;
            };
            let dst = to.join(name);
            match node {
                Node::Dir => self.copy_dir(&child, &dst)?,
                Node::File(_) => self.copy_file(&child, &dst)?,
            }
        }
        Ok(())
    }
}

/// In-memory filesystem.
#[derive(Debug, Default)]
pub struct MemFs {
    tree: Mutex<Tree>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a file, along with any missing parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> io::Result<()> {
        let path = path.as_ref();
        let mut tree = self.lock()?;
        if let Some(parent) = path.parent() {
            tree.mkdir_all(parent)?;
        }
        tree.nodes
            .insert(path.to_path_buf(), Node::File(contents.as_ref().to_vec()));
        Ok(())
    }

    /// Creates a directory and its parents.
    pub fn add_dir(&self, path: impl AsRef<Path>) -> io::Result<()> {
        self.lock()?.mkdir_all(path.as_ref())
    }

    /// Makes any copy whose source is exactly `path` fail.
    pub fn fail_copies_from(&self, path: impl AsRef<Path>) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.failing_copies.insert(path.as_ref().to_path_buf());
        }
    }

    /// Every stored path with its kind, in path order.
    pub fn entries(&self) -> Vec<(PathBuf, EntryKind)> {
        self.tree
            .lock()
            .map(|tree| {
                tree.nodes
                    .iter()
                    .map(|(p, n)| {
                        let kind = match n {
                            Node::File(_) => EntryKind::File,
                            Node::Dir => EntryKind::Dir,
                        };
                        (p.clone(), kind)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Tree>> {
        self.tree
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memfs mutex poisoned"))
    }
}

impl Filesystem for MemFs {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        self.lock()?.kind(path).ok_or_else(|| not_found(path))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let tree = self.lock()?;
        match tree.kind(path) {
            Some(EntryKind::Dir) => {}
            Some(EntryKind::File) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }
        let entries = tree
            .nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, n)| {
                let name = p.file_name()?.to_string_lossy().into_owned();
                let kind = match n {
                    Node::File(_) => EntryKind::File,
                    Node::Dir => EntryKind::Dir,
                };
                Some(DirEntry { name, kind })
            })
            .collect();
        Ok(entries)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.lock()?.mkdir_all(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.nodes.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.lock()?.copy_file(from, to)
    }

    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.lock()?.copy_dir(from, to)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.lock()?.nodes.get(path) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            Some(Node::Dir) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tree = self.lock()?;
        tree.require_parent_dir(path)?;
        if tree.kind(path) == Some(EntryKind::Dir) {
            return Err(is_a_directory(path));
        }
        tree.nodes
            .insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        format!("{} is a directory", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_file_creates_parents() {
        let fs = MemFs::new();
        fs.add_file("/p/migrations/1_x/up.sql", b"select 1").unwrap();
        assert_eq!(fs.stat(Path::new("/p/migrations")).unwrap(), EntryKind::Dir);
        assert_eq!(
            fs.read_file(Path::new("/p/migrations/1_x/up.sql")).unwrap(),
            b"select 1"
        );
    }

    #[test]
    fn read_dir_lists_only_immediate_children() {
        let fs = MemFs::new();
        fs.add_file("/p/a/inner.sql", b"").unwrap();
        fs.add_file("/p/b.sql", b"").unwrap();
        let entries = fs.read_dir(Path::new("/p")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "a".into(), kind: EntryKind::Dir },
                DirEntry { name: "b.sql".into(), kind: EntryKind::File },
            ]
        );
        assert!(fs.read_dir(Path::new("/missing")).is_err());
    }

    #[test]
    fn copy_dir_copies_nested_tree() {
        let fs = MemFs::new();
        fs.add_file("/p/m/1_x/up.sql", b"up").unwrap();
        fs.add_file("/p/m/1_x/sub/down.sql", b"down").unwrap();
        fs.add_dir("/p/m/1_x/empty").unwrap();
        fs.copy_dir(Path::new("/p/m/1_x"), Path::new("/p/m/t/1_x")).unwrap();

        assert_eq!(fs.read_file(Path::new("/p/m/t/1_x/up.sql")).unwrap(), b"up");
        assert_eq!(
            fs.read_file(Path::new("/p/m/t/1_x/sub/down.sql")).unwrap(),
            b"down"
        );
        assert_eq!(fs.stat(Path::new("/p/m/t/1_x/empty")).unwrap(), EntryKind::Dir);
        assert!(fs.exists(Path::new("/p/m/1_x/up.sql")));
    }

    #[test]
    fn copy_file_requires_destination_parent() {
        let fs = MemFs::new();
        fs.add_file("/p/s.sql", b"").unwrap();
        let err = fs
            .copy_file(Path::new("/p/s.sql"), Path::new("/p/none/s.sql"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn injected_fault_fails_copy_without_writing() {
        let fs = MemFs::new();
        fs.add_file("/p/s.sql", b"x").unwrap();
        fs.add_dir("/p/t").unwrap();
        fs.fail_copies_from("/p/s.sql");
        assert!(fs
            .copy_file(Path::new("/p/s.sql"), Path::new("/p/t/s.sql"))
            .is_err());
        assert!(!fs.exists(Path::new("/p/t/s.sql")));
    }

    #[test]
    fn remove_all_drops_subtree_only() {
        let fs = MemFs::new();
        fs.add_file("/p/a/x", b"").unwrap();
        fs.add_file("/p/ab", b"").unwrap();
        fs.remove_all(Path::new("/p/a")).unwrap();
        assert!(!fs.exists(Path::new("/p/a")));
        assert!(!fs.exists(Path::new("/p/a/x")));
        assert!(fs.exists(Path::new("/p/ab")));
        fs.remove_all(Path::new("/p/missing")).unwrap();
    }
}
