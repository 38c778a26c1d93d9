//! [`Filesystem`] over `std::fs`.

use std::fs;
use std::io;
use std::path::Path;

use super::{DirEntry, EntryKind, Filesystem};

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl Filesystem for OsFs {
    fn stat(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let kind = self.stat(&entry.path())?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    fn copy_dir(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::create_dir_all(to)?;
        for entry in self.read_dir(from)? {
            let src = from.join(&entry.name);
            let dst = to.join(&entry.name);
            match entry.kind {
                EntryKind::Dir => self.copy_dir(&src, &dst)?,
                EntryKind::File => self.copy_file(&src, &dst)?,
            }
        }
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_is_recursive_and_sorted_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("b.sql"), b"b").unwrap();
        fs::write(src.join("a.sql"), b"a").unwrap();
        fs::write(src.join("nested/c.sql"), b"c").unwrap();

        let dst = tmp.path().join("dst");
        OsFs.copy_dir(&src, &dst).unwrap();

        let names: Vec<_> = OsFs
            .read_dir(&dst)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.sql", "b.sql", "nested"]);
        assert_eq!(OsFs.read_file(&dst.join("nested/c.sql")).unwrap(), b"c");
        assert_eq!(OsFs.stat(&dst.join("nested")).unwrap(), EntryKind::Dir);
    }

    #[test]
    fn remove_all_handles_files_dirs_and_missing_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir_all(dir.join("x")).unwrap();
        let file = tmp.path().join("f.yaml");
        fs::write(&file, b"").unwrap();

        OsFs.remove_all(&dir).unwrap();
        OsFs.remove_all(&file).unwrap();
        OsFs.remove_all(&tmp.path().join("missing")).unwrap();
        assert!(!OsFs.exists(&dir));
        assert!(!OsFs.exists(&file));
    }
}
