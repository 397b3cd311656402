//! File system operations
//!
//! Local filesystem primitives. Each takes a [`SafePath`], so nothing here can
//! be reached with a path that skipped the guard.

use std::fs::{self, File};
use std::io::Result;
use std::path::Path;

use crate::storage::validation::SafePath;

/// Read a whole file
pub fn read_all(path: &SafePath) -> Result<Vec<u8>> {
    fs::read(path.as_path())
}

/// Open a file for reading
pub fn open_read(path: &SafePath) -> Result<File> {
    File::open(path.as_path())
}

/// Create or truncate a file for writing
pub fn create_write(path: &SafePath) -> Result<File> {
    File::create(path.as_path())
}

/// Create the parent directory of `path` if it lies under `root`
pub fn ensure_parent_dir(path: &SafePath, root: &Path) -> Result<()> {
    match path.as_path().parent() {
        Some(parent) if parent.starts_with(root) && !parent.is_dir() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Move a file into place
pub fn rename(from: &SafePath, to: &SafePath) -> Result<()> {
    fs::rename(from.as_path(), to.as_path())
}

/// Delete a file
pub fn remove(path: &SafePath) -> Result<()> {
    fs::remove_file(path.as_path())
}

/// Check if file exists
pub fn file_exists(path: &SafePath) -> bool {
    path.as_path().is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PathGuard;
    use std::io::Write;

    #[test]
    fn test_guarded_create_read_rename() {
        let dir = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(dir.path());

        let target = guard.guard_join("nested/out", "a.txt").unwrap();
        ensure_parent_dir(&target, guard.root()).unwrap();

        let staging = guard.guard_join("nested/out", "a.txt.part").unwrap();
        let mut file = create_write(&staging).unwrap();
        file.write_all(b"payload").unwrap();
        drop(file);

        rename(&staging, &target).unwrap();
        assert!(file_exists(&target));
        assert!(!file_exists(&staging));
        assert_eq!(read_all(&target).unwrap(), b"payload");

        remove(&target).unwrap();
        assert!(!file_exists(&target));
    }
}
