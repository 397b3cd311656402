//! Path validation
//!
//! Confines every local path the pool touches to a single safe root.
//! Paths are cleaned lexically (`.` and `..` are resolved without touching
//! the filesystem) and then compared component by component against the
//! root, so `/tmp/foo` never matches `/tmp/foobar`.

use log::warn;
use std::path::{Component, Path, PathBuf};

use crate::error::GuardError;

/// Resolution of the directory all local I/O is confined to.
pub struct SafeRoot;

impl SafeRoot {
    /// Resolve the safe root.
    ///
    /// An explicit root wins; relative roots are anchored at the current
    /// working directory. Without one the current working directory is used,
    /// falling back to the OS temp directory when it cannot be determined.
    pub fn resolve(explicit: Option<&Path>) -> PathBuf {
        let base = || std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir());
        let root = match explicit {
            Some(path) if path.is_absolute() => path.to_path_buf(),
            Some(path) => base().join(path),
            None => base(),
        };
        clean_path(&root)
    }
}

/// A local path that has passed the guard.
///
/// Only [`PathGuard`] constructs these, and the filesystem helpers in
/// `storage::filesystem` accept nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafePath(PathBuf);

impl SafePath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for SafePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Validates local paths against the safe root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
    enforce: bool,
}

impl PathGuard {
    /// Create an enforcing guard rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: SafeRoot::resolve(Some(root.as_ref())),
            enforce: true,
        }
    }

    /// Turn enforcement on or off. With enforcement off, escapes are logged
    /// but allowed.
    pub fn with_enforcement(mut self, enforce: bool) -> Self {
        self.enforce = enforce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enforcing(&self) -> bool {
        self.enforce
    }

    /// Clean `path` and check that it lies at or under the root.
    ///
    /// Relative paths are interpreted relative to the root.
    pub fn guard(&self, path: impl AsRef<Path>) -> Result<SafePath, GuardError> {
        let path = path.as_ref();
        let candidate = if path.is_absolute() {
            clean_path(path)
        } else {
            clean_path(&self.root.join(path))
        };

        if candidate.starts_with(&self.root) {
            return Ok(SafePath(candidate));
        }

        if self.enforce {
            Err(GuardError::PathViolation {
                path: candidate,
                root: self.root.clone(),
            })
        } else {
            warn!(
                "Path {} escapes safe root {} (enforcement disabled)",
                candidate.display(),
                self.root.display()
            );
            Ok(SafePath(candidate))
        }
    }

    /// Join `dir` and `file_name`, then guard the result.
    pub fn guard_join(
        &self,
        dir: impl AsRef<Path>,
        file_name: &str,
    ) -> Result<SafePath, GuardError> {
        if file_name.trim().is_empty() {
            return Err(GuardError::EmptyFileName);
        }
        self.guard(dir.as_ref().join(file_name))
    }
}

/// Lexically clean a path: drop `.`, fold `..` into its parent and never
/// climb above the root directory.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => cleaned.push(prefix.as_os_str()),
            Component::RootDir => cleaned.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            Component::Normal(segment) => cleaned.push(segment),
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}
