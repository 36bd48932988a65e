//! File-read capability used during configuration resolution
//!
//! Resolution only ever reads local files (key files, metadata payloads).
//! The [`FileReader`] trait lets callers swap the real filesystem for an
//! in-memory one, which keeps resolution deterministic in tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Read access to files referenced by a configuration.
pub trait FileReader: Send + Sync {
    /// Read the whole file as bytes.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read the whole file as UTF-8 text.
    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 {
            path: path.to_path_buf(),
        })
    }
}

/// Reads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl FileReader for LocalFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tracing::debug!(path = %path.display(), "Reading file");
        if path.is_dir() {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        fs::read(path).map_err(|e| Error::io(path, e))
    }
}

/// In-memory file set.
///
/// Paths are matched exactly as given; no normalization is applied.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any previous content at the same path.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileReader for MemoryFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            Error::io(
                path,
                io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_fs_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("startup.sh");
        fs::write(&path, "#!/bin/sh\necho hi\n").unwrap();

        let content = LocalFs.read_to_string(&path).unwrap();
        assert_eq!(content, "#!/bin/sh\necho hi\n");
    }

    #[test]
    fn local_fs_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = LocalFs.read(&dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn local_fs_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = LocalFs.read(dir.path()).unwrap_err();
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn memory_fs_lookup() {
        let fs = MemoryFs::new().with_file("/keys/sa.json", "{}");
        assert_eq!(fs.read_to_string(Path::new("/keys/sa.json")).unwrap(), "{}");
        assert!(fs.read(Path::new("/keys/other.json")).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_fs_invalid_utf8() {
        let fs = MemoryFs::new().with_file("bin", vec![0xff, 0xfe]);
        let err = fs.read_to_string(Path::new("bin")).unwrap_err();
        assert!(matches!(err, Error::InvalidUtf8 { .. }));
    }
}
