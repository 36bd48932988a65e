//! [`TestWorkspace`]: a temporary directory holding template and key files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::fixtures::{ED25519_KEY, SERVICE_ACCOUNT_KEY};

/// Temporary directory with helpers for writing build inputs.
///
/// # Example
///
/// ```rust,no_run
/// use imgbuild_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new();
/// let key = ws.write_service_account_key("sa.json");
/// ws.write("template.json", "{}");
/// assert!(key.exists());
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` inside the workspace.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write the fixture service-account key.
    pub fn write_service_account_key(&self, relative: &str) -> PathBuf {
        self.write(relative, SERVICE_ACCOUNT_KEY)
    }

    /// Write the fixture OpenSSH private key.
    pub fn write_ssh_key(&self, relative: &str) -> PathBuf {
        self.write(relative, ED25519_KEY)
    }

    /// Write `value` as pretty JSON.
    pub fn write_json(&self, relative: &str, value: &serde_json::Value) -> PathBuf {
        self.write(relative, &serde_json::to_string_pretty(value).unwrap())
    }
}
