//! Everything resolution may consult besides the raw input

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgbuild_fs::{FileReader, LocalFs};

use crate::interpolate::InterpolateContext;

/// Fallback for `token`
pub const ENV_TOKEN: &str = "YC_TOKEN";
/// Fallback for `service_account_key_file`
pub const ENV_SERVICE_ACCOUNT_KEY_FILE: &str = "YC_SERVICE_ACCOUNT_KEY_FILE";
/// Fallback for `folder_id`
pub const ENV_FOLDER_ID: &str = "YC_FOLDER_ID";

const ENV_KEYS: [&str; 3] = [ENV_TOKEN, ENV_SERVICE_ACCOUNT_KEY_FILE, ENV_FOLDER_ID];

/// Inputs to resolution other than the raw configuration map.
///
/// The library never reads process state on its own: the clock, the
/// environment and file access all come from here.
#[derive(Clone)]
pub struct ResolveContext {
    interpolation: InterpolateContext,
    env: HashMap<String, String>,
    reader: Arc<dyn FileReader>,
    base_dir: Option<PathBuf>,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            interpolation: InterpolateContext::default(),
            env: HashMap::new(),
            reader: Arc::new(LocalFs),
            base_dir: None,
        }
    }
}

impl std::fmt::Debug for ResolveContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_keys: Vec<&String> = self.env.keys().collect();
        f.debug_struct("ResolveContext")
            .field("interpolation", &self.interpolation)
            .field("env", &env_keys)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl ResolveContext {
    /// System clock, empty environment, local filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`ResolveContext::new`], with the recognized `YC_*` variables
    /// captured from the process environment.
    pub fn from_process_env() -> Self {
        let env = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.to_string(), v)))
            .collect();
        Self::new().with_env(env)
    }

    pub fn with_interpolation(mut self, interpolation: InterpolateContext) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn FileReader>) -> Self {
        self.reader = reader;
        self
    }

    /// Directory that relative file paths are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn interpolation(&self) -> &InterpolateContext {
        &self.interpolation
    }

    pub fn reader(&self) -> &dyn FileReader {
        self.reader.as_ref()
    }

    /// Non-empty value of an environment variable.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Path to read for a user-supplied path.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Read a user-supplied path as text through the configured reader.
    pub fn read_to_string(&self, path: &Path) -> imgbuild_fs::Result<String> {
        self.reader.read_to_string(&self.resolve_path(path))
    }

    pub fn read(&self, path: &Path) -> imgbuild_fs::Result<Vec<u8>> {
        self.reader.read(&self.resolve_path(path))
    }
}
