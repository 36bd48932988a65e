//! Error types for imgbuild-config

use std::fmt;
use std::path::PathBuf;

use crate::duration::DurationError;
use crate::interpolate::InterpolateError;

/// Result type for single-failure operations in imgbuild-config
pub type Result<T> = std::result::Result<T, ConfigError>;

/// A single problem found while resolving a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Top-level key that no field maps to
    #[error("unknown configuration key: '{key}'")]
    UnknownKey { key: String },

    /// Value of the wrong shape for its field
    #[error("'{key}' expected type '{expected}', got {found}")]
    InvalidType {
        key: String,
        expected: &'static str,
        found: String,
    },

    /// Template expansion failed for a field
    #[error("error interpolating '{key}': {source}")]
    Interpolate {
        key: String,
        #[source]
        source: InterpolateError,
    },

    #[error("cannot access file '{}' with content for value of metadata key '{key}': {source}", .path.display())]
    MetadataFile {
        key: String,
        path: PathBuf,
        #[source]
        source: imgbuild_fs::Error,
    },

    #[error("fail to read service_account_key_file '{}': {message}", .path.display())]
    ServiceAccountKey { path: PathBuf, message: String },

    #[error("ssh_private_key_file '{}' is invalid: {message}", .path.display())]
    SshPrivateKey { path: PathBuf, message: String },

    /// Key file configured but no parsed key present
    #[error("service_account_key_file '{}' is set but no key was loaded from it", .path.display())]
    ServiceAccountKeyNotLoaded { path: PathBuf },

    /// `metadata_from_file` entry whose content never reached `metadata`
    #[error("metadata key '{key}' has no content loaded from file '{}'", .path.display())]
    MetadataNotLoaded { key: String, path: PathBuf },

    #[error(
        "a token or service_account_key_file must be specified \
         (checked: token, service_account_key_file, YC_TOKEN, YC_SERVICE_ACCOUNT_KEY_FILE)"
    )]
    MissingCredential,

    #[error("one of token or service_account_key_file must be specified, not both")]
    ConflictingCredentials,

    #[error("a folder_id must be specified")]
    MissingFolderId,

    #[error("a source_image_id or source_image_family must be specified")]
    MissingSourceImage,

    #[error("invalid image_family '{family}': only lowercase letters, digits and hyphens are allowed")]
    InvalidImageFamily { family: String },

    #[error(
        "invalid image_min_disk_size_gb ({min_disk_size_gb}): must be equal to or greater than disk_size_gb ({disk_size_gb})"
    )]
    ImageMinDiskSize {
        min_disk_size_gb: u32,
        disk_size_gb: u32,
    },

    #[error("invalid image_name '{name}': {reason}")]
    InvalidImageName { name: String, reason: String },

    #[error("failed to parse {key} '{value}': {source}")]
    InvalidDuration {
        key: &'static str,
        value: String,
        #[source]
        source: DurationError,
    },

    #[error("an ssh_username must be specified when communicator is 'ssh'")]
    MissingSshUsername,
}

/// Every failure found in one resolution pass.
///
/// Nothing is dropped: each independent problem appears once, in the
/// order it was found.
#[derive(Debug, Default)]
pub struct ConfigErrors {
    errors: Vec<ConfigError>,
}

impl ConfigErrors {
    pub fn new(errors: Vec<ConfigError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<ConfigError> {
        self.errors
    }

    /// Whether any contained error matches the predicate.
    pub fn any(&self, predicate: impl Fn(&ConfigError) -> bool) -> bool {
        self.errors.iter().any(predicate)
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.errors.len() == 1 { "error" } else { "errors" };
        write!(f, "{} {} occurred:", self.errors.len(), noun)?;
        for error in &self.errors {
            write!(f, "\n* {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

impl IntoIterator for ConfigErrors {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
