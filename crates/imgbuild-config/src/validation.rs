//! Validator: cross-field rules over a defaulted configuration
//!
//! Every rule runs on every pass; a failing rule never hides the result
//! of another.

use std::sync::LazyLock;

use regex::Regex;

use crate::diagnostics::Diagnostics;
use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigErrors};
use crate::interpolate::has_markers;
use crate::types::{BuildConfig, CommunicatorType};

/// Required prefix of every image name.
pub const IMAGE_NAME_PREFIX: &str = "packer-";

static IMAGE_FAMILY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]*$").expect("Invalid image family regex"));

type Rule = fn(&BuildConfig) -> Option<ConfigError>;

const RULES: &[(&str, Rule)] = &[
    ("credential", check_credential),
    ("service_account_key", check_service_account_key),
    ("folder_id", check_folder_id),
    ("source_image", check_source_image),
    ("image_family", check_image_family),
    ("image_min_disk_size_gb", check_min_disk_size),
    ("image_name", check_image_name),
    ("ssh_timeout", check_ssh_timeout),
    ("state_timeout", check_state_timeout),
    ("ssh_username", check_ssh_username),
];

/// Run every rule, appending failures to `diag`.
///
/// A failure already recorded by normalization for the same key file or
/// metadata key is not reported again.
pub fn validate_into(config: &BuildConfig, diag: &mut Diagnostics) {
    for (name, rule) in RULES {
        match rule(config) {
            Some(error) => report(diag, error),
            None => tracing::trace!(rule = *name, "Rule passed"),
        }
    }
    for error in check_metadata_files(config) {
        report(diag, error);
    }
}

fn report(diag: &mut Diagnostics, error: ConfigError) {
    if already_reported(diag, &error) {
        tracing::trace!(%error, "Already reported during normalization");
        return;
    }
    diag.error(error);
}

fn already_reported(diag: &Diagnostics, error: &ConfigError) -> bool {
    diag.errors().iter().any(|reported| match (reported, error) {
        (
            ConfigError::ServiceAccountKey { path: a, .. },
            ConfigError::ServiceAccountKeyNotLoaded { path: b },
        ) => a == b,
        (ConfigError::MetadataFile { key: a, .. }, ConfigError::MetadataNotLoaded { key: b, .. }) => {
            a == b
        }
        _ => false,
    })
}

/// Check a configuration on its own.
///
/// Returns the warnings produced, and every rule failure aggregated.
pub fn validate(config: &BuildConfig) -> (Vec<String>, Result<(), ConfigErrors>) {
    let mut diag = Diagnostics::new();
    validate_into(config, &mut diag);
    diag.finish()
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Exactly one of token and key file.
///
/// A key file that failed to load still counts as configured; the
/// normalizer has already reported why it failed.
fn check_credential(config: &BuildConfig) -> Option<ConfigError> {
    let token = is_set(config.token.as_deref());
    let key_file = config
        .service_account_key_file
        .as_ref()
        .is_some_and(|p| !p.as_os_str().is_empty());

    match (token, key_file) {
        (false, false) => Some(ConfigError::MissingCredential),
        (true, true) => Some(ConfigError::ConflictingCredentials),
        _ => None,
    }
}

/// A configured key file must have produced a usable key.
fn check_service_account_key(config: &BuildConfig) -> Option<ConfigError> {
    let path = config
        .service_account_key_file
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())?;
    config
        .service_account_key
        .is_none()
        .then(|| ConfigError::ServiceAccountKeyNotLoaded { path: path.clone() })
}

/// Every `metadata_from_file` key must carry its content in `metadata`.
fn check_metadata_files(config: &BuildConfig) -> Vec<ConfigError> {
    config
        .metadata_from_file
        .iter()
        .filter(|(key, _)| !config.metadata.contains_key(*key))
        .map(|(key, path)| ConfigError::MetadataNotLoaded {
            key: key.clone(),
            path: path.clone(),
        })
        .collect()
}

fn check_folder_id(config: &BuildConfig) -> Option<ConfigError> {
    config.folder_id.is_empty().then_some(ConfigError::MissingFolderId)
}

fn check_source_image(config: &BuildConfig) -> Option<ConfigError> {
    let id = is_set(config.source_image_id.as_deref());
    let family = is_set(config.source_image_family.as_deref());
    (!id && !family).then_some(ConfigError::MissingSourceImage)
}

fn check_image_family(config: &BuildConfig) -> Option<ConfigError> {
    let family = config.image_family.as_deref()?;
    (!IMAGE_FAMILY.is_match(family)).then(|| ConfigError::InvalidImageFamily {
        family: family.to_string(),
    })
}

/// The image must not allow disks smaller than the build disk.
fn check_min_disk_size(config: &BuildConfig) -> Option<ConfigError> {
    let min = config.image_min_disk_size_gb?;
    (min < config.disk_size_gb).then_some(ConfigError::ImageMinDiskSize {
        min_disk_size_gb: min,
        disk_size_gb: config.disk_size_gb,
    })
}

fn check_image_name(config: &BuildConfig) -> Option<ConfigError> {
    let name = &config.image_name;
    let reason = if !name.starts_with(IMAGE_NAME_PREFIX) {
        format!("must start with '{IMAGE_NAME_PREFIX}'")
    } else if has_markers(name) {
        "still contains template markers".to_string()
    } else {
        return None;
    };
    Some(ConfigError::InvalidImageName {
        name: name.clone(),
        reason,
    })
}

fn check_duration(key: &'static str, value: &str) -> Option<ConfigError> {
    parse_duration(value)
        .err()
        .map(|source| ConfigError::InvalidDuration {
            key,
            value: value.to_string(),
            source,
        })
}

fn check_ssh_timeout(config: &BuildConfig) -> Option<ConfigError> {
    check_duration("ssh_timeout", &config.communicator.ssh_timeout)
}

fn check_state_timeout(config: &BuildConfig) -> Option<ConfigError> {
    check_duration("state_timeout", &config.state_timeout)
}

fn check_ssh_username(config: &BuildConfig) -> Option<ConfigError> {
    let communicator = &config.communicator;
    (communicator.communicator == CommunicatorType::Ssh && communicator.ssh_username.is_empty())
        .then_some(ConfigError::MissingSshUsername)
}
