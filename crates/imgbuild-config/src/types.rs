//! The resolved build configuration and its partial, pre-default form

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::defaults::{DEFAULT_SSH_HANDSHAKE_ATTEMPTS, DEFAULT_SSH_PORT, DEFAULT_TIMEOUT};
use crate::duration::parse_duration;
use crate::keys::{ServiceAccountKey, SigningKey};

/// How the builder connects to the provisioned instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicatorType {
    #[default]
    Ssh,
    None,
}

impl CommunicatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicatorType::Ssh => "ssh",
            CommunicatorType::None => "none",
        }
    }
}

impl fmt::Display for CommunicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommunicatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ssh" => Ok(CommunicatorType::Ssh),
            "none" => Ok(CommunicatorType::None),
            other => Err(other.to_string()),
        }
    }
}

/// Remote-login settings for the provisioned instance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunicatorConfig {
    pub communicator: CommunicatorType,

    /// Overrides the address discovered from the instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_host: Option<String>,

    pub ssh_port: u16,

    pub ssh_username: String,

    #[serde(skip)]
    pub ssh_password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_private_key_file: Option<PathBuf>,

    /// Parsed content of `ssh_private_key_file`
    #[serde(skip)]
    pub ssh_private_key: Option<SigningKey>,

    /// Raw duration string, checked by the validator
    pub ssh_timeout: String,

    pub ssh_handshake_attempts: u32,

    pub ssh_agent_auth: bool,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            communicator: CommunicatorType::default(),
            ssh_host: None,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_username: String::new(),
            ssh_password: None,
            ssh_private_key_file: None,
            ssh_private_key: None,
            ssh_timeout: DEFAULT_TIMEOUT.to_string(),
            ssh_handshake_attempts: DEFAULT_SSH_HANDSHAKE_ATTEMPTS,
            ssh_agent_auth: false,
        }
    }
}

/// Parameters handed to the remote-login collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLogin {
    pub port: u16,
    pub username: String,
    pub timeout: Duration,
}

impl CommunicatorConfig {
    /// Port, username and timeout for connecting to the instance.
    ///
    /// On an accepted configuration the timeout always parses; otherwise
    /// the default timeout is used.
    pub fn remote_login(&self) -> RemoteLogin {
        let timeout = parse_duration(&self.ssh_timeout)
            .or_else(|_| parse_duration(DEFAULT_TIMEOUT))
            .unwrap_or(Duration::from_secs(300));
        RemoteLogin {
            port: self.ssh_port,
            username: self.ssh_username.clone(),
            timeout,
        }
    }
}

/// Which credential authenticates API calls
#[derive(Debug, Clone, PartialEq)]
pub enum Credential<'a> {
    Token(&'a str),
    ServiceAccountKey(&'a ServiceAccountKey),
}

/// How the source image is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceImageSelector {
    Id(String),
    Family { folder_id: String, family: String },
}

/// A fully resolved Yandex Cloud build configuration.
///
/// Produced only by [`crate::prepare`]; every accepted value satisfies the
/// validation rules and carries no template markers in templated fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfig {
    /// API endpoint, `host:port`
    pub endpoint: String,

    #[serde(skip)]
    pub token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_account_key_file: Option<PathBuf>,

    /// Parsed content of `service_account_key_file`
    #[serde(skip)]
    pub service_account_key: Option<ServiceAccountKey>,

    pub folder_id: String,
    pub zone: String,

    pub platform_id: String,
    pub instance_cores: u32,
    pub instance_gpus: u32,
    pub instance_mem_gb: u32,
    pub instance_name: String,
    pub labels: BTreeMap<String, String>,
    pub preemptible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_log_file: Option<String>,

    /// Instance metadata with `metadata_from_file` contents merged in
    pub metadata: BTreeMap<String, String>,
    /// Metadata keys whose values were read from files, with their paths
    pub metadata_from_file: BTreeMap<String, PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_image_family: Option<String>,
    pub source_image_folder_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    pub disk_size_gb: u32,
    pub disk_type: String,

    pub image_name: String,
    pub image_description: String,
    /// `Some("")` is an explicit empty family and is distinct from unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_family: Option<String>,
    pub image_labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_min_disk_size_gb: Option<u32>,
    pub image_product_ids: Vec<String>,
    pub target_image_folder_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    pub use_ipv4_nat: bool,
    pub use_ipv6: bool,
    pub use_internal_ip: bool,

    /// Raw duration string, checked by the validator
    pub state_timeout: String,

    #[serde(flatten)]
    pub communicator: CommunicatorConfig,
}

impl BuildConfig {
    /// The configured credential, token first.
    pub fn credential(&self) -> Option<Credential<'_>> {
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            return Some(Credential::Token(token));
        }
        self.service_account_key
            .as_ref()
            .map(Credential::ServiceAccountKey)
    }

    /// Image lookup: by id when set, else by family in the source folder.
    pub fn source_image_selector(&self) -> Option<SourceImageSelector> {
        if let Some(id) = self.source_image_id.as_deref().filter(|s| !s.is_empty()) {
            return Some(SourceImageSelector::Id(id.to_string()));
        }
        self.source_image_family
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|family| SourceImageSelector::Family {
                folder_id: self.source_image_folder_id.clone(),
                family: family.to_string(),
            })
    }

    /// Timeout for long-running cloud operations.
    pub fn state_timeout_duration(&self) -> Duration {
        parse_duration(&self.state_timeout)
            .or_else(|_| parse_duration(DEFAULT_TIMEOUT))
            .unwrap_or(Duration::from_secs(300))
    }

    pub fn remote_login(&self) -> RemoteLogin {
        self.communicator.remote_login()
    }
}

/// Typed fields as decoded from the raw input, before defaulting.
///
/// `None` means the key was absent, `null`, or an empty identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub service_account_key_file: Option<PathBuf>,
    pub service_account_key: Option<ServiceAccountKey>,
    pub folder_id: Option<String>,
    pub zone: Option<String>,

    pub platform_id: Option<String>,
    pub instance_cores: Option<u32>,
    pub instance_gpus: Option<u32>,
    pub instance_mem_gb: Option<u32>,
    pub instance_name: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub preemptible: Option<bool>,
    pub serial_log_file: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub metadata_from_file: BTreeMap<String, PathBuf>,

    pub source_image_id: Option<String>,
    pub source_image_family: Option<String>,
    pub source_image_folder_id: Option<String>,

    pub disk_name: Option<String>,
    pub disk_size_gb: Option<u32>,
    pub disk_type: Option<String>,

    pub image_name: Option<String>,
    pub image_description: Option<String>,
    pub image_family: Option<String>,
    pub image_labels: BTreeMap<String, String>,
    pub image_min_disk_size_gb: Option<u32>,
    pub image_product_ids: Vec<String>,
    pub target_image_folder_id: Option<String>,

    pub subnet_id: Option<String>,
    pub use_ipv4_nat: Option<bool>,
    pub use_ipv6: Option<bool>,
    pub use_internal_ip: Option<bool>,
    pub state_timeout: Option<String>,

    pub communicator: Option<CommunicatorType>,
    pub ssh_host: Option<String>,
    pub ssh_port: Option<u16>,
    pub ssh_username: Option<String>,
    pub ssh_password: Option<String>,
    pub ssh_private_key_file: Option<PathBuf>,
    pub ssh_private_key: Option<SigningKey>,
    pub ssh_timeout: Option<String>,
    pub ssh_handshake_attempts: Option<u32>,
    pub ssh_agent_auth: Option<bool>,
}
