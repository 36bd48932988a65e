//! Remote-login setup for the provisioned instance

use std::net::Ipv6Addr;
use std::time::Duration;

use imgbuild_config::{BuildConfig, CommunicatorConfig, SigningKey, parse_signing_key};

use crate::{Error, Result};

/// Addresses reported for a running instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceAddresses {
    pub internal_ipv4: Option<String>,
    pub nat_ipv4: Option<String>,
    pub ipv6: Option<String>,
}

/// Host to connect to.
///
/// Order: `ssh_host`, then the internal address when `use_internal_ip`,
/// then the IPv6 address when `use_ipv6`, then the NAT address.
pub fn communicator_host(config: &BuildConfig, addresses: &InstanceAddresses) -> Result<String> {
    if let Some(host) = config.communicator.ssh_host.as_deref().filter(|h| !h.is_empty()) {
        return Ok(host.to_string());
    }

    let (address, kind) = if config.use_internal_ip {
        (&addresses.internal_ipv4, "internal IPv4")
    } else if config.use_ipv6 {
        (&addresses.ipv6, "IPv6")
    } else {
        (&addresses.nat_ipv4, "NAT IPv4")
    };

    address.clone().ok_or(Error::NoAddress { kind })
}

/// `host:port`, with IPv6 literals bracketed.
pub fn ssh_address(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// One way of authenticating the SSH session
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMethod {
    PublicKey(SigningKey),
    Password(String),
    Agent,
}

/// Settings for the SSH client
#[derive(Debug, Clone, PartialEq)]
pub struct SshClientConfig {
    pub user: String,
    pub auth: Vec<AuthMethod>,
    pub timeout: Duration,
    pub handshake_attempts: u32,
}

/// Client settings for `communicator` authenticating with `key_pem`.
///
/// Password and agent authentication follow the key when configured.
pub fn ssh_client_config(communicator: &CommunicatorConfig, key_pem: &str) -> Result<SshClientConfig> {
    let signer = parse_signing_key(key_pem).map_err(|e| Error::SshConfig {
        message: e.to_string(),
    })?;

    let mut auth = vec![AuthMethod::PublicKey(signer)];
    if let Some(password) = &communicator.ssh_password {
        auth.push(AuthMethod::Password(password.clone()));
    }
    if communicator.ssh_agent_auth {
        auth.push(AuthMethod::Agent);
    }

    let login = communicator.remote_login();
    Ok(SshClientConfig {
        user: login.username,
        auth,
        timeout: login.timeout,
        handshake_attempts: communicator.ssh_handshake_attempts,
    })
}
