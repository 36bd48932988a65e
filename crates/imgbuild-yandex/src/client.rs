//! API client settings derived from a build configuration

use std::fmt;

use imgbuild_config::{BuildConfig, Credential, ServiceAccountKey};

use crate::{Error, Result};

/// User agent sent with every API call.
pub const USER_AGENT: &str = concat!("imgbuild/", env!("CARGO_PKG_VERSION"));

/// How the API client authenticates
#[derive(Clone, PartialEq)]
pub enum Credentials {
    OAuthToken(String),
    ServiceAccountKey(ServiceAccountKey),
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::OAuthToken(_) => "oauth-token",
            Credentials::ServiceAccountKey(_) => "service-account-key",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::OAuthToken(_) => f.write_str("OAuthToken(<redacted>)"),
            Credentials::ServiceAccountKey(key) => {
                f.debug_tuple("ServiceAccountKey").field(&key.id).finish()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub credentials: Credentials,
    pub user_agent: String,
}

impl ClientConfig {
    /// Endpoint and credentials for the API client; the token wins when
    /// both are present.
    pub fn from_build_config(config: &BuildConfig) -> Result<Self> {
        let credentials = match config.credential() {
            Some(Credential::Token(token)) => Credentials::OAuthToken(token.to_string()),
            Some(Credential::ServiceAccountKey(key)) => Credentials::ServiceAccountKey(key.clone()),
            None => return Err(Error::MissingCredential),
        };
        tracing::debug!(endpoint = %config.endpoint, auth = credentials.kind(), "Initialize Yandex Cloud client");

        Ok(Self {
            endpoint: config.endpoint.clone(),
            credentials,
            user_agent: USER_AGENT.to_string(),
        })
    }
}
