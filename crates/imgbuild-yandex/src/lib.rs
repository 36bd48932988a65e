//! Yandex Cloud provider glue
//!
//! Everything here consumes an accepted [`imgbuild_config::BuildConfig`]:
//!
//! - [`driver`]: the image API seam and source-image lookup
//! - [`client`]: endpoint and credentials for the API client
//! - [`ssh`]: address and client settings for logging into the instance
//!
//! No network calls are made by this crate; concrete drivers live with
//! the build steps.

pub mod client;
pub mod driver;
pub mod error;
pub mod ssh;

pub use client::{ClientConfig, Credentials, USER_AGENT};
pub use driver::{Driver, Image, lookup_source_image, to_gigabytes};
pub use error::{Error, Result};
pub use ssh::{AuthMethod, InstanceAddresses, SshClientConfig, communicator_host, ssh_address, ssh_client_config};
