//! Shared test utilities for the imgbuild workspace.
//!
//! A dev-dependency only; never published.
//!
//! # Modules
//!
//! - [`fixtures`]: raw builder entries, key files and a fixed instant
//! - [`workspace`]: [`TestWorkspace`] for tests that need real files on disk

pub mod fixtures;
pub mod workspace;

pub use fixtures::{
    ED25519_KEY, FIXED_TIMESTAMP, RSA_PKCS1_KEY, SERVICE_ACCOUNT_KEY, base_config, fixed_time,
};
pub use workspace::TestWorkspace;
