//! Filesystem access for the image builder
//!
//! Provides the read-only file capability used during configuration
//! resolution and format-agnostic template loading.

pub mod config;
pub mod error;
pub mod reader;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use reader::{FileReader, LocalFs, MemoryFs};
