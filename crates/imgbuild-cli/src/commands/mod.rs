//! Command implementations for imgbuild-cli

pub mod fields;
pub mod validate;

pub use fields::run_fields;
pub use validate::{ValidateOptions, run_validate};
