//! Build configuration resolution for the Yandex Cloud image builder
//!
//! Turns one loosely-typed builder entry into a fully resolved
//! [`BuildConfig`], or explains every reason it cannot be resolved.
//!
//! Resolution runs three stages over one shared [`Diagnostics`]:
//!
//! ```text
//!   raw map --normalize--> PartialConfig --apply_defaults--> BuildConfig --validate
//! ```
//!
//! - **normalize**: typed decoding, template expansion, file reads
//! - **apply_defaults**: static, derived and generated defaults
//! - **validate**: cross-field rules, all evaluated
//!
//! # Example
//!
//! ```ignore
//! use imgbuild_config::{ResolveContext, prepare};
//!
//! let raw = serde_json::json!({"token": "t", "folder_id": "f", "source_image_id": "i",
//!                              "ssh_username": "ubuntu"});
//! let (warnings, result) = prepare(raw.as_object().unwrap(), &ResolveContext::new());
//! ```

pub mod context;
pub mod defaults;
pub mod diagnostics;
pub mod duration;
pub mod error;
pub mod interpolate;
pub mod keys;
pub mod normalize;
pub mod types;
pub mod validation;

pub use context::ResolveContext;
pub use defaults::apply_defaults;
pub use diagnostics::Diagnostics;
pub use duration::{DurationError, parse_duration};
pub use error::{ConfigError, ConfigErrors, Result};
pub use interpolate::{Clock, FixedClock, InterpolateContext, InterpolateError, SystemClock, render};
pub use keys::{KeyError, ServiceAccountKey, SigningKey, parse_signing_key};
pub use normalize::{RawConfig, normalize};
pub use types::{
    BuildConfig, CommunicatorConfig, CommunicatorType, Credential, PartialConfig, RemoteLogin,
    SourceImageSelector,
};
pub use validation::validate;

/// Resolve a raw builder entry.
///
/// Warnings are returned whether or not resolution succeeds. On failure
/// the error lists every problem found by every stage.
pub fn prepare(raw: &RawConfig, ctx: &ResolveContext) -> (Vec<String>, std::result::Result<BuildConfig, ConfigErrors>) {
    let mut diag = Diagnostics::new();

    let partial = normalize(raw, ctx, &mut diag);
    let config = apply_defaults(partial, ctx, &mut diag);
    validation::validate_into(&config, &mut diag);

    let (warnings, result) = diag.finish();
    match result {
        Ok(()) => {
            tracing::info!(image_name = %config.image_name, warnings = warnings.len(), "Configuration resolved");
            (warnings, Ok(config))
        }
        Err(errors) => {
            tracing::info!(errors = errors.len(), "Configuration rejected");
            (warnings, Err(errors))
        }
    }
}
