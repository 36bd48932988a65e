//! Warning and error accumulator shared by all resolution stages

use crate::error::{ConfigError, ConfigErrors};

/// Problems collected during one resolution pass.
///
/// Every stage appends to the same value, so the caller sees all
/// independent problems at once instead of only the first.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
    errors: Vec<ConfigError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn error(&mut self, error: ConfigError) {
        tracing::debug!(%error, "Configuration error");
        self.errors.push(error);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Split into warnings and, when any error was recorded, the aggregate.
    pub fn finish(self) -> (Vec<String>, Result<(), ConfigErrors>) {
        let result = if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigErrors::new(self.errors))
        };
        (self.warnings, result)
    }
}
