//! Template files: user variables plus a list of builder entries

use std::collections::HashMap;
use std::path::Path;

use imgbuild_config::RawConfig;
use imgbuild_fs::ConfigStore;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CliError, Result};

/// Builder type this tool resolves.
pub const BUILDER_TYPE: &str = "yandex";

#[derive(Debug, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub variables: serde_json::Map<String, Value>,
    #[serde(default)]
    pub builders: Vec<RawConfig>,
}

/// One builder entry with its bookkeeping keys removed.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderEntry {
    pub name: String,
    pub raw: RawConfig,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self> {
        let template: Template = ConfigStore::new().load(path)?;
        tracing::debug!(
            path = %path.display(),
            builders = template.builders.len(),
            variables = template.variables.len(),
            "Loaded template"
        );
        Ok(template)
    }

    /// Template variable defaults, with scalars rendered as text.
    pub fn variable_defaults(&self) -> Result<HashMap<String, String>> {
        self.variables
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    _ => {
                        return Err(CliError::user(format!(
                            "variable '{name}' must be a string, number or boolean"
                        )));
                    }
                };
                Ok((name.clone(), text))
            })
            .collect()
    }

    /// Split each builder into its name and raw configuration.
    ///
    /// Every builder must declare `type = "yandex"`; unnamed builders are
    /// named after their type.
    pub fn builder_entries(&self) -> Result<Vec<BuilderEntry>> {
        if self.builders.is_empty() {
            return Err(CliError::user("template defines no builders"));
        }

        let mut entries = Vec::with_capacity(self.builders.len());
        for (index, builder) in self.builders.iter().enumerate() {
            let mut raw = builder.clone();
            let kind = match raw.remove("type") {
                Some(Value::String(kind)) => kind,
                Some(_) | None => {
                    return Err(CliError::user(format!(
                        "builder #{} is missing a string 'type'",
                        index + 1
                    )));
                }
            };
            if kind != BUILDER_TYPE {
                return Err(CliError::user(format!(
                    "builder #{} has unsupported type '{kind}' (expected '{BUILDER_TYPE}')",
                    index + 1
                )));
            }
            let name = match raw.remove("name") {
                Some(Value::String(name)) if !name.is_empty() => name,
                _ => kind,
            };
            entries.push(BuilderEntry { name, raw });
        }

        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(CliError::user(format!(
                    "builder name '{}' is used more than once",
                    entry.name
                )));
            }
        }
        Ok(entries)
    }
}

/// Parse `KEY=VALUE` pairs from the command line.
pub fn parse_vars(pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CliError::user(format!(
                "invalid variable '{pair}': expected KEY=VALUE"
            ))),
        })
        .collect()
}
