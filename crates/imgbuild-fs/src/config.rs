//! Format-agnostic loading of template files

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Error, FileReader, LocalFs, Result};

/// Format-agnostic configuration store.
///
/// Detects the format from the file extension and deserializes
/// transparently. Reads go through a [`FileReader`].
#[derive(Clone)]
pub struct ConfigStore {
    reader: Arc<dyn FileReader>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Create a store backed by the local filesystem.
    pub fn new() -> Self {
        Self {
            reader: Arc::new(LocalFs),
        }
    }

    /// Create a store backed by a custom reader.
    pub fn with_reader(reader: Arc<dyn FileReader>) -> Self {
        Self { reader }
    }

    /// Load a file into any deserializable type.
    ///
    /// Format is detected from file extension:
    /// - `.json` -> JSON
    /// - `.toml` -> TOML
    /// - `.yaml`, `.yml` -> YAML
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        let format = match extension.as_str() {
            "json" => "JSON",
            "toml" => "TOML",
            "yaml" | "yml" => "YAML",
            _ => {
                return Err(Error::UnsupportedFormat { extension });
            }
        };

        let content = self.reader.read_to_string(path)?;
        tracing::debug!(path = %path.display(), format, "Parsing config file");

        let parsed = match format {
            "JSON" => serde_json::from_str(&content).map_err(|e| e.to_string()),
            "TOML" => toml::from_str(&content).map_err(|e| e.to_string()),
            _ => serde_yaml::from_str(&content).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| Error::ConfigParse {
            path: path.to_path_buf(),
            format: format.into(),
            message,
        })
    }

    /// Load a file whose top level must be a key/value table.
    pub fn load_table(&self, path: &Path) -> Result<Map<String, Value>> {
        match self.load::<Value>(path)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::NotATable {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFs;
    use serde_json::json;

    fn store(path: &str, content: &str) -> ConfigStore {
        ConfigStore::with_reader(Arc::new(MemoryFs::new().with_file(path, content)))
    }

    #[test]
    fn loads_json_table() {
        let store = store("build.json", r#"{"folder_id": "b1g", "disk_size_gb": 20}"#);
        let table = store.load_table(Path::new("build.json")).unwrap();
        assert_eq!(table["folder_id"], json!("b1g"));
        assert_eq!(table["disk_size_gb"], json!(20));
    }

    #[test]
    fn loads_yaml_table() {
        let store = store("build.yml", "folder_id: b1g\nuse_ipv4_nat: true\n");
        let table = store.load_table(Path::new("build.yml")).unwrap();
        assert_eq!(table["use_ipv4_nat"], json!(true));
    }

    #[test]
    fn loads_toml_table() {
        let store = store("build.toml", "folder_id = \"b1g\"\n[metadata]\nkey = \"value\"\n");
        let table = store.load_table(Path::new("build.toml")).unwrap();
        assert_eq!(table["metadata"], json!({"key": "value"}));
    }

    #[test]
    fn rejects_unknown_extension() {
        let store = store("build.ini", "folder_id=b1g");
        let err = store.load_table(Path::new("build.ini")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { extension } if extension == "ini"));
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let store = store("broken.json", "{ not json");
        let err = store.load_table(Path::new("broken.json")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("JSON"), "got: {message}");
        assert!(message.contains("broken.json"), "got: {message}");
    }

    #[test]
    fn rejects_non_table_top_level() {
        let store = store("list.json", "[1, 2, 3]");
        let err = store.load_table(Path::new("list.json")).unwrap_err();
        assert!(matches!(err, Error::NotATable { .. }));
    }
}
