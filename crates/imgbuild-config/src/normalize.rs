//! Field normalizer: raw key/value input to typed fields
//!
//! Decoding is lenient in the same places a weakly-typed decoder is:
//! integers may be given as numeric strings, booleans as `"true"`,
//! `"false"`, `"1"`, `"0"` or the numbers 0 and 1, and `null` means the
//! key is unset. Everything else that does not fit is an error attributed
//! to the key. Templated fields are expanded here, and referenced files
//! (metadata payloads, key files) are read here.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::context::{ENV_FOLDER_ID, ENV_SERVICE_ACCOUNT_KEY_FILE, ENV_TOKEN, ResolveContext};
use crate::diagnostics::Diagnostics;
use crate::error::ConfigError;
use crate::interpolate::render;
use crate::keys::{ServiceAccountKey, parse_signing_key};
use crate::types::{CommunicatorType, PartialConfig};

/// Untyped build input, one builder entry of a template.
pub type RawConfig = Map<String, Value>;

/// Every key a builder entry may carry.
pub const KNOWN_KEYS: &[&str] = &[
    "communicator",
    "disk_name",
    "disk_size_gb",
    "disk_type",
    "endpoint",
    "folder_id",
    "image_description",
    "image_family",
    "image_labels",
    "image_min_disk_size_gb",
    "image_name",
    "image_product_ids",
    "instance_cores",
    "instance_gpus",
    "instance_mem_gb",
    "instance_name",
    "labels",
    "metadata",
    "metadata_from_file",
    "platform_id",
    "preemptible",
    "serial_log_file",
    "service_account_key_file",
    "source_image_family",
    "source_image_folder_id",
    "source_image_id",
    "ssh_agent_auth",
    "ssh_handshake_attempts",
    "ssh_host",
    "ssh_password",
    "ssh_port",
    "ssh_private_key_file",
    "ssh_timeout",
    "ssh_username",
    "state_timeout",
    "subnet_id",
    "target_image_folder_id",
    "token",
    "use_internal_ip",
    "use_ipv4_nat",
    "use_ipv6",
    "zone",
];

/// Decode the raw input into typed fields.
///
/// Problems are appended to `diag`; decoding continues past them so that
/// one pass reports every bad field. A field that fails to decode is left
/// unset.
pub fn normalize(raw: &RawConfig, ctx: &ResolveContext, diag: &mut Diagnostics) -> PartialConfig {
    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            diag.error(ConfigError::UnknownKey { key: key.clone() });
        }
    }

    let mut d = Decoder {
        raw,
        ctx,
        diag: &mut *diag,
    };
    let mut partial = PartialConfig {
        endpoint: d.ident("endpoint"),
        token: d.ident("token"),
        service_account_key_file: d.ident("service_account_key_file").map(PathBuf::from),
        folder_id: d.ident("folder_id"),
        zone: d.ident("zone"),

        platform_id: d.ident("platform_id"),
        instance_cores: d.uint("instance_cores"),
        instance_gpus: d.uint("instance_gpus"),
        instance_mem_gb: d.uint("instance_mem_gb"),
        instance_name: d.templated("instance_name").filter(|s| !s.is_empty()),
        labels: d.templated_map("labels"),
        preemptible: d.bool("preemptible"),
        serial_log_file: d.templated("serial_log_file").filter(|s| !s.is_empty()),
        metadata: d.templated_map("metadata"),
        metadata_from_file: d
            .string_map("metadata_from_file")
            .into_iter()
            .map(|(k, v)| (k, PathBuf::from(v)))
            .collect(),

        source_image_id: d.ident("source_image_id"),
        source_image_family: d.ident("source_image_family"),
        source_image_folder_id: d.ident("source_image_folder_id"),

        disk_name: d.templated("disk_name").filter(|s| !s.is_empty()),
        disk_size_gb: d.uint("disk_size_gb"),
        disk_type: d.ident("disk_type"),

        image_name: d.templated("image_name").filter(|s| !s.is_empty()),
        image_description: d.templated("image_description"),
        image_family: d.templated("image_family"),
        image_labels: d.templated_map("image_labels"),
        image_min_disk_size_gb: d.uint("image_min_disk_size_gb"),
        image_product_ids: d.string_list("image_product_ids"),
        target_image_folder_id: d.ident("target_image_folder_id"),

        subnet_id: d.ident("subnet_id"),
        use_ipv4_nat: d.bool("use_ipv4_nat"),
        use_ipv6: d.bool("use_ipv6"),
        use_internal_ip: d.bool("use_internal_ip"),
        state_timeout: d.ident("state_timeout"),

        communicator: d.communicator(),
        ssh_host: d.ident("ssh_host"),
        ssh_port: d.uint("ssh_port"),
        ssh_username: d.templated("ssh_username").filter(|s| !s.is_empty()),
        ssh_password: d.ident("ssh_password"),
        ssh_private_key_file: d.ident("ssh_private_key_file").map(PathBuf::from),
        ssh_timeout: d.ident("ssh_timeout"),
        ssh_handshake_attempts: d.uint("ssh_handshake_attempts"),
        ssh_agent_auth: d.bool("ssh_agent_auth"),
        ..Default::default()
    };

    apply_env_fallbacks(&mut partial, ctx);
    merge_metadata_files(&mut partial, ctx, diag);
    load_service_account_key(&mut partial, ctx, diag);
    load_ssh_private_key(&mut partial, ctx, diag);

    tracing::debug!(
        fields = raw.len(),
        errors = diag.errors().len(),
        "Normalized raw configuration"
    );
    partial
}

fn apply_env_fallbacks(partial: &mut PartialConfig, ctx: &ResolveContext) {
    if partial.token.is_none() && partial.service_account_key_file.is_none() {
        if let Some(token) = ctx.env(ENV_TOKEN) {
            tracing::debug!(var = ENV_TOKEN, "Using token from environment");
            partial.token = Some(token.to_string());
        } else if let Some(path) = ctx.env(ENV_SERVICE_ACCOUNT_KEY_FILE) {
            tracing::debug!(var = ENV_SERVICE_ACCOUNT_KEY_FILE, path, "Using key file from environment");
            partial.service_account_key_file = Some(PathBuf::from(path));
        }
    }
    if partial.folder_id.is_none() {
        if let Some(folder_id) = ctx.env(ENV_FOLDER_ID) {
            tracing::debug!(var = ENV_FOLDER_ID, folder_id, "Using folder_id from environment");
            partial.folder_id = Some(folder_id.to_string());
        }
    }
}

/// Read every `metadata_from_file` entry into `metadata`.
fn merge_metadata_files(partial: &mut PartialConfig, ctx: &ResolveContext, diag: &mut Diagnostics) {
    for (key, path) in &partial.metadata_from_file {
        match ctx.read_to_string(path) {
            Ok(content) => {
                if partial.metadata.contains_key(key) {
                    diag.warn(format!(
                        "metadata key '{}' is set in both metadata and metadata_from_file; \
                         using the content of '{}'",
                        key,
                        path.display()
                    ));
                }
                tracing::debug!(key = %key, path = %path.display(), "Loaded metadata from file");
                partial.metadata.insert(key.clone(), content);
            }
            Err(source) => diag.error(ConfigError::MetadataFile {
                key: key.clone(),
                path: path.clone(),
                source,
            }),
        }
    }
}

fn load_service_account_key(partial: &mut PartialConfig, ctx: &ResolveContext, diag: &mut Diagnostics) {
    let Some(path) = partial.service_account_key_file.clone() else {
        return;
    };
    let loaded = ctx
        .read(&path)
        .map_err(|e| e.to_string())
        .and_then(|bytes| ServiceAccountKey::from_json(&bytes).map_err(|e| e.to_string()));

    match loaded {
        Ok(key) => {
            tracing::debug!(path = %path.display(), key_id = %key.id, "Loaded service account key");
            partial.service_account_key = Some(key);
        }
        Err(message) => diag.error(ConfigError::ServiceAccountKey { path, message }),
    }
}

fn load_ssh_private_key(partial: &mut PartialConfig, ctx: &ResolveContext, diag: &mut Diagnostics) {
    let Some(path) = partial.ssh_private_key_file.clone() else {
        return;
    };
    let loaded = ctx
        .read_to_string(&path)
        .map_err(|e| e.to_string())
        .and_then(|pem| parse_signing_key(&pem).map_err(|e| e.to_string()));

    match loaded {
        Ok(key) => {
            tracing::debug!(path = %path.display(), algorithm = %key.algorithm(), "Loaded SSH private key");
            partial.ssh_private_key = Some(key);
        }
        Err(message) => diag.error(ConfigError::SshPrivateKey { path, message }),
    }
}

/// Short description of a JSON value for type errors.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Scalar rendered as text, for fields that accept any scalar as a string.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

struct Decoder<'a> {
    raw: &'a RawConfig,
    ctx: &'a ResolveContext,
    diag: &'a mut Diagnostics,
}

impl Decoder<'_> {
    /// Present, non-null value for `key`.
    fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key).filter(|v| !v.is_null())
    }

    fn mismatch(&mut self, key: &str, expected: &'static str, value: &Value) {
        self.diag.error(ConfigError::InvalidType {
            key: key.to_string(),
            expected,
            found: describe(value),
        });
    }

    fn string(&mut self, key: &str) -> Option<String> {
        let value = self.get(key)?.clone();
        match scalar_text(&value) {
            Some(text) => Some(text),
            None => {
                self.mismatch(key, "string", &value);
                None
            }
        }
    }

    /// Identifier-like string: empty means unset.
    fn ident(&mut self, key: &str) -> Option<String> {
        self.string(key).filter(|s| !s.is_empty())
    }

    fn templated(&mut self, key: &str) -> Option<String> {
        let template = self.string(key)?;
        self.expand(key, &template)
    }

    fn expand(&mut self, key: &str, template: &str) -> Option<String> {
        match render(template, self.ctx.interpolation()) {
            Ok(rendered) => Some(rendered),
            Err(source) => {
                self.diag.error(ConfigError::Interpolate {
                    key: key.to_string(),
                    source,
                });
                None
            }
        }
    }

    fn uint<T: TryFrom<u64>>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?.clone();
        match as_u64(&value).and_then(|n| T::try_from(n).ok()) {
            Some(n) => Some(n),
            None => {
                self.mismatch(key, "unsigned integer", &value);
                None
            }
        }
    }

    fn bool(&mut self, key: &str) -> Option<bool> {
        let value = self.get(key)?.clone();
        match as_bool(&value) {
            Some(b) => Some(b),
            None => {
                self.mismatch(key, "boolean", &value);
                None
            }
        }
    }

    /// List of strings; a single scalar is taken as a one-element list.
    fn string_list(&mut self, key: &str) -> Vec<String> {
        let Some(value) = self.get(key).cloned() else {
            return Vec::new();
        };
        let items = match &value {
            Value::Array(items) => items.iter().map(scalar_text).collect::<Option<Vec<_>>>(),
            scalar => scalar_text(scalar).map(|s| vec![s]),
        };
        items.unwrap_or_else(|| {
            self.mismatch(key, "list of strings", &value);
            Vec::new()
        })
    }

    fn string_map(&mut self, key: &str) -> BTreeMap<String, String> {
        let Some(value) = self.get(key).cloned() else {
            return BTreeMap::new();
        };
        let entries = match &value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| scalar_text(v).map(|s| (k.clone(), s)))
                .collect::<Option<BTreeMap<_, _>>>(),
            _ => None,
        };
        entries.unwrap_or_else(|| {
            self.mismatch(key, "map of strings", &value);
            BTreeMap::new()
        })
    }

    /// Map whose values are templates; bad entries are dropped individually.
    fn templated_map(&mut self, key: &str) -> BTreeMap<String, String> {
        let entries = self.string_map(key);
        let mut rendered = BTreeMap::new();
        for (name, template) in entries {
            if let Some(value) = self.expand(&format!("{key}.{name}"), &template) {
                rendered.insert(name, value);
            }
        }
        rendered
    }

    fn communicator(&mut self) -> Option<CommunicatorType> {
        let text = self.ident("communicator")?;
        match text.parse() {
            Ok(kind) => Some(kind),
            Err(_) => {
                self.mismatch("communicator", "one of 'ssh', 'none'", &Value::String(text));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use imgbuild_fs::MemoryFs;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn raw(value: Value) -> RawConfig {
        match value {
            Value::Object(map) => map,
            _ => panic!("test input must be an object"),
        }
    }

    fn run(input: Value, ctx: &ResolveContext) -> (PartialConfig, Diagnostics) {
        let mut diag = Diagnostics::new();
        let partial = normalize(&raw(input), ctx, &mut diag);
        (partial, diag)
    }

    #[test]
    fn unknown_key_is_reported_by_name() {
        let (_, diag) = run(json!({"unknown_key": "bad"}), &ResolveContext::new());
        assert_eq!(diag.errors().len(), 1);
        assert_eq!(
            diag.errors()[0].to_string(),
            "unknown configuration key: 'unknown_key'"
        );
    }

    #[rstest]
    #[case(json!(20), Some(20))]
    #[case(json!("20"), Some(20))]
    #[case(json!(null), None)]
    fn integers_accept_numeric_strings(#[case] value: Value, #[case] expected: Option<u32>) {
        let (partial, diag) = run(json!({"disk_size_gb": value}), &ResolveContext::new());
        assert!(!diag.has_errors());
        assert_eq!(partial.disk_size_gb, expected);
    }

    #[rstest]
    #[case(json!(true), true)]
    #[case(json!("true"), true)]
    #[case(json!(1), true)]
    #[case(json!("0"), false)]
    #[case(json!(false), false)]
    fn booleans_are_weakly_typed(#[case] value: Value, #[case] expected: bool) {
        let (partial, diag) = run(json!({"use_ipv6": value}), &ResolveContext::new());
        assert!(!diag.has_errors());
        assert_eq!(partial.use_ipv6, Some(expected));
    }

    #[rstest]
    #[case(json!({"disk_size_gb": "ten"}), "disk_size_gb")]
    #[case(json!({"disk_size_gb": -5}), "disk_size_gb")]
    #[case(json!({"ssh_port": 70000}), "ssh_port")]
    #[case(json!({"preemptible": "maybe"}), "preemptible")]
    #[case(json!({"labels": ["a"]}), "labels")]
    #[case(json!({"folder_id": {"id": 1}}), "folder_id")]
    #[case(json!({"communicator": "winrm"}), "communicator")]
    fn type_mismatch_names_the_key(#[case] input: Value, #[case] key: &str) {
        let (_, diag) = run(input, &ResolveContext::new());
        assert_eq!(diag.errors().len(), 1);
        assert!(
            matches!(&diag.errors()[0], ConfigError::InvalidType { key: k, .. } if k == key),
            "got: {:?}",
            diag.errors()
        );
    }

    #[test]
    fn empty_identifiers_are_unset_but_family_is_kept() {
        let (partial, diag) = run(
            json!({"folder_id": "", "zone": "", "image_family": "", "image_description": ""}),
            &ResolveContext::new(),
        );
        assert!(!diag.has_errors());
        assert_eq!(partial.folder_id, None);
        assert_eq!(partial.zone, None);
        assert_eq!(partial.image_family, Some(String::new()));
        assert_eq!(partial.image_description, Some(String::new()));
    }

    #[test]
    fn product_ids_accept_single_string() {
        let (partial, _) = run(json!({"image_product_ids": "test-license"}), &ResolveContext::new());
        assert_eq!(partial.image_product_ids, vec!["test-license".to_string()]);
    }

    #[test]
    fn interpolation_failure_is_attributed_to_field() {
        let (partial, diag) = run(json!({"image_name": "packer-{{nope}}"}), &ResolveContext::new());
        assert_eq!(partial.image_name, None);
        assert_eq!(diag.errors().len(), 1);
        assert!(
            diag.errors()[0]
                .to_string()
                .starts_with("error interpolating 'image_name':")
        );
    }

    #[test]
    fn label_values_are_rendered() {
        let ctx = ResolveContext::new().with_interpolation(
            crate::interpolate::InterpolateContext::new().with_build_name("ubuntu"),
        );
        let (partial, diag) = run(json!({"labels": {"build": "{{build_name}}"}}), &ctx);
        assert!(!diag.has_errors());
        assert_eq!(partial.labels.get("build").map(String::as_str), Some("ubuntu"));
    }

    #[test]
    fn metadata_from_file_is_merged() {
        let fs = MemoryFs::new().with_file("user-data.yaml", "#cloud-config\n");
        let ctx = ResolveContext::new().with_reader(Arc::new(fs));
        let (partial, diag) = run(
            json!({
                "metadata": {"serial-port-enable": "1"},
                "metadata_from_file": {"user-data": "user-data.yaml"}
            }),
            &ctx,
        );
        assert!(!diag.has_errors());
        assert!(diag.warnings().is_empty());
        assert_eq!(partial.metadata.len(), 2);
        assert_eq!(partial.metadata["user-data"], "#cloud-config\n");
    }

    #[test]
    fn metadata_file_overrides_inline_value_with_warning() {
        let fs = MemoryFs::new().with_file("user-data.yaml", "from file");
        let ctx = ResolveContext::new().with_reader(Arc::new(fs));
        let (partial, diag) = run(
            json!({
                "metadata": {"user-data": "inline"},
                "metadata_from_file": {"user-data": "user-data.yaml"}
            }),
            &ctx,
        );
        assert!(!diag.has_errors());
        assert_eq!(diag.warnings().len(), 1);
        assert!(diag.warnings()[0].contains("'user-data'"));
        assert_eq!(partial.metadata["user-data"], "from file");
    }

    #[test]
    fn missing_metadata_file_names_key_and_path() {
        let ctx = ResolveContext::new().with_reader(Arc::new(MemoryFs::new()));
        let (_, diag) = run(
            json!({
                "metadata": {"key": "value"},
                "metadata_from_file": {"key": "file_not_exist"}
            }),
            &ctx,
        );
        assert_eq!(diag.errors().len(), 1);
        assert!(diag.errors()[0].to_string().contains(
            "cannot access file 'file_not_exist' with content for value of metadata key 'key':"
        ));
    }

    #[test]
    fn env_fallbacks_fill_unset_fields() {
        let ctx = ResolveContext::new()
            .with_env_var(ENV_TOKEN, "t0ken")
            .with_env_var(ENV_FOLDER_ID, "b1gfolder");
        let (partial, diag) = run(json!({}), &ctx);
        assert!(!diag.has_errors());
        assert_eq!(partial.token.as_deref(), Some("t0ken"));
        assert_eq!(partial.folder_id.as_deref(), Some("b1gfolder"));
    }

    #[test]
    fn env_token_does_not_override_explicit_key_file() {
        let fs = MemoryFs::new().with_file(
            "sa.json",
            include_str!("../../imgbuild-test-utils/testdata/fake-sa-key.json"),
        );
        let ctx = ResolveContext::new()
            .with_reader(Arc::new(fs))
            .with_env_var(ENV_TOKEN, "t0ken");
        let (partial, diag) = run(json!({"service_account_key_file": "sa.json"}), &ctx);
        assert!(!diag.has_errors());
        assert_eq!(partial.token, None);
        assert!(partial.service_account_key.is_some());
    }

    #[test]
    fn unreadable_key_file_names_path() {
        let ctx = ResolveContext::new().with_reader(Arc::new(MemoryFs::new()));
        let (partial, diag) = run(
            json!({"service_account_key_file": "/tmp/i/should/not/exist"}),
            &ctx,
        );
        assert!(partial.service_account_key.is_none());
        assert_eq!(diag.errors().len(), 1);
        assert!(diag.errors()[0].to_string().contains("/tmp/i/should/not/exist"));
    }

    #[test]
    fn ssh_private_key_is_parsed() {
        let fs = MemoryFs::new().with_file(
            "id_ed25519",
            include_str!("../../imgbuild-test-utils/testdata/id_ed25519"),
        );
        let ctx = ResolveContext::new().with_reader(Arc::new(fs));
        let (partial, diag) = run(json!({"ssh_private_key_file": "id_ed25519"}), &ctx);
        assert!(!diag.has_errors());
        assert_eq!(
            partial.ssh_private_key.map(|k| k.algorithm()).as_deref(),
            Some("ssh-ed25519")
        );
    }

    #[test]
    fn invalid_ssh_private_key_is_reported() {
        let fs = MemoryFs::new().with_file("id_rsa", "not a key");
        let ctx = ResolveContext::new().with_reader(Arc::new(fs));
        let (_, diag) = run(json!({"ssh_private_key_file": "id_rsa"}), &ctx);
        assert!(matches!(&diag.errors()[0], ConfigError::SshPrivateKey { .. }));
    }
}
