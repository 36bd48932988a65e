//! Build-flow integration tests
//!
//! Each test walks the path a build takes before touching the cloud:
//! load a template entry from disk, resolve it, pick the source image,
//! build the API client settings and prepare the SSH session.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use imgbuild_config::{
    BuildConfig, ConfigError, ConfigErrors, FixedClock, InterpolateContext, ResolveContext, prepare,
};
use imgbuild_fs::{ConfigStore, MemoryFs};
use imgbuild_test_utils::{
    ED25519_KEY, FIXED_TIMESTAMP, SERVICE_ACCOUNT_KEY, TestWorkspace, fixed_time,
};
use imgbuild_yandex::{
    AuthMethod, ClientConfig, Driver, Error, Image, InstanceAddresses, communicator_host,
    lookup_source_image, ssh_address, ssh_client_config,
};
use pretty_assertions::assert_eq;
use serde_json::json;

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Image API that knows a single family image.
struct StandardImages;

#[async_trait]
impl Driver for StandardImages {
    async fn get_image(&self, image_id: &str) -> imgbuild_yandex::Result<Image> {
        Err(Error::ImageNotFound(image_id.to_string()))
    }

    async fn get_image_from_folder(
        &self,
        folder_id: &str,
        family: &str,
    ) -> imgbuild_yandex::Result<Image> {
        if folder_id == "standard-images" && family == "ubuntu-2204-lts" {
            Ok(Image {
                id: "fd8ubuntu".to_string(),
                name: "ubuntu-22-04-lts-v20240226".to_string(),
                folder_id: folder_id.to_string(),
                family: family.to_string(),
                min_disk_size_gb: 8,
                size_gb: 5,
                ..Default::default()
            })
        } else {
            Err(Error::ImageNotFound(format!("{folder_id}/{family}")))
        }
    }

    async fn delete_image(&self, _image_id: &str) -> imgbuild_yandex::Result<()> {
        Ok(())
    }
}

fn context_for(dir: &Path) -> ResolveContext {
    ResolveContext::new()
        .with_base_dir(dir)
        .with_interpolation(
            InterpolateContext::new()
                .with_clock(Arc::new(FixedClock(fixed_time())))
                .with_build_name("ubuntu"),
        )
}

fn resolve_file(ws: &TestWorkspace, file: &str) -> (Vec<String>, Result<BuildConfig, ConfigErrors>) {
    let raw = ConfigStore::new().load_table(&ws.path(file)).unwrap();
    prepare(&raw, &context_for(ws.root()))
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_service_account_build_flow() {
    let ws = TestWorkspace::new();
    ws.write_service_account_key("keys/sa.json");
    ws.write_ssh_key("keys/id_ed25519");
    ws.write("cloud-init.yaml", "#cloud-config\npackage_update: true\n");
    ws.write(
        "builder.yaml",
        r#"
service_account_key_file: keys/sa.json
folder_id: b1gexample
source_image_family: ubuntu-2204-lts
disk_size_gb: 20
image_name: "packer-{{build_name}}-{{timestamp}}"
image_family: ubuntu-web
ssh_username: ubuntu
ssh_private_key_file: keys/id_ed25519
use_ipv4_nat: true
metadata_from_file:
  user-data: cloud-init.yaml
labels:
  built-by: "{{build_type}}"
"#,
    );

    let (warnings, result) = resolve_file(&ws, "builder.yaml");
    assert!(warnings.is_empty());
    let config = result.expect("builder should resolve");

    assert_eq!(config.image_name, format!("packer-ubuntu-{FIXED_TIMESTAMP}"));
    assert_eq!(config.labels["built-by"], "yandex");
    assert_eq!(config.metadata["user-data"], "#cloud-config\npackage_update: true\n");

    let image = lookup_source_image(&StandardImages, &config).await.unwrap();
    assert_eq!(image.id, "fd8ubuntu");

    let client = ClientConfig::from_build_config(&config).unwrap();
    assert_eq!(client.credentials.kind(), "service-account-key");

    let addresses = InstanceAddresses {
        nat_ipv4: Some("51.250.10.20".to_string()),
        ..Default::default()
    };
    let host = communicator_host(&config, &addresses).unwrap();
    assert_eq!(ssh_address(&host, config.communicator.ssh_port), "51.250.10.20:22");

    let ssh = ssh_client_config(&config.communicator, ED25519_KEY).unwrap();
    assert_eq!(ssh.user, "ubuntu");
    assert!(matches!(&ssh.auth[0], AuthMethod::PublicKey(_)));
    assert_eq!(
        config.communicator.ssh_private_key.as_ref().map(|k| k.algorithm()),
        Some("ssh-ed25519".to_string())
    );
}

#[tokio::test]
async fn test_small_disk_rejected_at_lookup() {
    let ws = TestWorkspace::new();
    ws.write_json(
        "builder.json",
        &json!({
            "token": "t",
            "folder_id": "b1gexample",
            "source_image_family": "ubuntu-2204-lts",
            "disk_size_gb": 5,
            "ssh_username": "ubuntu",
        }),
    );

    let (_, result) = resolve_file(&ws, "builder.json");
    let config = result.unwrap();

    let err = lookup_source_image(&StandardImages, &config).await.unwrap_err();
    assert!(err.to_string().contains("at least 8 GB"));
}

#[test]
fn test_broken_builder_reports_everything_once() {
    let ws = TestWorkspace::new();
    ws.write(
        "builder.toml",
        r#"
token = "t"
service_account_key_file = "keys/missing.json"
image_family = "Web Servers"
image_min_disk_size_gb = 5
ssh_timeout = "soon"
typo_field = 1

[metadata_from_file]
user-data = "cloud-init.yaml"
"#,
    );

    let (warnings, result) = resolve_file(&ws, "builder.toml");
    assert!(warnings.is_empty());
    let errors = result.unwrap_err();

    let expected = [
        "unknown configuration key: 'typo_field'",
        "cannot access file 'cloud-init.yaml' with content for value of metadata key 'user-data'",
        "keys/missing.json",
        "one of token or service_account_key_file must be specified, not both",
        "a folder_id must be specified",
        "a source_image_id or source_image_family must be specified",
        "'Web Servers'",
        "image_min_disk_size_gb (5)",
        "ssh_timeout 'soon'",
        "ssh_username",
    ];
    let text = errors.to_string();
    for fragment in expected {
        assert!(text.contains(fragment), "missing '{fragment}' in:\n{text}");
    }
    assert_eq!(errors.len(), expected.len(), "{text}");
}

#[test]
fn test_resolution_is_repeatable() {
    let fs = MemoryFs::new().with_file("/build/sa.json", SERVICE_ACCOUNT_KEY);
    let ctx = context_for(Path::new("/build")).with_reader(Arc::new(fs));
    let raw = json!({
        "service_account_key_file": "sa.json",
        "folder_id": "b1gexample",
        "source_image_id": "fd8abc",
        "ssh_username": "ubuntu",
        "instance_name": "packer-{{build_name}}",
    });
    let raw = raw.as_object().unwrap();

    let (_, first) = prepare(raw, &ctx);
    let (_, second) = prepare(raw, &ctx);
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(first.instance_name, "packer-ubuntu");
}

#[test]
fn test_communicator_none_needs_no_username() {
    let ws = TestWorkspace::new();
    ws.write_json(
        "builder.json",
        &json!({
            "token": "t",
            "folder_id": "b1gexample",
            "source_image_id": "fd8abc",
            "communicator": "none",
        }),
    );

    let (_, result) = resolve_file(&ws, "builder.json");
    let config = result.unwrap();
    assert!(config.communicator.ssh_username.is_empty());
}

#[test]
fn test_errors_carry_structured_variants() {
    let ws = TestWorkspace::new();
    ws.write_json(
        "builder.json",
        &json!({"token": "t", "source_image_id": "x", "ssh_username": "u"}),
    );

    let (_, result) = resolve_file(&ws, "builder.json");
    let errors = result.unwrap_err().into_vec();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ConfigError::MissingFolderId));
}
