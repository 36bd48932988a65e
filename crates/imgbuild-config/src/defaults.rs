//! Defaulting engine: fills every unset field
//!
//! Three kinds of defaults, applied in this order:
//! 1. static values (zone, disk size, ...)
//! 2. values derived from other fields (`platform_id` from GPU count)
//! 3. generated names, rendered through the interpolation context
//!
//! Explicit values are never overwritten. Zero for a numeric field counts
//! as unset.

use crate::context::ResolveContext;
use crate::diagnostics::Diagnostics;
use crate::error::ConfigError;
use crate::interpolate::render;
use crate::types::{BuildConfig, CommunicatorConfig, PartialConfig};

pub const DEFAULT_ENDPOINT: &str = "api.cloud.yandex.net:443";
pub const DEFAULT_ZONE: &str = "ru-central1-a";
pub const DEFAULT_PLATFORM_ID: &str = "standard-v1";
pub const DEFAULT_GPU_PLATFORM_ID: &str = "gpu-standard-v1";
pub const DEFAULT_DISK_SIZE_GB: u32 = 10;
pub const DEFAULT_DISK_TYPE: &str = "network-hdd";
pub const DEFAULT_INSTANCE_CORES: u32 = 2;
pub const DEFAULT_INSTANCE_MEM_GB: u32 = 4;
pub const DEFAULT_IMAGE_NAME: &str = "packer-{{timestamp}}";
pub const DEFAULT_INSTANCE_NAME: &str = "packer-{{uuid}}";
pub const DEFAULT_IMAGE_DESCRIPTION: &str = "created by packer";
pub const DEFAULT_SOURCE_IMAGE_FOLDER_ID: &str = "standard-images";
pub const DEFAULT_TARGET_IMAGE_FOLDER_ID: &str = "hashicorp";
pub const DEFAULT_TIMEOUT: &str = "5m";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_SSH_HANDSHAKE_ATTEMPTS: u32 = 10;

fn non_zero<T: PartialEq + Default>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

fn or_static(value: Option<String>, default: &str) -> String {
    value.unwrap_or_else(|| default.to_string())
}

/// Platform for the instance: GPU instances need the GPU platform.
pub fn default_platform_id(instance_gpus: u32) -> &'static str {
    if instance_gpus > 0 {
        DEFAULT_GPU_PLATFORM_ID
    } else {
        DEFAULT_PLATFORM_ID
    }
}

/// Fill unset fields of `partial`.
///
/// A generated name that fails to render is reported and left as the raw
/// template; the validator then reports it as well.
pub fn apply_defaults(partial: PartialConfig, ctx: &ResolveContext, diag: &mut Diagnostics) -> BuildConfig {
    let instance_gpus = partial.instance_gpus.unwrap_or(0);
    let platform_id = partial
        .platform_id
        .unwrap_or_else(|| default_platform_id(instance_gpus).to_string());

    let image_name = partial
        .image_name
        .unwrap_or_else(|| generate("image_name", DEFAULT_IMAGE_NAME, ctx, diag));
    let instance_name = partial
        .instance_name
        .unwrap_or_else(|| generate("instance_name", DEFAULT_INSTANCE_NAME, ctx, diag));

    let communicator = CommunicatorConfig {
        communicator: partial.communicator.unwrap_or_default(),
        ssh_host: partial.ssh_host,
        ssh_port: non_zero(partial.ssh_port).unwrap_or(DEFAULT_SSH_PORT),
        ssh_username: partial.ssh_username.unwrap_or_default(),
        ssh_password: partial.ssh_password,
        ssh_private_key_file: partial.ssh_private_key_file,
        ssh_private_key: partial.ssh_private_key,
        ssh_timeout: or_static(partial.ssh_timeout, DEFAULT_TIMEOUT),
        ssh_handshake_attempts: non_zero(partial.ssh_handshake_attempts)
            .unwrap_or(DEFAULT_SSH_HANDSHAKE_ATTEMPTS),
        ssh_agent_auth: partial.ssh_agent_auth.unwrap_or(false),
    };

    let config = BuildConfig {
        endpoint: or_static(partial.endpoint, DEFAULT_ENDPOINT),
        token: partial.token,
        service_account_key_file: partial.service_account_key_file,
        service_account_key: partial.service_account_key,
        folder_id: partial.folder_id.unwrap_or_default(),
        zone: or_static(partial.zone, DEFAULT_ZONE),

        platform_id,
        instance_cores: non_zero(partial.instance_cores).unwrap_or(DEFAULT_INSTANCE_CORES),
        instance_gpus,
        instance_mem_gb: non_zero(partial.instance_mem_gb).unwrap_or(DEFAULT_INSTANCE_MEM_GB),
        instance_name,
        labels: partial.labels,
        preemptible: partial.preemptible.unwrap_or(false),
        serial_log_file: partial.serial_log_file,
        metadata: partial.metadata,
        metadata_from_file: partial.metadata_from_file,

        source_image_id: partial.source_image_id,
        source_image_family: partial.source_image_family,
        source_image_folder_id: or_static(
            partial.source_image_folder_id,
            DEFAULT_SOURCE_IMAGE_FOLDER_ID,
        ),

        disk_name: partial.disk_name,
        disk_size_gb: non_zero(partial.disk_size_gb).unwrap_or(DEFAULT_DISK_SIZE_GB),
        disk_type: or_static(partial.disk_type, DEFAULT_DISK_TYPE),

        image_name,
        image_description: or_static(partial.image_description, DEFAULT_IMAGE_DESCRIPTION),
        image_family: partial.image_family,
        image_labels: partial.image_labels,
        image_min_disk_size_gb: non_zero(partial.image_min_disk_size_gb),
        image_product_ids: partial.image_product_ids,
        target_image_folder_id: or_static(
            partial.target_image_folder_id,
            DEFAULT_TARGET_IMAGE_FOLDER_ID,
        ),

        subnet_id: partial.subnet_id,
        use_ipv4_nat: partial.use_ipv4_nat.unwrap_or(false),
        use_ipv6: partial.use_ipv6.unwrap_or(false),
        use_internal_ip: partial.use_internal_ip.unwrap_or(false),
        state_timeout: or_static(partial.state_timeout, DEFAULT_TIMEOUT),

        communicator,
    };

    tracing::debug!(
        zone = %config.zone,
        platform_id = %config.platform_id,
        image_name = %config.image_name,
        "Applied defaults"
    );
    config
}

fn generate(key: &str, template: &str, ctx: &ResolveContext, diag: &mut Diagnostics) -> String {
    match render(template, ctx.interpolation()) {
        Ok(name) => name,
        Err(source) => {
            diag.error(ConfigError::Interpolate {
                key: key.to_string(),
                source,
            });
            template.to_string()
        }
    }
}
