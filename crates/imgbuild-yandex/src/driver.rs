//! Image API seam and source-image lookup

use std::collections::BTreeMap;

use async_trait::async_trait;
use imgbuild_config::{BuildConfig, SourceImageSelector};

use crate::{Error, Result};

const BYTES_PER_GB: u64 = 1 << 30;

/// A compute image as seen by the builder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub id: String,
    pub name: String,
    pub folder_id: String,
    pub family: String,
    pub labels: BTreeMap<String, String>,
    /// Product (license) ids attached to the image
    pub licenses: Vec<String>,
    pub min_disk_size_gb: u32,
    pub size_gb: u32,
}

/// Whole gigabytes in `bytes`, rounded down.
pub fn to_gigabytes(bytes: u64) -> u32 {
    u32::try_from(bytes / BYTES_PER_GB).unwrap_or(u32::MAX)
}

/// Operations the build needs from the image API.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn get_image(&self, image_id: &str) -> Result<Image>;

    /// Latest image of `family` in `folder_id`.
    async fn get_image_from_folder(&self, folder_id: &str, family: &str) -> Result<Image>;

    async fn delete_image(&self, image_id: &str) -> Result<()>;
}

/// Find the image the build boots from.
///
/// Looks up by id when one is set, otherwise the latest image of the
/// family in `source_image_folder_id`. An image that needs a larger disk
/// than `disk_size_gb` is rejected.
pub async fn lookup_source_image(driver: &dyn Driver, config: &BuildConfig) -> Result<Image> {
    let selector = config.source_image_selector().ok_or(Error::NoSourceImage)?;
    tracing::debug!(?selector, "Looking up source image");

    let image = match &selector {
        SourceImageSelector::Id(id) => driver.get_image(id).await?,
        SourceImageSelector::Family { folder_id, family } => {
            driver.get_image_from_folder(folder_id, family).await?
        }
    };

    if image.min_disk_size_gb > config.disk_size_gb {
        return Err(Error::SourceImageTooLarge {
            image_id: image.id,
            min_disk_size_gb: image.min_disk_size_gb,
            disk_size_gb: config.disk_size_gb,
        });
    }

    tracing::info!(image_id = %image.id, name = %image.name, "Using source image");
    Ok(image)
}
