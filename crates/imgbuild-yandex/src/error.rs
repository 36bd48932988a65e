//! Error types for imgbuild-yandex

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("a token or service account key is required to build the API client")]
    MissingCredential,

    #[error("neither source_image_id nor source_image_family is set")]
    NoSourceImage,

    #[error("image '{0}' not found")]
    ImageNotFound(String),

    #[error("cloud API call {operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error(
        "source image '{image_id}' requires a disk of at least {min_disk_size_gb} GB, \
         but disk_size_gb is {disk_size_gb}"
    )]
    SourceImageTooLarge {
        image_id: String,
        min_disk_size_gb: u32,
        disk_size_gb: u32,
    },

    #[error("instance has no {kind} address")]
    NoAddress { kind: &'static str },

    #[error("error setting up SSH config: {message}")]
    SshConfig { message: String },
}

impl Error {
    /// Failure reported by a [`Driver`](crate::Driver) call to the cloud API.
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_config_error_prefix() {
        let err = Error::SshConfig {
            message: "unrecognized private key format".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error setting up SSH config: unrecognized private key format"
        );
    }

    #[test]
    fn api_error_names_operation() {
        let err = Error::api("get_image", "PERMISSION_DENIED");
        assert_eq!(
            err.to_string(),
            "cloud API call get_image failed: PERMISSION_DENIED"
        );
    }

    #[test]
    fn too_large_names_both_sizes() {
        let err = Error::SourceImageTooLarge {
            image_id: "fd8abc".to_string(),
            min_disk_size_gb: 20,
            disk_size_gb: 10,
        };
        let text = err.to_string();
        assert!(text.contains("fd8abc"));
        assert!(text.contains("20 GB"));
        assert!(text.contains("is 10"));
    }
}
