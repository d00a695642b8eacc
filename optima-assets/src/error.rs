use optima_blob::BlobError;
use optima_core::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for image operations
pub type AssetResult<T> = Result<T, AssetError>;

/// Result type for snapshot publication
pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Error, Debug)]
pub enum AssetError {
    /// Rejected before any storage call was made
    #[error("Invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("Image not found: {key}")]
    ImageNotFound { key: String },

    #[error("Failed to read image {key}: {source}")]
    AssetReadFailed {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The new version was not stored; callers must not advance the
    /// entity's image version
    #[error("Failed to upload image {key}: {source}")]
    AssetUploadFailed {
        key: String,
        #[source]
        source: BlobError,
    },

    #[error("Image version {version} already exists for {key_prefix}")]
    VersionConflict { key_prefix: String, version: u32 },

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] BlobError),
}

impl From<BlobError> for AssetError {
    fn from(error: BlobError) -> Self {
        match error {
            BlobError::BucketNotFound { bucket } => Self::BucketNotFound { bucket },
            other => Self::StorageUnavailable(other),
        }
    }
}

impl AssetError {
    pub fn invalid_image<S: Into<String>>(reason: S) -> Self {
        Self::InvalidImage {
            reason: reason.into(),
        }
    }

    /// Store failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AssetUploadFailed { source, .. } => source.is_unavailable(),
            Self::StorageUnavailable(source) => source.is_unavailable(),
            _ => false,
        }
    }
}

impl Classify for AssetError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidImage { .. } => ErrorKind::BadRequest,
            Self::ImageNotFound { .. } => ErrorKind::NotFound,
            Self::AssetReadFailed { .. } | Self::AssetUploadFailed { .. } => ErrorKind::BadGateway,
            Self::VersionConflict { .. } => ErrorKind::Conflict,
            Self::BucketNotFound { .. } => ErrorKind::GeneralError,
            Self::StorageUnavailable(_) => ErrorKind::Unavailable,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidImage { .. } => "INVALID_IMAGE",
            Self::ImageNotFound { .. } => "IMAGE_NOT_FOUND",
            Self::AssetReadFailed { .. } => "ASSET_READ_FAILED",
            Self::AssetUploadFailed { .. } => "ASSET_UPLOAD_FAILED",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::BucketNotFound { .. } => "BUCKET_NOT_FOUND",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Nothing was uploaded; the previous snapshot stays in place
    #[error("Failed to encode snapshot {key}: {source}")]
    SnapshotEncodingFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to publish snapshot {key}: {source}")]
    SnapshotPublishFailed {
        key: String,
        #[source]
        source: BlobError,
    },
}

impl SnapshotError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::SnapshotPublishFailed { source, .. } if source.is_unavailable())
    }
}

impl Classify for SnapshotError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::SnapshotEncodingFailed { .. } => ErrorKind::GeneralError,
            Self::SnapshotPublishFailed { .. } => ErrorKind::BadGateway,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::SnapshotEncodingFailed { .. } => "SNAPSHOT_ENCODING_FAILED",
            Self::SnapshotPublishFailed { .. } => "SNAPSHOT_PUBLISH_FAILED",
        }
    }
}
