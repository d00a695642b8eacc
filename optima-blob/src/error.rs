use optima_core::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    /// Transport or backend failure, including timeouts. Never retried by
    /// the store itself.
    #[error("Storage unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Wrap a backend/SDK error as `Unavailable`
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Unavailable {
            reason: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found<B: Into<String>, K: Into<String>>(bucket: B, key: K) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket_not_found<B: Into<String>>(bucket: B) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Transient failures a caller may choose to retry
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Io { .. })
    }
}

impl Classify for BlobError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::BucketNotFound { .. } => ErrorKind::GeneralError,
            Self::Unavailable { .. } | Self::Io { .. } => ErrorKind::Unavailable,
            Self::Invalid { .. } => ErrorKind::BadRequest,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "OBJECT_NOT_FOUND",
            Self::BucketNotFound { .. } => "BUCKET_NOT_FOUND",
            Self::Unavailable { .. } | Self::Io { .. } => "STORAGE_UNAVAILABLE",
            Self::Invalid { .. } => "INVALID_STORAGE_REQUEST",
        }
    }
}
