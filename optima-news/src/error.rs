use optima_assets::AssetError;
use optima_core::{Classify, ErrorKind};
use thiserror::Error;
use uuid::Uuid;

/// Result type for news operations
pub type MutationResult<T> = Result<T, MutationError>;

#[derive(Error, Debug)]
pub enum MutationError {
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("News item not found: {id}")]
    RecordNotFound { id: Uuid },

    /// The stored image version moved while a new image was being
    /// published. The new image was withdrawn; the caller may retry.
    #[error("Image version of {id} changed: expected {expected}, found {actual:?}")]
    VersionConflict {
        id: Uuid,
        expected: u32,
        actual: Option<u32>,
    },

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Record store failure: {0}")]
    Repository(#[from] anyhow::Error),
}

impl MutationError {
    pub fn invalid_request<S: Into<String>>(reason: S) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Asset(e) if e.is_transient())
    }
}

impl Classify for MutationError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { .. } => ErrorKind::BadRequest,
            Self::RecordNotFound { .. } => ErrorKind::NotFound,
            Self::VersionConflict { .. } => ErrorKind::Conflict,
            Self::Asset(e) => e.kind(),
            Self::Repository(_) => ErrorKind::GeneralError,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Asset(e) => e.code(),
            Self::Repository(_) => "RECORD_STORE_FAILED",
        }
    }
}
