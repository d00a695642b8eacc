//! # Errors
//!
//! Optima crates each define their own `thiserror` enum close to the code
//! that fails. This module is the shared carrier those enums are rendered
//! into when a failure has to leave the process:
//! - consistent status codes + class names
//! - keeps the domain error as its `source`
//! - transport-agnostic (the server decides how to serialize)

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::{json, Value};

/// Error class names + status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,   // 400
    NotFound,     // 404
    Conflict,     // 409
    GeneralError, // 500
    BadGateway,   // 502
    Unavailable,  // 503
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::GeneralError => 500,
            ErrorKind::BadGateway => 502,
            ErrorKind::Unavailable => 503,
        }
    }

    /// Error `name` (e.g. "NotFound")
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::GeneralError => "GeneralError",
            ErrorKind::BadGateway => "BadGateway",
            ErrorKind::Unavailable => "Unavailable",
        }
    }

    /// Error `className` (kebab-cased)
    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad-request",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::GeneralError => "general-error",
            ErrorKind::BadGateway => "bad-gateway",
            ErrorKind::Unavailable => "unavailable",
        }
    }
}

/// Implemented by every domain error enum in the workspace so a transport
/// layer can classify it without knowing the concrete type.
pub trait Classify {
    fn kind(&self) -> ErrorKind;

    /// Stable machine-readable code (e.g. "IMAGE_NOT_FOUND").
    fn code(&self) -> &'static str;
}

/// A classified failure ready to leave the process. The domain error it
/// was built from stays reachable as its `source`.
#[derive(Debug)]
pub struct OptimaError {
    pub kind: ErrorKind,
    pub message: String,
    /// Stable machine-readable code
    pub reason: &'static str,
    source: AnyError,
}

impl OptimaError {
    pub fn classify<E>(err: E) -> Self
    where
        E: Classify + std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            reason: err.code(),
            source: AnyError::new(err),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    /// Client payload. The source chain is never included.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
            "reason": self.reason,
        })
    }
}

impl fmt::Display for OptimaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for OptimaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}
