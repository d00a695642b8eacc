//! optima-core: shared plumbing for the Optima content backend.
//!
//! Nothing in here knows about blobs or news items. It carries the pieces
//! every other crate leans on: the error carrier, the configuration store,
//! the identity seam and the tracing bootstrap.

pub mod config;
pub mod errors;
pub mod identity;
pub mod telemetry;

pub use config::{ConfigSnapshot, OptimaConfig, ENV_PREFIX};
pub use errors::{Classify, ErrorKind, OptimaError};
pub use identity::{CurrentUser, IdentityContext, StaticIdentity};
pub use telemetry::{init_tracing, LogFormat};
