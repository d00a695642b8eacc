//! # optima-blob: object storage capability
//!
//! A thin bucket/key abstraction over whatever object store backs the
//! deployment. Higher layers (versioned images, static JSON exports) talk
//! to [`BlobStore`] only.
//!
//! ```text
//! ┌──────────────────────┐
//! │ VersionedAssetStore  │  ← image lifecycle
//! │ SnapshotPublisher    │  ← static exports
//! ├──────────────────────┤
//! │ BoundedStore         │  ← per-call timeout
//! ├──────────────────────┤
//! │ BlobStore impl       │  ← S3-compatible or in-memory
//! └──────────────────────┘
//! ```
//!
//! ```rust
//! use optima_blob::prelude::*;
//! use bytes::Bytes;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = BoundedStore::new(
//!     MemoryBlobStore::with_buckets(&["optima-web"]),
//!     Duration::from_secs(5),
//! );
//! store
//!     .put(
//!         "optima-web",
//!         "static-api/json/news.json",
//!         Some("application/json"),
//!         Bytes::from_static(b"{}"),
//!     )
//!     .await?;
//! assert!(store.exists("optima-web", "static-api/json/news.json").await?);
//! # Ok(())
//! # }
//! ```

mod bounded;
mod config;
mod error;
mod memory;
mod s3_store;
pub mod store;
mod types;

pub use bounded::BoundedStore;
pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use memory::{CallSnapshot, MemoryBlobStore};
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{BlobInfo, BlobStore, GetResult, ObjectHead, PutResult};
pub use types::{collect_stream, once_stream, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobConfig, BlobError, BlobResult, BlobStore, BoundedStore, ByteStream, MemoryBlobStore,
    };
}
