//! # optima-assets: versioned entity images and static snapshots
//!
//! Every entity image lives in the image bucket as a pair of objects
//! sharing `(entity class, entity id, version)`:
//!
//! ```text
//! news/6f1c…/original/3
//! news/6f1c…/thumbnail/3
//! ```
//!
//! A version is written once and never overwritten. Replacing an image
//! stores the new pair at `version + 1` first and only then retires the
//! old pair, so anyone holding the old version number keeps reading a
//! consistent pair.
//!
//! [`SnapshotPublisher`] exports the active set of an entity type as one
//! JSON document under `static-api/json/` in the web bucket.
//!
//! ```rust
//! use optima_assets::{AssetConfig, EntityClass, VersionedAssetStore};
//! use optima_blob::MemoryBlobStore;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let images = VersionedAssetStore::new(
//!     Arc::new(MemoryBlobStore::with_buckets(&["optima-images"])),
//!     "optima-images",
//!     AssetConfig::default(),
//! );
//!
//! // nothing stored yet
//! let missing = images.remove_image(EntityClass::News, Uuid::new_v4(), 1).await;
//! assert!(missing.is_err());
//! # }
//! ```

mod config;
mod error;
mod key;
mod locks;
mod payload;
mod snapshot;
mod versioned;

pub use config::{AssetConfig, ImageRules};
pub use error::{AssetError, AssetResult, SnapshotError, SnapshotResult};
pub use key::{AssetKey, EntityClass, Resolution};
pub use locks::{EntityGuard, EntityLocks};
pub use payload::{ImageInfo, ImageValidator, RawImage, RulesValidator, Thumbnailer};
pub use snapshot::{PublishedSnapshot, SnapshotEntry, SnapshotPublisher, SNAPSHOT_FOLDER};
pub use versioned::{
    ImageReplacement, PublishedImage, RetireFailure, RetireReport, VersionedAssetStore,
};

/// Re-exported so callers can name formats without depending on `image`
pub use image::ImageFormat;
