//! # optima-news: news records with versioned images and a public export
//!
//! [`NewsService`] drives every news mutation through the same stages:
//!
//! ```text
//! RecordMutated ──► AssetSynced (image payloads only) ──► SnapshotPublished ──► Done
//!       │                  │                                     │
//!       └──────────────────┴──────────────► Failed ◄─────────────┘
//! ```
//!
//! The record store is the durability boundary. Image and snapshot work
//! that cannot complete after it is either reported as an error (image
//! upload, version conflict) or recorded as a [`Degradation`] on an
//! otherwise successful [`MutationOutcome`].

mod bootstrap;
mod config;
mod domain;
mod error;
mod memory;
mod metrics;
mod outcome;
mod repository;
mod retry;
mod service;

pub use bootstrap::blob_store_from_config;
pub use config::NewsSettings;
pub use domain::{
    CreateNews, NewsCategory, NewsImage, NewsItem, NewsMetadata, NewsStatus, NewsView, UpdateNews,
    UserOverview,
};
pub use error::{MutationError, MutationResult};
pub use memory::{MemoryNewsRepository, MemoryUserDirectory};
pub use metrics::{DegradationCounts, DegradationMetrics};
pub use outcome::{Degradation, MutationOutcome, MutationStage};
pub use repository::{CasOutcome, NewsRepository, UserDirectory};
pub use retry::RetryPolicy;
pub use service::{NewsService, NEWS_LIST_FIELD};
