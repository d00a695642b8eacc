use std::sync::Arc;

use bytes::Bytes;
use optima_blob::BlobStore;
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{info, warn};

use crate::{SnapshotError, SnapshotResult};

/// Folder holding the static JSON exports in the web bucket
pub const SNAPSHOT_FOLDER: &str = "static-api/json";

const JSON_CONTENT_TYPE: &str = "application/json";

/// An entity that can appear in a public snapshot
pub trait SnapshotEntry {
    type View: Serialize;

    /// Only active entries are exported
    fn is_active(&self) -> bool;

    /// Public projection written to the snapshot
    fn view(&self) -> &Self::View;
}

/// Where and how a published snapshot landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedSnapshot {
    pub key: String,
    pub entries: usize,
    pub size_bytes: u64,
}

struct ActiveViews<'a, E>(&'a [E]);

impl<E: SnapshotEntry> Serialize for ActiveViews<'_, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().filter(|e| e.is_active()).map(|e| e.view()))
    }
}

/// `{ "<list_field>": [ ... ] }`
struct Envelope<'a, E> {
    list_field: &'a str,
    entries: ActiveViews<'a, E>,
}

impl<E: SnapshotEntry> Serialize for Envelope<'_, E> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.list_field, &self.entries)?;
        map.end()
    }
}

/// Republishes the full active set of one entity type as a static JSON
/// file. Every publish overwrites the previous document.
pub struct SnapshotPublisher {
    store: Arc<dyn BlobStore>,
    bucket: String,
    key: String,
    list_field: String,
}

impl SnapshotPublisher {
    pub fn new<B, F, L>(store: Arc<dyn BlobStore>, bucket: B, file_name: F, list_field: L) -> Self
    where
        B: Into<String>,
        F: AsRef<str>,
        L: Into<String>,
    {
        Self {
            store,
            bucket: bucket.into(),
            key: format!("{SNAPSHOT_FOLDER}/{}", file_name.as_ref()),
            list_field: list_field.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Encode the active subset of `entities` and upload it
    pub async fn publish_active_snapshot<E: SnapshotEntry>(
        &self,
        entities: &[E],
    ) -> SnapshotResult<PublishedSnapshot> {
        let entries = entities.iter().filter(|e| e.is_active()).count();
        let body = self.encode(entities)?;
        let size_bytes = body.len() as u64;

        if let Err(source) = self
            .store
            .put(&self.bucket, &self.key, Some(JSON_CONTENT_TYPE), body)
            .await
        {
            warn!(key = %self.key, error = %source, "snapshot upload failed");
            return Err(SnapshotError::SnapshotPublishFailed {
                key: self.key.clone(),
                source,
            });
        }

        info!(key = %self.key, entries, size_bytes, "snapshot published");
        Ok(PublishedSnapshot {
            key: self.key.clone(),
            entries,
            size_bytes,
        })
    }

    fn encode<E: SnapshotEntry>(&self, entities: &[E]) -> SnapshotResult<Bytes> {
        let envelope = Envelope {
            list_field: &self.list_field,
            entries: ActiveViews(entities),
        };
        serde_json::to_vec(&envelope)
            .map(Bytes::from)
            .map_err(|source| SnapshotError::SnapshotEncodingFailed {
                key: self.key.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optima_blob::MemoryBlobStore;
    use serde::Serialize;
    use serde_json::{json, Value};

    #[derive(Serialize)]
    struct Card {
        name: &'static str,
        #[serde(skip)]
        active: bool,
    }

    impl SnapshotEntry for Card {
        type View = Self;

        fn is_active(&self) -> bool {
            self.active
        }

        fn view(&self) -> &Self {
            self
        }
    }

    struct Broken;

    impl Serialize for Broken {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("unserializable"))
        }
    }

    impl SnapshotEntry for Broken {
        type View = Self;

        fn is_active(&self) -> bool {
            true
        }

        fn view(&self) -> &Self {
            self
        }
    }

    #[tokio::test]
    async fn publishes_only_active_entries_under_list_field() {
        let memory = Arc::new(MemoryBlobStore::with_buckets(&["web"]));
        let publisher = SnapshotPublisher::new(memory.clone(), "web", "cards.json", "cardList");

        let published = publisher
            .publish_active_snapshot(&[
                Card { name: "a", active: true },
                Card { name: "b", active: false },
            ])
            .await
            .unwrap();
        assert_eq!(published.key, "static-api/json/cards.json");
        assert_eq!(published.entries, 1);

        let body = memory.object("web", "static-api/json/cards.json").unwrap();
        let doc: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc, json!({ "cardList": [{ "name": "a" }] }));
    }

    #[tokio::test]
    async fn encoding_failure_uploads_nothing() {
        let memory = Arc::new(MemoryBlobStore::with_buckets(&["web"]));
        let publisher = SnapshotPublisher::new(memory.clone(), "web", "broken.json", "items");

        let err = publisher.publish_active_snapshot(&[Broken]).await.unwrap_err();
        assert!(matches!(err, SnapshotError::SnapshotEncodingFailed { .. }));
        assert_eq!(memory.calls().put, 0);
    }

    #[tokio::test]
    async fn upload_failure_is_publish_failed() {
        let memory = Arc::new(MemoryBlobStore::with_buckets(&["web"]));
        memory.fail_puts_matching("static-api/json/");
        let publisher = SnapshotPublisher::new(memory.clone(), "web", "cards.json", "cardList");

        let err = publisher
            .publish_active_snapshot(&[Card { name: "a", active: true }])
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::SnapshotPublishFailed { .. }));
        assert!(err.is_transient());
    }
}
