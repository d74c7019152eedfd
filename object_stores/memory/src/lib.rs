use bytes::Bytes;
use dashmap::DashMap;
use pubdrive_core::store::{ListOptions, StoreError, StoreResult};

/// In-memory [`ObjectStore`](pubdrive_core::ObjectStore) backend.
///
/// Used by tests and embeddings that do not talk to a real homeserver.
/// Listing order is lexicographic, which doubles as the store's "own
/// ordering" for cursor semantics.
#[derive(Debug)]
pub struct MemoryStore {
    objects: DashMap<String, Bytes>,
}

impl MemoryStore {
    /// Creates a new, empty `MemoryStore`.
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl pubdrive_core::ObjectStore for MemoryStore {
    /// Returns the bytes stored at `key`.
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound)
    }

    /// Stores `bytes` at `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Bytes) -> StoreResult<()> {
        self.objects.insert(key.to_string(), bytes);
        Ok(())
    }

    /// Deletes the object at `key`.
    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.objects.remove(key).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    /// Returns full keys under `prefix`, at arbitrary depth, in
    /// lexicographic order.
    async fn list(&self, prefix: &str, options: ListOptions) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        if options.reverse {
            keys.reverse();
        }
        if let Some(cursor) = &options.cursor {
            // Resume strictly after the cursor in iteration order; the
            // cursor key itself need not exist.
            keys.retain(|key| {
                if options.reverse {
                    key < cursor
                } else {
                    key > cursor
                }
            });
        }
        if let Some(limit) = options.limit {
            keys.truncate(limit);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubdrive_core::ObjectStore;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("pubky://a/pub/x", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(
            &store.get("pubky://a/pub/x").await.unwrap()[..],
            b"hello"
        );

        store.delete("pubky://a/pub/x").await.unwrap();
        assert!(matches!(
            store.get("pubky://a/pub/x").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.delete("pubky://a/pub/x").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_orders_and_scopes_by_prefix() {
        let store = MemoryStore::new();
        for key in ["pubky://a/pub/b", "pubky://a/pub/a/x", "pubky://b/pub/z"] {
            store.put(key, Bytes::new()).await.unwrap();
        }

        let keys = store
            .list("pubky://a/pub/", ListOptions::default())
            .await
            .unwrap();
        assert_eq!(keys, vec!["pubky://a/pub/a/x", "pubky://a/pub/b"]);
    }

    #[tokio::test]
    async fn list_cursor_reverse_and_limit() {
        let store = MemoryStore::new();
        for key in ["pubky://a/pub/1", "pubky://a/pub/2", "pubky://a/pub/3"] {
            store.put(key, Bytes::new()).await.unwrap();
        }

        let keys = store
            .list(
                "pubky://a/pub/",
                ListOptions {
                    cursor: Some("pubky://a/pub/1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(keys, vec!["pubky://a/pub/2", "pubky://a/pub/3"]);

        let keys = store
            .list(
                "pubky://a/pub/",
                ListOptions {
                    reverse: true,
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(keys, vec!["pubky://a/pub/3", "pubky://a/pub/2"]);
    }
}
