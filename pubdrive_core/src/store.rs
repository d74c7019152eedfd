use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub type StoreResult<T, E = StoreError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Options for a prefix listing.
#[derive(Clone, Debug, Default)]
pub struct ListOptions {
    /// Resume strictly after this key, in iteration order.
    pub cursor: Option<String>,
    /// Iterate the store's ordering back to front.
    pub reverse: bool,
    /// Maximum number of keys to return.
    pub limit: Option<usize>,
}

/// The flat interface of the remote object store.
///
/// Keys are full `pubky://<owner>/<path>` addresses; the store itself has no
/// notion of directories. `list` returns full keys under `prefix` at
/// arbitrary depth, in the store's own ordering.
#[async_trait]
pub trait ObjectStore: std::fmt::Debug + Send + Sync + 'static {
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    async fn put(&self, key: &str, bytes: Bytes) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn list(&self, prefix: &str, options: ListOptions) -> StoreResult<Vec<String>>;
}

/// Decorator that bounds every call to the wrapped store with a fixed
/// timeout.
///
/// An elapsed timeout is reported as [`StoreError::Timeout`] and is handled
/// by callers like any other failure: single attempt, no retry.
#[derive(Debug, Clone)]
pub struct TimedStore {
    inner: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bound<T, F>(&self, key: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("store request for {key} timed out after {:?}", self.timeout);
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for TimedStore {
    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.bound(key, self.inner.get(key)).await
    }

    async fn put(&self, key: &str, bytes: Bytes) -> StoreResult<()> {
        self.bound(key, self.inner.put(key, bytes)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.bound(key, self.inner.delete(key)).await
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> StoreResult<Vec<String>> {
        self.bound(prefix, self.inner.list(prefix, options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose reads hang long enough to trip any short timeout.
    #[derive(Debug)]
    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl ObjectStore for SlowStore {
        async fn get(&self, _key: &str) -> StoreResult<Bytes> {
            tokio::time::sleep(self.delay).await;
            Ok(Bytes::from_static(b"late"))
        }

        async fn put(&self, _key: &str, _bytes: Bytes) -> StoreResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::NotFound)
        }

        async fn list(&self, _prefix: &str, _options: ListOptions) -> StoreResult<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let store = TimedStore::new(
            Arc::new(SlowStore {
                delay: Duration::from_millis(200),
            }),
            Duration::from_millis(20),
        );
        let err = store.get("pubky://alice/pub/x").await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let store = TimedStore::new(
            Arc::new(SlowStore {
                delay: Duration::from_millis(0),
            }),
            Duration::from_millis(500),
        );
        let bytes = store.get("pubky://alice/pub/x").await.unwrap();
        assert_eq!(&bytes[..], b"late");

        let err = store.delete("pubky://alice/pub/x").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
