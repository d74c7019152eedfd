//! Provides the main high-level API for browsing and mutating a drive.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use pubdrive_cache::{CacheStats, TtlCache};
use pubdrive_core::{Key, ListOptions, ObjectStore, TimedStore};

use crate::blob::{BinaryReplace, BinaryUpload, BlobScheme};
use crate::listing::{self, FileNode};
use crate::{DriveError, DriveResult};

/// Construction-time settings for a [`Drive`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Lifetime of cached file contents and listings.
    pub default_ttl: Duration,
    /// Upper bound for any single store round trip. Elapsing counts as a
    /// plain failure; there is no retry.
    pub request_timeout: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// What the façade caches: decoded file content or a reconstructed listing.
#[derive(Clone, Debug)]
enum CacheValue {
    Content(String),
    Listing(Vec<FileNode>),
}

/// The file-operations façade.
///
/// `Drive` turns the store's flat get/put/delete/list into directory-shaped
/// operations and keeps one TTL cache coherent with every local mutation.
/// It holds no other state; all collaborators are injected at construction
/// and every store call goes through the fixed-timeout decorator.
///
/// Capability checks are the caller's job (`pubdrive_core::capability`);
/// the façade itself never enforces authorization.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pubdrive_fs::{Drive, DriveConfig};
/// use pubdrive_store_memory::MemoryStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), pubdrive_fs::DriveError> {
/// let drive = Drive::new(MemoryStore::new(), DriveConfig::default());
/// drive.create_file("pubky://alice/pub/notes/todo.txt", "milk").await?;
/// let nodes = drive.list_files("pubky://alice/pub/notes", true).await?;
/// assert_eq!(nodes[0].name, "todo.txt");
/// # Ok(()) }
/// ```
#[derive(Clone, Debug)]
pub struct Drive {
    store: Arc<dyn ObjectStore>,
    cache: Arc<TtlCache<CacheValue>>,
    blobs: BlobScheme,
}

impl Drive {
    /// Wires a drive on top of `store`.
    pub fn new<S>(store: S, config: DriveConfig) -> Self
    where
        S: ObjectStore + 'static,
    {
        Self::new_shared(Arc::new(store), config)
    }

    /// Wires a drive on top of an already shared store handle.
    pub fn new_shared(store: Arc<dyn ObjectStore>, config: DriveConfig) -> Self {
        let store: Arc<dyn ObjectStore> =
            Arc::new(TimedStore::new(store, config.request_timeout));
        Self {
            cache: Arc::new(TtlCache::new(config.default_ttl)),
            blobs: BlobScheme::new(store.clone()),
            store,
        }
    }

    /// The timeout-wrapped store handle, e.g. for running a [`crate::gc`]
    /// scan with the same bounds as every other operation.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Writes `content` at `key` and caches it; the parent directory's
    /// cached listing is invalidated because it just gained an entry.
    pub async fn create_file(&self, key: &str, content: &str) -> DriveResult<()> {
        let parsed = Key::parse(key)?;
        self.store
            .put(key, Bytes::copy_from_slice(content.as_bytes()))
            .await
            .map_err(|err| DriveError::from_store(key, err))?;
        self.cache
            .set(&content_cache_key(key), CacheValue::Content(content.to_string()));
        self.invalidate_parent_listing(&parsed);
        Ok(())
    }

    /// Reads the file at `key` as UTF-8 text.
    ///
    /// Zero-length content decodes to `""`; a missing object is
    /// [`DriveError::NotFound`]; the two stay distinguishable. With
    /// `use_cache` a fresh-enough cached value short-circuits the round
    /// trip; pass `false` for freshness-sensitive reads.
    pub async fn read_file(&self, key: &str, use_cache: bool) -> DriveResult<String> {
        let cache_key = content_cache_key(key);
        if use_cache {
            if let Some(CacheValue::Content(content)) = self.cache.get(&cache_key) {
                tracing::debug!("cache hit for {key}");
                return Ok(content);
            }
        }
        let bytes = self
            .store
            .get(key)
            .await
            .map_err(|err| DriveError::from_store(key, err))?;
        let content = String::from_utf8(bytes.to_vec())
            .map_err(|_| DriveError::Validation(format!("{key} does not contain UTF-8 text")))?;
        self.cache
            .set(&cache_key, CacheValue::Content(content.clone()));
        Ok(content)
    }

    /// Rewrites the file at `key`. Identity and directory membership are
    /// unchanged, so the parent's cached listing stays valid; only the
    /// cached content is refreshed.
    pub async fn update_file(&self, key: &str, content: &str) -> DriveResult<()> {
        Key::parse(key)?;
        self.store
            .put(key, Bytes::copy_from_slice(content.as_bytes()))
            .await
            .map_err(|err| DriveError::from_store(key, err))?;
        self.cache
            .set(&content_cache_key(key), CacheValue::Content(content.to_string()));
        Ok(())
    }

    /// Deletes the object at `key`, evicting its cached content and the
    /// parent directory's cached listing.
    pub async fn delete_file(&self, key: &str) -> DriveResult<()> {
        let parsed = Key::parse(key)?;
        self.store
            .delete(key)
            .await
            .map_err(|err| DriveError::from_store(key, err))?;
        self.cache.remove(&content_cache_key(key));
        self.invalidate_parent_listing(&parsed);
        Ok(())
    }

    /// Lists the immediate children of `dir` (with or without a trailing
    /// separator).
    pub async fn list_files(&self, dir: &str, use_cache: bool) -> DriveResult<Vec<FileNode>> {
        let prefix = normalize_dir_key(dir);
        Key::parse(&prefix)?;
        let cache_key = listing_cache_key(&prefix);
        if use_cache {
            if let Some(CacheValue::Listing(nodes)) = self.cache.get(&cache_key) {
                tracing::debug!("cache hit for listing of {prefix}");
                return Ok(nodes);
            }
        }
        let keys = self
            .store
            .list(&prefix, ListOptions::default())
            .await
            .map_err(|err| DriveError::from_store(&prefix, err))?;
        let nodes = listing::reconstruct(&prefix, &keys);
        self.cache
            .set(&cache_key, CacheValue::Listing(nodes.clone()));
        Ok(nodes)
    }

    /// Creates a directory by writing a zero-length placeholder object at
    /// `dir/`. The store itself has no directory primitive.
    pub async fn create_directory(&self, dir: &str) -> DriveResult<()> {
        let prefix = normalize_dir_key(dir);
        let parsed = Key::parse(&prefix)?;
        self.store
            .put(&prefix, Bytes::new())
            .await
            .map_err(|err| DriveError::from_store(&prefix, err))?;
        self.invalidate_parent_listing(&parsed);
        Ok(())
    }

    /// Copies `src` to `dst` by reading and re-creating. The two writes are
    /// not atomic; a failure in between leaves only `src`.
    pub async fn copy_file(&self, src: &str, dst: &str) -> DriveResult<()> {
        let content = self.read_file(src, true).await?;
        self.create_file(dst, &content).await
    }

    /// Moves `src` to `dst` as copy-then-delete. A crash between the two
    /// steps leaves both objects present; nothing reconciles that
    /// automatically.
    pub async fn move_file(&self, src: &str, dst: &str) -> DriveResult<()> {
        self.copy_file(src, dst).await?;
        self.delete_file(src).await
    }

    /// True if a readable object exists at `key`.
    pub async fn file_exists(&self, key: &str) -> DriveResult<bool> {
        match self.read_file(key, true).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Uploads binary content into `base_path` of `owner_id`'s tree and
    /// invalidates the affected cached listing.
    pub async fn upload_binary(
        &self,
        bytes: Bytes,
        base_path: &str,
        owner_id: &str,
        name: &str,
    ) -> DriveResult<BinaryUpload> {
        let upload = self
            .blobs
            .upload_binary(bytes, base_path, owner_id, name)
            .await?;
        let parsed = Key::parse(&upload.metadata_key)?;
        self.invalidate_parent_listing(&parsed);
        Ok(upload)
    }

    /// Replaces the content behind `metadata_key` and evicts the record's
    /// cached content (the record was rewritten in place).
    pub async fn replace_binary(
        &self,
        bytes: Bytes,
        metadata_key: &str,
    ) -> DriveResult<BinaryReplace> {
        let replace = self.blobs.replace_binary(bytes, metadata_key).await?;
        self.cache.remove(&content_cache_key(metadata_key));
        Ok(replace)
    }

    /// Drops cached entries: all of them, or those matching a `*` wildcard
    /// pattern over the internal `file:<key>` / `list:<prefix>` cache keys.
    pub fn clear_cache(&self, pattern: Option<&str>) {
        match pattern {
            Some(pattern) => {
                self.cache.invalidate_pattern(pattern);
            }
            None => self.cache.clear(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn invalidate_parent_listing(&self, key: &Key) {
        if let Some(parent) = key.parent() {
            self.cache.remove(&listing_cache_key(&parent.to_string()));
        }
    }
}

fn content_cache_key(key: &str) -> String {
    format!("file:{key}")
}

fn listing_cache_key(prefix: &str) -> String {
    format!("list:{prefix}")
}

fn normalize_dir_key(dir: &str) -> String {
    if dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}/")
    }
}
