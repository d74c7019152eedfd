//! # Pubdrive file-system layer
//!
//! Hierarchical file-browser semantics on top of a flat remote object store
//! that only knows get/put/delete/list-by-prefix.
//!
//! ## Layers
//! 1. `listing` – pure reconstruction of one directory level from a flat
//!    list of full keys.
//! 2. `blob`    – two-object binary content scheme: a raw blob plus a JSON
//!    metadata record pointing at it.
//! 3. `api`     – ergonomic façade ([`Drive`]) that applications use, with
//!    TTL-cache coherency rules for every mutation.
//! 4. `gc`      – reconciliation pass that finds and sweeps blobs no record
//!    references anymore.
//!
//! All store access is injected as an `Arc<dyn ObjectStore>` at
//! construction; there is no ambient global state.

use std::time::Duration;

pub mod blob;
pub mod gc;
pub mod listing;

mod api;

pub use api::{Drive, DriveConfig};
pub use blob::{
    BinaryReplace, BinaryUpload, BlobMetadataRecord, BlobScheme, is_metadata, resolve_content_type,
};
pub use listing::{FileNode, RESERVED_SENTINEL};

use pubdrive_core::{KeyError, StoreError, Unauthorized};

/// Crate-wide result alias.
pub type DriveResult<T> = Result<T, DriveError>;

/// Error kinds crossing the façade boundary.
///
/// Callers can branch on the kind instead of re-deriving the cause from a
/// collapsed boolean: "the object is absent" ([`DriveError::NotFound`]) and
/// "the store did not answer" ([`DriveError::Timeout`],
/// [`DriveError::Network`]) stay distinguishable.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DriveError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Unauthorized(#[from] Unauthorized),

    #[error("store request for {key} timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    #[error("store request for {key} failed: {source}")]
    Network {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{0}")]
    Validation(String),

    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),
}

impl DriveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound(_))
    }

    pub(crate) fn from_store(key: &str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound => DriveError::NotFound(key.to_string()),
            StoreError::Timeout(timeout) => DriveError::Timeout {
                key: key.to_string(),
                timeout,
            },
            StoreError::Other(source) => DriveError::Network {
                key: key.to_string(),
                source,
            },
            other => DriveError::Network {
                key: key.to_string(),
                source: anyhow::Error::new(other),
            },
        }
    }
}
