//! Reconciliation pass for orphaned blobs.
//!
//! Multi-step sequences are not atomic: an upload whose record write fails,
//! a replacement whose old-blob delete fails, or a deleted record all leave
//! raw blobs behind that nothing references. This module finds and sweeps
//! them.
//!
//! The scan is conservative: only keys under the hidden
//! [`BLOB_DIR`](crate::blob::BLOB_DIR) segment are ever candidates, and a
//! probe that fails to read or parse contributes no references but also
//! condemns nothing outside the blob directory.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use pubdrive_core::{ListOptions, ObjectStore, StoreError};

use crate::blob::{BLOB_DIR, BlobMetadataRecord};
use crate::{DriveError, DriveResult};

/// Outcome of [`find_orphaned_blobs`].
#[derive(Clone, Debug, Default)]
pub struct OrphanScan {
    /// Keys probed as potential metadata records.
    pub probed: usize,
    /// Distinct blob keys referenced by at least one record.
    pub referenced: usize,
    /// Blob keys no record references.
    pub orphans: Vec<String>,
}

/// Scans everything under `root_prefix` and reports blobs that no metadata
/// record references.
///
/// All non-blob keys are probed concurrently; content that does not parse
/// as a record is ordinary file data and simply contributes no references.
pub async fn find_orphaned_blobs(
    store: &Arc<dyn ObjectStore>,
    root_prefix: &str,
) -> DriveResult<OrphanScan> {
    let keys = store
        .list(root_prefix, ListOptions::default())
        .await
        .map_err(|err| DriveError::from_store(root_prefix, err))?;

    let blob_marker = format!("/{BLOB_DIR}/");
    let (blob_keys, candidate_keys): (Vec<String>, Vec<String>) =
        keys.into_iter().partition(|key| key.contains(&blob_marker));

    let probes = candidate_keys.iter().map(|key| {
        let store = Arc::clone(store);
        async move {
            match store.get(key).await {
                Ok(bytes) => BlobMetadataRecord::parse(&bytes).map(|record| record.src),
                Err(err) => {
                    if !matches!(err, StoreError::NotFound) {
                        tracing::warn!("gc: probe of {key} failed: {err}");
                    }
                    None
                }
            }
        }
    });
    let referenced: HashSet<String> = join_all(probes).await.into_iter().flatten().collect();

    let orphans: Vec<String> = blob_keys
        .into_iter()
        .filter(|key| !referenced.contains(key))
        .collect();

    Ok(OrphanScan {
        probed: candidate_keys.len(),
        referenced: referenced.len(),
        orphans,
    })
}

/// Best-effort deletion of scanned orphans. Failures are logged and
/// skipped; returns how many blobs were actually removed.
pub async fn sweep(store: &Arc<dyn ObjectStore>, orphans: &[String]) -> usize {
    let mut removed = 0;
    for key in orphans {
        match store.delete(key).await {
            Ok(()) => removed += 1,
            Err(err) => {
                tracing::warn!("gc: failed to delete orphaned blob {key}: {err}");
            }
        }
    }
    removed
}
