//! Two-object binary content scheme.
//!
//! The store has no content-type attribute, so binary content is stored as
//! a pair: a raw blob under the hidden `.blobs/` segment of a directory,
//! and a small JSON metadata record next to the directory's ordinary files
//! that names, types and sizes it. Whether some bytes are such a record is
//! decided by structural probing: a parse that produces all five fields
//! with a `pubky://` source. That makes the classifier probabilistic by
//! construction: a user file could mimic the shape.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};

use pubdrive_core::{Key, ObjectStore, SCHEME};

use crate::{DriveError, DriveResult};

/// Hidden directory segment holding raw blob objects. Starts with `.` so
/// directory reconstruction never lists it.
pub const BLOB_DIR: &str = ".blobs";

/// Alphabet for generated object identifiers.
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 16;

/// Descriptor object pointing at a raw blob.
///
/// Wire format is JSON with exactly these field names; `created_at` is in
/// microseconds since the epoch and `src` is the full key of the blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadataRecord {
    pub name: String,
    pub created_at: u64,
    pub src: String,
    pub content_type: String,
    pub size: u64,
}

impl BlobMetadataRecord {
    /// Structural probe: `Some` iff `content` deserializes with all five
    /// fields correctly typed and `src` carries the store scheme. Any
    /// failure, including malformed JSON, means "ordinary content, not a
    /// metadata pointer".
    pub fn parse(content: &[u8]) -> Option<BlobMetadataRecord> {
        let record: BlobMetadataRecord = serde_json::from_slice(content).ok()?;
        if !record.src.starts_with(SCHEME) || !record.src[SCHEME.len()..].starts_with("://") {
            return None;
        }
        Some(record)
    }

    pub fn to_bytes(&self) -> Bytes {
        serde_json::to_vec(self).unwrap().into()
    }
}

/// True if `content` parses as a [`BlobMetadataRecord`].
pub fn is_metadata(content: &[u8]) -> bool {
    BlobMetadataRecord::parse(content).is_some()
}

/// Outcome of [`BlobScheme::upload_binary`].
#[derive(Clone, Debug)]
pub struct BinaryUpload {
    pub blob_key: String,
    pub metadata_key: String,
    pub record: BlobMetadataRecord,
}

/// Outcome of [`BlobScheme::replace_binary`].
#[derive(Clone, Debug)]
pub struct BinaryReplace {
    pub new_blob_key: String,
    pub record: BlobMetadataRecord,
}

/// Blob + metadata operations over an [`ObjectStore`].
#[derive(Clone, Debug)]
pub struct BlobScheme {
    store: Arc<dyn ObjectStore>,
}

impl BlobScheme {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Writes `bytes` as a raw blob plus a metadata record under
    /// `base_path` (owner-relative directory path) in `owner_id`'s tree.
    ///
    /// Phases, in order: blob first, then the record referencing it. A
    /// record-write failure after a successful blob write leaves the blob
    /// orphaned with no rollback; the [`crate::gc`] pass reclaims it.
    pub async fn upload_binary(
        &self,
        bytes: Bytes,
        base_path: &str,
        owner_id: &str,
        name: &str,
    ) -> DriveResult<BinaryUpload> {
        let base = format!("{SCHEME}://{owner_id}{}", normalize_dir_path(base_path));
        let blob_key = format!("{base}{BLOB_DIR}/{}", generate_id());
        let metadata_key = format!("{base}{}", generate_id());

        let record = BlobMetadataRecord {
            name: name.to_string(),
            created_at: now_micros(),
            src: blob_key.clone(),
            content_type: resolve_content_type(name, &bytes).to_string(),
            size: bytes.len() as u64,
        };

        self.store
            .put(&blob_key, bytes)
            .await
            .map_err(|err| DriveError::from_store(&blob_key, err))?;
        self.store
            .put(&metadata_key, record.to_bytes())
            .await
            .map_err(|err| DriveError::from_store(&metadata_key, err))?;

        Ok(BinaryUpload {
            blob_key,
            metadata_key,
            record,
        })
    }

    /// Replaces the content behind an existing metadata record.
    ///
    /// Phases: read + parse the record, write a new blob under the same
    /// base path, rewrite the record in place (same key, new `src`, new
    /// `size`/`content_type`, original `name` and `created_at`), then
    /// best-effort delete the previous blob. A failed delete is logged and
    /// does not fail the replacement.
    pub async fn replace_binary(
        &self,
        bytes: Bytes,
        metadata_key: &str,
    ) -> DriveResult<BinaryReplace> {
        let content = self
            .store
            .get(metadata_key)
            .await
            .map_err(|err| DriveError::from_store(metadata_key, err))?;
        let previous = BlobMetadataRecord::parse(&content).ok_or_else(|| {
            DriveError::Validation(format!("{metadata_key} is not a blob metadata record"))
        })?;

        let base = Key::parse(metadata_key)?
            .parent()
            .ok_or_else(|| DriveError::Validation(format!("{metadata_key} has no parent directory")))?;
        let new_blob_key = format!("{base}{BLOB_DIR}/{}", generate_id());

        let record = BlobMetadataRecord {
            name: previous.name.clone(),
            created_at: previous.created_at,
            src: new_blob_key.clone(),
            content_type: resolve_content_type(&previous.name, &bytes).to_string(),
            size: bytes.len() as u64,
        };

        self.store
            .put(&new_blob_key, bytes)
            .await
            .map_err(|err| DriveError::from_store(&new_blob_key, err))?;
        self.store
            .put(metadata_key, record.to_bytes())
            .await
            .map_err(|err| DriveError::from_store(metadata_key, err))?;

        if let Err(err) = self.store.delete(&previous.src).await {
            tracing::warn!(
                "blob replace: failed to delete previous blob {}: {err}",
                previous.src
            );
        }

        Ok(BinaryReplace {
            new_blob_key,
            record,
        })
    }
}

/// Picks a MIME type for `name`, falling back to a magic-number probe of
/// the leading `bytes`, then to `application/octet-stream`.
pub fn resolve_content_type(name: &str, bytes: &[u8]) -> &'static str {
    if let Some((_, ext)) = name.rsplit_once('.') {
        if let Some(mime) = content_type_for_extension(&ext.to_ascii_lowercase()) {
            return mime;
        }
    }
    sniff_content_type(bytes).unwrap_or("application/octet-stream")
}

fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "csv" => "text/csv",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "zip" => "application/zip",
        "wasm" => "application/wasm",
        _ => return None,
    })
}

/// Magic-number probe over the first bytes of common binary formats.
fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }
    if bytes.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if bytes.starts_with(b"BM") {
        return Some("image/bmp");
    }
    if bytes.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if bytes.len() >= 4
        && bytes.starts_with(b"PK")
        && matches!(&bytes[2..4], [0x03, 0x04] | [0x05, 0x06] | [0x07, 0x08])
    {
        return Some("application/zip");
    }
    None
}

fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Owner-relative directory path with a leading and trailing separator.
fn normalize_dir_path(path: &str) -> String {
    let mut normalized = String::new();
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_complete_records() {
        let raw = br#"{"name":"photo.jpg","created_at":1,"src":"pubky://o/pub/d/.blobs/x","content_type":"image/jpeg","size":3}"#;
        let record = BlobMetadataRecord::parse(raw).unwrap();
        assert_eq!(record.name, "photo.jpg");
        assert_eq!(record.src, "pubky://o/pub/d/.blobs/x");
        assert!(is_metadata(raw));
    }

    #[test]
    fn parse_rejects_structural_mismatches() {
        // Missing field.
        assert!(BlobMetadataRecord::parse(br#"{"name":"x","created_at":1,"src":"pubky://o/p","size":3}"#).is_none());
        // Wrong type.
        assert!(BlobMetadataRecord::parse(br#"{"name":"x","created_at":"1","src":"pubky://o/p","content_type":"t","size":3}"#).is_none());
        // Foreign scheme.
        assert!(BlobMetadataRecord::parse(br#"{"name":"x","created_at":1,"src":"https://o/p","content_type":"t","size":3}"#).is_none());
        // Not JSON at all.
        assert!(BlobMetadataRecord::parse(b"just some text").is_none());
        assert!(!is_metadata(b""));
    }

    #[test]
    fn record_roundtrips_through_bytes() {
        let record = BlobMetadataRecord {
            name: "a.png".into(),
            created_at: 1_700_000_000_000_000,
            src: "pubky://o/pub/d/.blobs/abc".into(),
            content_type: "image/png".into(),
            size: 42,
        };
        assert_eq!(BlobMetadataRecord::parse(&record.to_bytes()), Some(record));
    }

    #[test]
    fn extension_wins_over_magic() {
        assert_eq!(
            resolve_content_type("shot.png", &[0xFF, 0xD8, 0xFF, 0xE0]),
            "image/png"
        );
    }

    #[test]
    fn magic_numbers_cover_common_formats() {
        assert_eq!(resolve_content_type("x", &[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(resolve_content_type("x", &[0x89, b'P', b'N', b'G']), "image/png");
        assert_eq!(resolve_content_type("x", b"GIF89a"), "image/gif");
        assert_eq!(resolve_content_type("x", b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
        assert_eq!(resolve_content_type("x", b"BM\x00\x00"), "image/bmp");
        assert_eq!(resolve_content_type("x", b"%PDF-1.7"), "application/pdf");
        assert_eq!(resolve_content_type("x", b"\x00\x00\x00\x18ftypisom"), "video/mp4");
        assert_eq!(resolve_content_type("x", b"PK\x03\x04rest"), "application/zip");
        assert_eq!(resolve_content_type("x", b"PK\x05\x06"), "application/zip");
        assert_eq!(resolve_content_type("x", b"plain"), "application/octet-stream");
    }

    #[test]
    fn generated_ids_use_fixed_alphabet_and_length() {
        let id = generate_id();
        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
        assert_ne!(generate_id(), generate_id());
    }

    #[test]
    fn dir_path_normalization() {
        assert_eq!(normalize_dir_path("/pub/drive"), "/pub/drive/");
        assert_eq!(normalize_dir_path("pub/drive/"), "/pub/drive/");
        assert_eq!(normalize_dir_path("/pub/drive/"), "/pub/drive/");
    }
}
