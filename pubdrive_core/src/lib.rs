//! Core pubdrive types and traits.
//!
//! This crate defines the shared types and traits used by all pubdrive
//! crates:
//!
//! - The key model (`key::Key`): parsed `pubky://<owner>/<path>` addresses
//!   with directory/parent navigation.
//! - The storage abstraction (`store::ObjectStore`): the flat get/put/
//!   delete/list-by-prefix interface of the remote object store, plus the
//!   `TimedStore` decorator that bounds every round trip with a fixed
//!   timeout.
//! - The capability model (`capability`): client-held `{path, permissions}`
//!   grants and the pure `authorize` check evaluated before writes.
//!
//! Everything here is transport-agnostic. Concrete `ObjectStore` backends
//! live in separate crates (e.g. `pubdrive_store_memory`); the higher-level
//! directory semantics live in `pubdrive_fs`.

pub mod capability;
pub mod key;
pub mod store;

// --- Core Public Surface ---

pub use capability::{
    Capability, CapabilityParseError, Permission, PermissionSet, Unauthorized, authorize,
    ensure_authorized,
};
pub use key::{Key, KeyError, PUB_ROOT, SCHEME, SEPARATOR};
pub use store::{ListOptions, ObjectStore, StoreError, StoreResult, TimedStore};
