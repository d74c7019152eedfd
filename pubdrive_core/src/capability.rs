use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::key::{Key, PUB_ROOT};

/// One of the two access kinds a capability can grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Read,
    Write,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Permission::Read => "read",
            Permission::Write => "write",
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    pub read: bool,
    pub write: bool,
}

impl PermissionSet {
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Read => self.read,
            Permission::Write => self.write,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CapabilityParseError {
    #[error("missing `:` between path and permission flags")]
    MissingSeparator,
    #[error("capability path must start with `/pub/`, got {0:?}")]
    OutsidePubRoot(String),
    #[error("no permission flags given")]
    EmptyPermissions,
    #[error("unknown permission flag {0:?}")]
    UnknownFlag(char),
}

/// A client-held grant of `permissions` under `path_prefix`.
///
/// Parsed from the session's `"<path>:<flags>"` strings, where flags are a
/// non-empty subset of `r` and `w`:
///
/// ```
/// use pubdrive_core::Capability;
///
/// let cap: Capability = "/pub/drive.app/:rw".parse().unwrap();
/// assert_eq!(cap.path_prefix, "/pub/drive.app/");
/// assert!(cap.permissions.read && cap.permissions.write);
/// ```
///
/// Capabilities are a client-side hint only: the server decides for itself
/// whether a write is acceptable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub path_prefix: String,
    pub permissions: PermissionSet,
}

impl FromStr for Capability {
    type Err = CapabilityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, flags) = s
            .rsplit_once(':')
            .ok_or(CapabilityParseError::MissingSeparator)?;
        if !path.starts_with(PUB_ROOT) {
            return Err(CapabilityParseError::OutsidePubRoot(path.to_string()));
        }
        if flags.is_empty() {
            return Err(CapabilityParseError::EmptyPermissions);
        }
        let mut permissions = PermissionSet::default();
        for flag in flags.chars() {
            match flag {
                'r' => permissions.read = true,
                'w' => permissions.write = true,
                other => return Err(CapabilityParseError::UnknownFlag(other)),
            }
        }
        Ok(Capability {
            path_prefix: path.to_string(),
            permissions,
        })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.path_prefix)?;
        if self.permissions.read {
            f.write_str("r")?;
        }
        if self.permissions.write {
            f.write_str("w")?;
        }
        Ok(())
    }
}

/// Denial produced by [`ensure_authorized`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{required} access to {key} is not covered by any held capability")]
pub struct Unauthorized {
    pub key: String,
    pub required: Permission,
}

/// Checks whether `capabilities` authorize `required` access to `target_key`.
///
/// Only keys under `owner_id`'s own `/pub/` subtree can ever be authorized;
/// any other owner's key, and any key that fails to parse, is denied. A
/// grant matches when its permission set includes `required` and its path
/// prefix contains the target path, or the target path contains the grant
/// prefix, so ancestor directories of a granted subtree stay listable.
///
/// Pure function over locally held grants; no I/O is performed and nothing
/// is enforced server-side.
pub fn authorize(
    capabilities: &[Capability],
    owner_id: &str,
    target_key: &str,
    required: Permission,
) -> bool {
    let Ok(key) = Key::parse(target_key) else {
        return false;
    };
    if key.owner() != owner_id || !key.is_pub() {
        return false;
    }
    let target_path = key.path();
    capabilities.iter().any(|cap| {
        cap.permissions.allows(required)
            && (cap.path_prefix.starts_with(target_path) || target_path.starts_with(&cap.path_prefix))
    })
}

/// [`authorize`] with a typed denial, for callers that want to fail a write
/// before issuing it.
pub fn ensure_authorized(
    capabilities: &[Capability],
    owner_id: &str,
    target_key: &str,
    required: Permission,
) -> Result<(), Unauthorized> {
    if authorize(capabilities, owner_id, target_key, required) {
        Ok(())
    } else {
        Err(Unauthorized {
            key: target_key.to_string(),
            required,
        })
    }
}
