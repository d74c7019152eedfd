use std::fmt;
use std::str::FromStr;

/// URI scheme shared by every key in the store.
pub const SCHEME: &str = "pubky";

/// Path separator within a key.
pub const SEPARATOR: char = '/';

/// Root of an owner's writable subtree. Everything outside it is read-only
/// from the client's point of view.
pub const PUB_ROOT: &str = "/pub/";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeyError {
    #[error("missing `pubky://` scheme prefix")]
    MissingScheme,
    #[error("missing owner id")]
    MissingOwner,
    #[error("missing path after owner id")]
    MissingPath,
}

/// Parsed form of a full object key: `pubky://<owner>/<path>`.
///
/// The path always begins with `/`. Keys ending in [`SEPARATOR`] address
/// directory placeholders rather than file content.
///
/// ```
/// use pubdrive_core::Key;
///
/// let key = Key::parse("pubky://alice/pub/notes/todo.txt").unwrap();
/// assert_eq!(key.owner(), "alice");
/// assert_eq!(key.name(), "todo.txt");
/// assert_eq!(key.parent().unwrap().to_string(), "pubky://alice/pub/notes/");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Key {
    owner: String,
    path: String,
}

impl Key {
    pub fn parse(s: &str) -> Result<Key, KeyError> {
        let rest = s
            .strip_prefix(SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or(KeyError::MissingScheme)?;
        let (owner, path) = match rest.find(SEPARATOR) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if owner.is_empty() {
            return Err(KeyError::MissingOwner);
        }
        if path.is_empty() {
            return Err(KeyError::MissingPath);
        }
        Ok(Key {
            owner: owner.to_string(),
            path: path.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Slash-separated path, always starting with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True if this key addresses a directory placeholder.
    pub fn is_directory(&self) -> bool {
        self.path.ends_with(SEPARATOR)
    }

    /// True if the key lies inside the owner's writable [`PUB_ROOT`] subtree.
    pub fn is_pub(&self) -> bool {
        self.path.starts_with(PUB_ROOT)
    }

    /// Last path segment, without the trailing separator for directories.
    pub fn name(&self) -> &str {
        let trimmed = self.path.trim_end_matches(SEPARATOR);
        match trimmed.rfind(SEPARATOR) {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        }
    }

    /// Enclosing directory of this key, with a trailing separator.
    /// Returns `None` at the owner root.
    pub fn parent(&self) -> Option<Key> {
        let trimmed = self.path.trim_end_matches(SEPARATOR);
        if trimmed.is_empty() {
            return None;
        }
        let idx = trimmed.rfind(SEPARATOR)?;
        Some(Key {
            owner: self.owner.clone(),
            path: trimmed[..=idx].to_string(),
        })
    }

    /// Appends `segment` to a directory key.
    pub fn join(&self, segment: &str) -> Key {
        let mut path = self.path.clone();
        if !path.ends_with(SEPARATOR) {
            path.push(SEPARATOR);
        }
        path.push_str(segment.trim_start_matches(SEPARATOR));
        Key {
            owner: self.owner.clone(),
            path,
        }
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::parse(s)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}{}", self.owner, self.path)
    }
}
