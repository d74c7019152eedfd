//! Directory reconstruction: one level of hierarchy out of a flat key list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Substring marking store bookkeeping entries. Keys carrying it never
/// surface in a listing.
pub const RESERVED_SENTINEL: &str = "~sys~";

/// One entry of a directory listing.
///
/// Directories carry no size; neither size nor modification time is
/// recoverable from a bare key list, so both stay `None` until a caller
/// enriches the node (e.g. from a parsed metadata record).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    /// Full key of the child; directories end with the separator.
    pub path: String,
    pub is_directory: bool,
    pub size: Option<u64>,
    /// Microseconds since the epoch.
    pub modified_at: Option<u64>,
}

/// Reduces the flat list of full keys under `prefix` to the immediate
/// children of that directory.
///
/// `prefix` must be a full directory key ending with the separator. Keys are
/// discarded when they equal the prefix itself (the directory's own
/// placeholder), carry [`RESERVED_SENTINEL`], are not under the prefix at
/// all, start with `.` relative to the prefix, or contain a doubled
/// separator in their path portion (malformed).
///
/// A child directory appears once no matter how many descendants it has.
/// The result is sorted directories-first, then lexicographic by name.
/// Deeper levels are reachable only by reconstructing again with the child
/// directory as the new prefix.
pub fn reconstruct(prefix: &str, flat_keys: &[String]) -> Vec<FileNode> {
    let mut children: BTreeMap<&str, bool> = BTreeMap::new();

    for key in flat_keys {
        if key == prefix || key.contains(RESERVED_SENTINEL) {
            continue;
        }
        let Some(relative) = key.strip_prefix(prefix) else {
            continue;
        };
        if relative.is_empty() || relative.starts_with('.') {
            continue;
        }
        if path_portion(key).contains("//") {
            continue;
        }

        let (first, rest) = match relative.split_once('/') {
            Some((first, rest)) => (first, Some(rest)),
            None => (relative, None),
        };
        if first.is_empty() {
            continue;
        }
        // More than one segment, or a trailing separator, means `first`
        // names a directory.
        let is_directory = rest.is_some();
        children
            .entry(first)
            .and_modify(|dir| *dir |= is_directory)
            .or_insert(is_directory);
    }

    let mut nodes: Vec<FileNode> = children
        .into_iter()
        .map(|(name, is_directory)| FileNode {
            name: name.to_string(),
            path: if is_directory {
                format!("{prefix}{name}/")
            } else {
                format!("{prefix}{name}")
            },
            is_directory,
            size: None,
            modified_at: None,
        })
        .collect();
    nodes.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    nodes
}

/// Everything after the `://` scheme marker, or the whole key if there is
/// none.
fn path_portion(key: &str) -> &str {
    match key.find("://") {
        Some(idx) => &key[idx + 3..],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "pubky://owner/pub/drive/";

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn filters_and_classifies_one_level() {
        let flat = keys(&[
            "pubky://owner/pub/drive/a/",
            "pubky://owner/pub/drive/a/x.json",
            "pubky://owner/pub/drive/b.txt",
            "pubky://owner/pub/drive/~sys~cursor",
            "pubky://owner/pub/drive/.hidden",
            "pubky://other//bad",
        ]);
        let nodes = reconstruct(PREFIX, &flat);

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].name, "a");
        assert!(nodes[0].is_directory);
        assert_eq!(nodes[0].path, "pubky://owner/pub/drive/a/");
        assert_eq!(nodes[1].name, "b.txt");
        assert!(!nodes[1].is_directory);
        assert_eq!(nodes[1].path, "pubky://owner/pub/drive/b.txt");
    }

    #[test]
    fn directory_with_many_descendants_yields_one_node() {
        let flat = keys(&[
            "pubky://owner/pub/drive/photos/1.jpg",
            "pubky://owner/pub/drive/photos/2.jpg",
            "pubky://owner/pub/drive/photos/nested/3.jpg",
        ]);
        let nodes = reconstruct(PREFIX, &flat);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "photos");
        assert!(nodes[0].is_directory);
    }

    #[test]
    fn own_placeholder_is_invisible() {
        let flat = keys(&["pubky://owner/pub/drive/"]);
        assert!(reconstruct(PREFIX, &flat).is_empty());
    }

    #[test]
    fn directories_sort_before_files() {
        let flat = keys(&[
            "pubky://owner/pub/drive/a.txt",
            "pubky://owner/pub/drive/z/inner.txt",
            "pubky://owner/pub/drive/b/",
            "pubky://owner/pub/drive/y.txt",
        ]);
        let names: Vec<(String, bool)> = reconstruct(PREFIX, &flat)
            .into_iter()
            .map(|n| (n.name, n.is_directory))
            .collect();
        assert_eq!(
            names,
            vec![
                ("b".to_string(), true),
                ("z".to_string(), true),
                ("a.txt".to_string(), false),
                ("y.txt".to_string(), false),
            ]
        );
    }

    #[test]
    fn descendant_upgrades_file_to_directory() {
        // A bare key and descendants under the same name collapse into one
        // directory node.
        let flat = keys(&[
            "pubky://owner/pub/drive/report",
            "pubky://owner/pub/drive/report/v2.txt",
        ]);
        let nodes = reconstruct(PREFIX, &flat);
        assert_eq!(nodes.len(), 1);
        assert!(nodes[0].is_directory);
    }

    #[test]
    fn dotfiles_and_blob_dir_stay_hidden() {
        let flat = keys(&[
            "pubky://owner/pub/drive/.blobs/0123abcd",
            "pubky://owner/pub/drive/.trash",
            "pubky://owner/pub/drive/visible.txt",
        ]);
        let nodes = reconstruct(PREFIX, &flat);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "visible.txt");
    }
}
