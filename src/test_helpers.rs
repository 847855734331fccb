//! Shared test utilities for the bundlefs test suite.
//!
//! Builds throwaway resource directories and gives lookup helpers over the
//! collected tree and the manifest that panic with the available names on a
//! miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = write_tree(&[("a.txt", "hi"), ("sub/b.txt", "bye"), ("empty/", "")]);
//! let tree = Collector::new(true, IgnoreRules::default())
//!     .collect(&Dir::new(tmp.path()).unwrap(), "")
//!     .unwrap();
//! assert_eq!(tree_paths(&tree), vec!["a.txt", "empty", "sub", "sub/b.txt"]);
//! ```

use std::path::Path;
use tempfile::TempDir;

use crate::compress::{Archive, Manifest, ManifestRecord};
use crate::embedded::EmbeddedFs;
use crate::fs::{self, FileSystem};
use crate::resource::Resource;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `entries` under a fresh temp directory and return it.
///
/// Parent directories are created as needed. A path ending in `/` creates an
/// empty directory and its content is ignored.
pub fn write_tree(entries: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_into(tmp.path(), entries);
    tmp
}

/// Like [`write_tree`] but into an existing directory.
pub fn write_into(root: &Path, entries: &[(&str, &str)]) {
    for (path, content) in entries {
        if let Some(dir) = path.strip_suffix('/') {
            std::fs::create_dir_all(root.join(dir)).unwrap();
            continue;
        }
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(target, content).unwrap();
    }
}

// =========================================================================
// Tree and manifest lookups
// =========================================================================

/// Every path below `tree` in depth-first name order, root excluded.
pub fn tree_paths(tree: &Resource) -> Vec<String> {
    let mut out = Vec::new();
    push_paths(tree, "", &mut out);
    out
}

fn push_paths(node: &Resource, prefix: &str, out: &mut Vec<String>) {
    for child in node.children() {
        let path = fs::join(prefix, child.name());
        out.push(path.clone());
        push_paths(child, &path, out);
    }
}

/// Manifest paths in recorded order.
pub fn manifest_paths(manifest: &Manifest) -> Vec<&str> {
    manifest.paths().collect()
}

/// Find a manifest record by path. Panics if not found.
pub fn find_record<'a>(manifest: &'a Manifest, path: &str) -> &'a ManifestRecord {
    manifest.get(path).unwrap_or_else(|| {
        let paths = manifest_paths(manifest);
        panic!("record '{path}' not found. Available: {paths:?}")
    })
}

/// Read one file back out of `archive` through [`EmbeddedFs`].
pub fn read_embedded(archive: &Archive, path: &str) -> Vec<u8> {
    let entries = archive.entries();
    let efs = EmbeddedFs::new(&archive.data, &entries);
    efs.read(path)
        .unwrap_or_else(|e| panic!("reading '{path}' from archive failed: {e}"))
}
