//! Resource collection.
//!
//! Stage 1 of the bundling pipeline. Walks a [`FileSystem`] depth-first and
//! snapshots every file it keeps into a [`Resource`] tree.
//!
//! ## Policy
//!
//! For each child of a directory, in name order:
//!
//! 1. **Ignored** (matches an [`IgnoreRules`] pattern): skipped. An ignored
//!    directory is never listed, so nothing below it is visited.
//! 2. **Directory, non-recursive**: recorded as an empty directory.
//! 3. **Directory, recursive**: collected in turn.
//! 4. **File**: read fully into memory.
//!
//! Collection is all or nothing. The first unreadable entry aborts with an
//! error naming its path; a partial tree is never returned.

use crate::fs::{self, FileSystem, ResourceInfo};
use crate::resource::{IgnoreRules, Resource};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("duplicate entry {name:?} in directory {path}")]
    DuplicateName { path: String, name: String },
}

impl CollectError {
    fn io(path: &str, source: io::Error) -> Self {
        Self::Io {
            path: fs::display(path).to_string(),
            source,
        }
    }

    /// Path of the entry that failed.
    pub fn path(&self) -> &str {
        match self {
            Self::Io { path, .. } | Self::DuplicateName { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Collector {
    pub recursive: bool,
    pub ignore: IgnoreRules,
}

impl Collector {
    pub fn new(recursive: bool, ignore: IgnoreRules) -> Self {
        Self { recursive, ignore }
    }

    /// Snapshot the directory `root` of `fs`.
    ///
    /// Ignore rules are matched against paths relative to `root`.
    pub fn collect<F>(&self, fs: &F, root: &str) -> Result<Resource, CollectError>
    where
        F: FileSystem + ?Sized,
    {
        let root = fs::normalize(root).map_err(|e| CollectError::io(root, e))?;
        let info = fs.stat(&root).map_err(|e| CollectError::io(&root, e))?;
        if !info.is_dir {
            return Err(CollectError::io(
                &root,
                io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            ));
        }
        self.collect_dir(fs, &root, "", info)
    }

    fn collect_dir<F>(
        &self,
        fs: &F,
        path: &str,
        rel: &str,
        info: ResourceInfo,
    ) -> Result<Resource, CollectError>
    where
        F: FileSystem + ?Sized,
    {
        let mut entries = fs.read_dir(path).map_err(|e| CollectError::io(path, e))?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let mut children = Vec::with_capacity(entries.len());
        for child in entries {
            let child_rel = fs::join(rel, &child.name);
            if self.ignore.matches(&child_rel, &child.name) {
                continue;
            }
            let child_path = fs::join(path, &child.name);

            let resource = if !child.is_dir {
                let data = fs
                    .read(&child_path)
                    .map_err(|e| CollectError::io(&child_path, e))?;
                Resource::file(child, data)
            } else if self.recursive {
                self.collect_dir(fs, &child_path, &child_rel, child)?
            } else {
                Resource::empty_dir(child)
            };
            children.push(resource);
        }

        Resource::dir(info, children).map_err(|dup| CollectError::DuplicateName {
            path: fs::display(path).to_string(),
            name: dup.0,
        })
    }
}
