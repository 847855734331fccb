//! Archive building.
//!
//! Stage 2 of the bundling pipeline. Turns a collected [`Resource`] tree into
//! one [`Archive`]: a byte blob plus a [`Manifest`] locating every entry in it.
//!
//! ## Layout
//!
//! ```text
//! archive:  [ deflate(a.txt) ][ deflate(sub/b.txt) ][ ... ]
//!             ^ offset 0        ^ offset 4
//! manifest: a.txt      offset 0  compressed 4  size 2
//!           sub/b.txt  offset 4  compressed 5  size 3
//! ```
//!
//! Each file is its own raw deflate stream so a reader can inflate any one
//! entry without touching the rest. Directories appear in the manifest only
//! when nothing is recorded below them (empty, or not descended into);
//! every other directory is implied by the paths of its files.
//!
//! ## Determinism
//!
//! Entries are sorted by path before anything is written, so the same tree and
//! the same level always produce byte-identical output regardless of the
//! order the filesystem listed things in.

use crate::embedded::ManifestEntry;
use crate::fs::{self, ResourceInfo};
use crate::resource::{Content, Resource};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{self, Write};
use thiserror::Error;

/// Highest level `flate2` accepts.
pub const MAX_LEVEL: u32 = 9;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("compressing {path} failed: {source}")]
    Codec {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("two entries flatten to the same path: {0}")]
    DuplicatePath(String),
    #[error("compression level {0} is out of range (0-{MAX_LEVEL})")]
    InvalidLevel(u32),
}

/// Where one entry lives inside the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    pub path: String,
    pub offset: usize,
    pub compressed_len: usize,
    pub info: ResourceInfo,
}

impl ManifestRecord {
    pub fn original_len(&self) -> u64 {
        self.info.size
    }

    pub fn is_dir(&self) -> bool {
        self.info.is_dir
    }

    /// Borrowed form read by [`EmbeddedFs`](crate::embedded::EmbeddedFs).
    pub fn as_entry(&self) -> ManifestEntry<'_> {
        if self.info.is_dir {
            ManifestEntry::dir(&self.path, self.info.mode, self.info.modified)
        } else {
            ManifestEntry::file(
                &self.path,
                self.offset,
                self.compressed_len,
                self.info.size,
                self.info.mode,
                self.info.modified,
            )
        }
    }
}

/// Archive index, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub entries: Vec<ManifestRecord>,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&ManifestRecord> {
        self.entries
            .binary_search_by(|r| r.path.as_str().cmp(path))
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|r| r.path.as_str())
    }

    pub fn file_count(&self) -> usize {
        self.entries.iter().filter(|r| !r.is_dir()).count()
    }

    /// Sum of uncompressed file sizes.
    pub fn original_bytes(&self) -> u64 {
        self.entries.iter().map(ManifestRecord::original_len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub data: Vec<u8>,
    pub manifest: Manifest,
    /// Lowercase hex SHA-256 of `data`.
    pub digest: String,
}

impl Archive {
    /// Manifest rows borrowing from this archive, ready for
    /// [`EmbeddedFs::new`](crate::embedded::EmbeddedFs::new).
    pub fn entries(&self) -> Vec<ManifestEntry<'_>> {
        self.manifest.entries.iter().map(ManifestRecord::as_entry).collect()
    }
}

/// Builds an [`Archive`] from a resource tree.
pub trait Compressor {
    fn compress(&self, tree: &Resource) -> Result<Archive, CompressError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Deflate level, 0 (store) to 9 (smallest).
    pub level: u32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self { level: MAX_LEVEL }
    }
}

/// Per-file raw deflate via `flate2`.
#[derive(Debug, Clone, Default)]
pub struct DeflateCompressor {
    pub config: CompressorConfig,
}

impl DeflateCompressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self { config }
    }
}

impl Compressor for DeflateCompressor {
    fn compress(&self, tree: &Resource) -> Result<Archive, CompressError> {
        if self.config.level > MAX_LEVEL {
            return Err(CompressError::InvalidLevel(self.config.level));
        }
        let level = Compression::new(self.config.level);

        let mut flat = Vec::new();
        flatten(tree, "", &mut flat);
        flat.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = flat.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(CompressError::DuplicatePath(pair[0].0.clone()));
        }

        let mut data = Vec::new();
        let mut entries = Vec::with_capacity(flat.len());
        for (path, resource) in flat {
            let offset = data.len();
            if let Some(content) = resource.data() {
                let stream = deflate(content, level).map_err(|source| CompressError::Codec {
                    path: path.clone(),
                    source,
                })?;
                data.extend_from_slice(&stream);
            }
            entries.push(ManifestRecord {
                path,
                offset,
                compressed_len: data.len() - offset,
                info: resource.info().clone(),
            });
        }

        let digest = hex_digest(&data);
        Ok(Archive {
            data,
            manifest: Manifest { entries },
            digest,
        })
    }
}

/// Files and childless directories below `resource`, with their paths.
fn flatten<'t>(resource: &'t Resource, prefix: &str, out: &mut Vec<(String, &'t Resource)>) {
    for child in resource.children() {
        let path = fs::join(prefix, child.name());
        match child.content() {
            Content::Dir(children) if !children.is_empty() => flatten(child, &path, out),
            _ => out.push((path, child)),
        }
    }
}

fn deflate(content: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(content.len() / 2), level);
    encoder.write_all(content)?;
    encoder.finish()
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::EmbeddedFs;
    use crate::fs::FileSystem;
    use crate::test_helpers::{find_record, manifest_paths, read_embedded};

    fn file(name: &str, data: &str) -> Resource {
        Resource::file(ResourceInfo::file(name, 0, 0o644, 1_700_000_000), data.as_bytes().to_vec())
    }

    fn dir(name: &str, children: Vec<Resource>) -> Resource {
        Resource::dir(ResourceInfo::dir(name, 0o755, 1_700_000_000), children).unwrap()
    }

    fn sample() -> Resource {
        dir(
            ".",
            vec![
                dir("sub", vec![file("b.txt", "bye")]),
                file("a.txt", "hi"),
                dir("empty", vec![]),
            ],
        )
    }

    #[test]
    fn manifest_is_sorted_by_path() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        assert_eq!(manifest_paths(&archive.manifest), vec!["a.txt", "empty", "sub/b.txt"]);
    }

    #[test]
    fn records_locate_contiguous_streams() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        let mut expected_offset = 0;
        for record in &archive.manifest.entries {
            assert_eq!(record.offset, expected_offset);
            expected_offset += record.compressed_len;
        }
        assert_eq!(expected_offset, archive.data.len());
    }

    #[test]
    fn directory_records_have_no_content() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        let empty = find_record(&archive.manifest, "empty");
        assert!(empty.is_dir());
        assert_eq!(empty.compressed_len, 0);
        assert_eq!(empty.original_len(), 0);
    }

    #[test]
    fn output_is_deterministic() {
        let compressor = DeflateCompressor::default();
        let first = compressor.compress(&sample()).unwrap();
        let second = compressor.compress(&sample()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn child_order_does_not_change_output() {
        let shuffled = dir(
            ".",
            vec![
                dir("empty", vec![]),
                file("a.txt", "hi"),
                dir("sub", vec![file("b.txt", "bye")]),
            ],
        );
        let compressor = DeflateCompressor::default();
        assert_eq!(
            compressor.compress(&sample()).unwrap(),
            compressor.compress(&shuffled).unwrap()
        );
    }

    #[test]
    fn digest_covers_archive_bytes() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        assert_eq!(archive.digest, hex_digest(&archive.data));
        assert_eq!(archive.digest.len(), 64);
    }

    #[test]
    fn archive_round_trips_through_embedded_fs() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        assert_eq!(read_embedded(&archive, "a.txt"), b"hi");
        assert_eq!(read_embedded(&archive, "sub/b.txt"), b"bye");

        let entries = archive.entries();
        let efs = EmbeddedFs::new(&archive.data, &entries);
        assert!(efs.stat("empty").unwrap().is_dir);
    }

    #[test]
    fn level_zero_still_round_trips() {
        let compressor = DeflateCompressor::new(CompressorConfig { level: 0 });
        let archive = compressor.compress(&sample()).unwrap();
        let entries = archive.entries();
        let efs = EmbeddedFs::new(&archive.data, &entries);
        assert_eq!(efs.read("sub/b.txt").unwrap(), b"bye");
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let compressor = DeflateCompressor::new(CompressorConfig { level: 12 });
        assert!(matches!(
            compressor.compress(&sample()),
            Err(CompressError::InvalidLevel(12))
        ));
    }

    #[test]
    fn names_that_flatten_together_are_rejected() {
        // A name containing a separator collides with a nested entry.
        let tree = dir(
            ".",
            vec![file("sub/b.txt", "one"), dir("sub", vec![file("b.txt", "two")])],
        );
        let err = DeflateCompressor::default().compress(&tree).unwrap_err();
        assert!(matches!(err, CompressError::DuplicatePath(p) if p == "sub/b.txt"));
    }

    #[test]
    fn empty_tree_gives_empty_archive() {
        let archive = DeflateCompressor::default()
            .compress(&Resource::empty_root())
            .unwrap();
        assert!(archive.data.is_empty());
        assert!(archive.manifest.is_empty());
        assert_eq!(archive.digest, hex_digest(&[]));
    }

    #[test]
    fn original_bytes_sums_file_sizes() {
        let archive = DeflateCompressor::default().compress(&sample()).unwrap();
        assert_eq!(archive.manifest.original_bytes(), 5);
        assert_eq!(archive.manifest.file_count(), 2);
    }
}
