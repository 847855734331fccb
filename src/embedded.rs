//! Archive-backed [`FileSystem`] used by generated bundles.
//!
//! Generated code declares the archive bytes and a static [`ManifestEntry`]
//! table as literals and wraps them in an [`EmbeddedFs`]. Nothing is
//! decompressed until the first call into the filesystem; that call inflates
//! every entry into an in-memory tree, and every later call reads from it.
//!
//! The inflation runs inside [`OnceLock::get_or_init`], so when several
//! threads hit a fresh bundle at the same time exactly one of them does the
//! work and the others block until the tree is complete.
//!
//! A damaged archive (an entry pointing outside the blob, a deflate error, a
//! length mismatch) does not panic. The failure is cached and every operation
//! reports it as [`io::ErrorKind::InvalidData`].

use crate::fs::{self, DEFAULT_DIR_MODE, FileSystem, ROOT_NAME, ResourceInfo, ResourceWriter};
use flate2::read::DeflateDecoder;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::sync::OnceLock;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Upper bound on the buffer reserved up front from a manifest's declared size.
const PREALLOC_LIMIT: u64 = 1 << 20;

/// One row of the manifest table compiled into a bundle.
///
/// `offset` and `compressed_len` locate the entry's raw deflate stream inside
/// the archive; directories carry no content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestEntry<'a> {
    pub path: &'a str,
    pub offset: usize,
    pub compressed_len: usize,
    pub size: u64,
    pub mode: u32,
    pub modified: u64,
    pub is_dir: bool,
}

impl<'a> ManifestEntry<'a> {
    pub const fn file(
        path: &'a str,
        offset: usize,
        compressed_len: usize,
        size: u64,
        mode: u32,
        modified: u64,
    ) -> Self {
        Self {
            path,
            offset,
            compressed_len,
            size,
            mode,
            modified,
            is_dir: false,
        }
    }

    pub const fn dir(path: &'a str, mode: u32, modified: u64) -> Self {
        Self {
            path,
            offset: 0,
            compressed_len: 0,
            size: 0,
            mode,
            modified,
            is_dir: true,
        }
    }
}

/// Read-only filesystem over an embedded archive.
pub struct EmbeddedFs<'a> {
    archive: &'a [u8],
    manifest: &'a [ManifestEntry<'a>],
    tree: OnceLock<Result<Tree, String>>,
    #[cfg(test)]
    inflations: AtomicUsize,
}

impl<'a> EmbeddedFs<'a> {
    /// Wrap an archive and its manifest. Usable in `static` initializers.
    pub const fn new(archive: &'a [u8], manifest: &'a [ManifestEntry<'a>]) -> Self {
        Self {
            archive,
            manifest,
            tree: OnceLock::new(),
            #[cfg(test)]
            inflations: AtomicUsize::new(0),
        }
    }

    pub fn manifest(&self) -> &'a [ManifestEntry<'a>] {
        self.manifest
    }

    /// Whether the archive has been inflated yet.
    pub fn is_loaded(&self) -> bool {
        self.tree.get().is_some()
    }

    fn tree(&self) -> io::Result<&Tree> {
        self.tree
            .get_or_init(|| {
                #[cfg(test)]
                self.inflations.fetch_add(1, Ordering::Relaxed);
                Tree::inflate(self.archive, self.manifest)
            })
            .as_ref()
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidData, msg.clone()))
    }
}

impl std::fmt::Debug for EmbeddedFs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedFs")
            .field("archive_len", &self.archive.len())
            .field("entries", &self.manifest.len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl FileSystem for EmbeddedFs<'_> {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let (key, node) = self.tree()?.get(path)?;
        if node.info.is_dir {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", fs::display(key)),
            ));
        }
        Ok(Box::new(Cursor::new(node.content.as_slice())))
    }

    fn stat(&self, path: &str) -> io::Result<ResourceInfo> {
        let (_, node) = self.tree()?.get(path)?;
        Ok(node.info.clone())
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {
        let tree = self.tree()?;
        let (key, node) = tree.get(path)?;
        if !node.info.is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", fs::display(key)),
            ));
        }
        node.children
            .iter()
            .map(|name| tree.get(&fs::join(key, name)).map(|(_, n)| n.info.clone()))
            .collect()
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("cannot create {path}: embedded resources are read-only"),
        ))
    }
}

struct Node {
    info: ResourceInfo,
    content: Vec<u8>,
    /// Child names, sorted.
    children: Vec<String>,
}

impl Node {
    fn dir(info: ResourceInfo) -> Self {
        Self {
            info,
            content: Vec::new(),
            children: Vec::new(),
        }
    }
}

/// Fully inflated archive keyed by normalized path (root = `""`).
struct Tree {
    nodes: BTreeMap<String, Node>,
}

impl Tree {
    fn inflate(archive: &[u8], manifest: &[ManifestEntry<'_>]) -> Result<Self, String> {
        let mut tree = Self {
            nodes: BTreeMap::new(),
        };
        tree.nodes.insert(
            String::new(),
            Node::dir(ResourceInfo::dir(ROOT_NAME, DEFAULT_DIR_MODE, 0)),
        );

        for entry in manifest {
            let path = fs::normalize(entry.path).map_err(|e| e.to_string())?;
            if path.is_empty() {
                return Err("manifest entry has an empty path".to_string());
            }
            let parent = tree.ensure_parents(&path)?;
            let name = fs::base_name(&path).to_string();

            if entry.is_dir {
                let info = ResourceInfo::dir(name.clone(), entry.mode, entry.modified);
                match tree.nodes.get_mut(&path) {
                    Some(existing) if existing.info.is_dir => existing.info = info,
                    Some(_) => return Err(format!("{path} is both a file and a directory")),
                    None => {
                        tree.nodes.insert(path.clone(), Node::dir(info));
                    }
                }
            } else {
                let content = inflate_entry(archive, entry)?;
                let node = Node {
                    info: ResourceInfo::file(name.clone(), entry.size, entry.mode, entry.modified),
                    content,
                    children: Vec::new(),
                };
                if tree.nodes.insert(path.clone(), node).is_some() {
                    return Err(format!("duplicate manifest path: {path}"));
                }
            }
            tree.link(&parent, &name);
        }

        for node in tree.nodes.values_mut() {
            node.children.sort();
        }
        Ok(tree)
    }

    /// Create implicit directories above `path`; returns its parent's key.
    fn ensure_parents(&mut self, path: &str) -> Result<String, String> {
        let Some((parent_path, _)) = path.rsplit_once('/') else {
            return Ok(String::new());
        };
        let mut current = String::new();
        for component in parent_path.split('/') {
            let dir_path = fs::join(&current, component);
            match self.nodes.get(&dir_path) {
                Some(node) if !node.info.is_dir => {
                    return Err(format!("{dir_path} is both a file and a directory"));
                }
                Some(_) => {}
                None => {
                    let info = ResourceInfo::dir(component, DEFAULT_DIR_MODE, 0);
                    self.nodes.insert(dir_path.clone(), Node::dir(info));
                    self.link(&current, component);
                }
            }
            current = dir_path;
        }
        Ok(current)
    }

    fn link(&mut self, parent: &str, name: &str) {
        if let Some(node) = self.nodes.get_mut(parent)
            && !node.children.iter().any(|c| c == name)
        {
            node.children.push(name.to_string());
        }
    }

    fn get(&self, path: &str) -> io::Result<(&str, &Node)> {
        let key = fs::normalize(path)?;
        self.nodes
            .get_key_value(&key)
            .map(|(k, n)| (k.as_str(), n))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{}: no such embedded resource", fs::display(&key)),
                )
            })
    }
}

fn inflate_entry(archive: &[u8], entry: &ManifestEntry<'_>) -> Result<Vec<u8>, String> {
    let stream = entry
        .offset
        .checked_add(entry.compressed_len)
        .and_then(|end| archive.get(entry.offset..end))
        .ok_or_else(|| format!("{}: content range lies outside the archive", entry.path))?;

    // One byte past the declared size is enough to detect an overlong stream.
    let capacity = usize::try_from(entry.size.min(PREALLOC_LIMIT)).unwrap_or(0);
    let mut content = Vec::with_capacity(capacity);
    DeflateDecoder::new(stream)
        .take(entry.size.saturating_add(1))
        .read_to_end(&mut content)
        .map_err(|e| format!("{}: {e}", entry.path))?;

    if content.len() as u64 != entry.size {
        return Err(format!(
            "{}: expected {} bytes, inflated {}",
            entry.path,
            entry.size,
            content.len()
        ));
    }
    Ok(content)
}
