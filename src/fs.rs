//! The filesystem abstraction shared by the pipeline and the generated code.
//!
//! Everything that reads or writes resources goes through [`FileSystem`]. Two
//! implementations exist:
//!
//! | Type | Backing store | Writable |
//! |------|---------------|----------|
//! | [`Dir`] | a directory on disk | yes, atomically |
//! | [`EmbeddedFs`](crate::embedded::EmbeddedFs) | an archive compiled into the binary | no |
//!
//! Code written against the trait cannot tell the two apart when reading: a
//! bundle built from `assets/` answers `open`, `stat` and `read_dir` exactly
//! like `Dir::new("assets")` does.
//!
//! ## Paths
//!
//! Paths are relative and `/`-separated on every platform. The empty string,
//! `.` and `/` all name the root. Leading `./` or `/` and trailing slashes are
//! ignored. A `..` component is rejected so no adapter can escape its root.
//!
//! ## Symlinks
//!
//! [`Dir`] follows symlinks, so a linked file is read by content and a linked
//! directory is listed like a real one. Listing a path that leads back into a
//! directory enclosing it (or into an ancestor of the root) would make a
//! recursive walk endless; `read_dir` reports it as an error naming the path
//! instead. Nothing is checked until such a path is listed, so an ignored link
//! or a non-recursive collection never trips it.
//!
//! ## Writes
//!
//! [`FileSystem::create`] hands out a [`ResourceWriter`]. Bytes go to a
//! temporary file next to the target and only replace it on
//! [`ResourceWriter::commit`]. A writer dropped without committing removes its
//! temporary file and leaves the target exactly as it was.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::NamedTempFile;

/// Mode recorded for files when the platform has no permission bits.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Mode recorded for directories when the platform has no permission bits.
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Name reported by `stat` for the root of any filesystem.
pub const ROOT_NAME: &str = ".";

/// Snapshot of a file or directory's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Base name (no directory part).
    pub name: String,
    /// Content length in bytes; always 0 for directories.
    pub size: u64,
    /// Modification time in whole seconds since the Unix epoch.
    pub modified: u64,
    /// Permission bits (`0o7777` mask).
    pub mode: u32,
    pub is_dir: bool,
}

impl ResourceInfo {
    pub fn file(name: impl Into<String>, size: u64, mode: u32, modified: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified,
            mode,
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>, mode: u32, modified: u64) -> Self {
        Self {
            name: name.into(),
            size: 0,
            modified,
            mode,
            is_dir: true,
        }
    }

    fn from_metadata(name: String, meta: &fs::Metadata) -> Self {
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);
        if meta.is_dir() {
            Self::dir(name, mode_bits(meta), modified)
        } else {
            Self::file(name, meta.len(), mode_bits(meta), modified)
        }
    }
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        DEFAULT_DIR_MODE
    } else if meta.permissions().readonly() {
        0o444
    } else {
        DEFAULT_FILE_MODE
    }
}

/// A pending write created by [`FileSystem::create`].
pub trait ResourceWriter: Write {
    /// Flush everything written so far and atomically replace the target.
    fn commit(self: Box<Self>) -> io::Result<()>;
}

/// Uniform access to a tree of resources.
pub trait FileSystem {
    /// Open a file for reading.
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Metadata for a file or directory.
    fn stat(&self, path: &str) -> io::Result<ResourceInfo>;

    /// Children of a directory, sorted by name.
    fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>>;

    /// Start an atomic write of `path`, creating parent directories as needed.
    fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>>;

    /// Read a whole file into memory.
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        (**self).open(path)
    }

    fn stat(&self, path: &str) -> io::Result<ResourceInfo> {
        (**self).stat(path)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {
        (**self).read_dir(path)
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {
        (**self).create(path)
    }
}

/// Canonical form of a relative path: no empty or `.` components, no leading
/// or trailing slash. The root normalizes to the empty string.
pub fn normalize(path: &str) -> io::Result<String> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes the filesystem root: {path}"),
                ));
            }
            p => parts.push(p),
        }
    }
    Ok(parts.join("/"))
}

/// Join a normalized parent with a child name.
pub fn join(parent: &str, name: &str) -> String {
    match (parent.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}/{name}"),
    }
}

/// Last component of a normalized path; [`ROOT_NAME`] for the root.
pub fn base_name(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => ROOT_NAME,
    }
}

/// Human-readable form of a normalized path for messages.
pub fn display(path: &str) -> &str {
    if path.is_empty() { ROOT_NAME } else { path }
}

// ============================================================================
// Disk adapter
// ============================================================================

/// A [`FileSystem`] rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    /// Root the filesystem at `root`, made absolute against the working
    /// directory. The directory does not have to exist yet.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: std::path::absolute(root)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> io::Result<(String, PathBuf)> {
        let rel = normalize(path)?;
        let full = if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&rel)
        };
        Ok((rel, full))
    }

    /// Fail if `full` resolves to a directory that encloses it on the way
    /// down from the root.
    fn check_link_cycle(&self, rel: &str, full: &Path) -> io::Result<()> {
        if rel.is_empty() {
            return Ok(());
        }
        let root = fs::canonicalize(&self.root)?;
        let target = fs::canonicalize(full)?;
        if target == root.join(rel) {
            return Ok(());
        }
        let mut current = self.root.clone();
        let mut enclosing = vec![root];
        if let Some((parent, _)) = rel.rsplit_once('/') {
            for part in parent.split('/') {
                current.push(part);
                enclosing.push(fs::canonicalize(&current)?);
            }
        }
        match enclosing.iter().find(|dir| dir.starts_with(&target)) {
            Some(dir) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{rel}: symlink cycle back to {}", dir.display()),
            )),
            None => Ok(()),
        }
    }
}

impl FileSystem for Dir {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        let (rel, full) = self.resolve(path)?;
        let file = fs::File::open(&full)?;
        if file.metadata()?.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", display(&rel)),
            ));
        }
        Ok(Box::new(file))
    }

    fn stat(&self, path: &str) -> io::Result<ResourceInfo> {
        let (rel, full) = self.resolve(path)?;
        let meta = fs::metadata(&full)?;
        Ok(ResourceInfo::from_metadata(
            base_name(&rel).to_string(),
            &meta,
        ))
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {
        let (rel, full) = self.resolve(path)?;
        self.check_link_cycle(&rel, &full)?;
        let mut infos = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let name = entry.file_name().into_string().map_err(|name| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("file name is not valid UTF-8: {name:?}"),
                )
            })?;
            let meta = fs::metadata(entry.path())?;
            infos.push(ResourceInfo::from_metadata(name, &meta));
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {
        let (rel, full) = self.resolve(path)?;
        let parent = match full.parent() {
            Some(parent) if !rel.is_empty() => parent,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot create the filesystem root",
                ));
            }
        };
        fs::create_dir_all(parent)?;
        let tmp = NamedTempFile::new_in(parent)?;
        Ok(Box::new(AtomicFile { tmp, target: full }))
    }
}

/// Temp-file-then-rename writer returned by [`Dir::create`].
struct AtomicFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tmp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.tmp.flush()
    }
}

impl ResourceWriter for AtomicFile {
    fn commit(self: Box<Self>) -> io::Result<()> {
        let Self { mut tmp, target } = *self;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        // Temp files are created 0600; generated sources should be readable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(DEFAULT_FILE_MODE))?;
        }
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    }
}

// ============================================================================
// Traversal and views
// ============================================================================

/// What [`walk`] does after visiting an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    /// Do not descend into this directory. Ignored for files.
    SkipDir,
}

/// Depth-first traversal of `root` in name order.
///
/// The visitor receives each entry's normalized path (empty for the root
/// itself) and metadata. The first error from the filesystem aborts the walk.
pub fn walk<F, V>(fs: &F, root: &str, mut visit: V) -> io::Result<()>
where
    F: FileSystem + ?Sized,
    V: FnMut(&str, &ResourceInfo) -> Walk,
{
    let root = normalize(root)?;
    let info = fs.stat(&root)?;
    walk_entry(fs, &root, &info, &mut visit)
}

fn walk_entry<F, V>(fs: &F, path: &str, info: &ResourceInfo, visit: &mut V) -> io::Result<()>
where
    F: FileSystem + ?Sized,
    V: FnMut(&str, &ResourceInfo) -> Walk,
{
    if visit(path, info) == Walk::SkipDir || !info.is_dir {
        return Ok(());
    }
    for child in fs.read_dir(path)? {
        let child_path = join(path, &child.name);
        walk_entry(fs, &child_path, &child, visit)?;
    }
    Ok(())
}

/// A view of another filesystem rooted at one of its directories.
#[derive(Debug, Clone)]
pub struct Sub<F> {
    inner: F,
    prefix: String,
}

impl<F: FileSystem> Sub<F> {
    pub fn new(inner: F, dir: &str) -> io::Result<Self> {
        let prefix = normalize(dir)?;
        if !inner.stat(&prefix)?.is_dir {
            return Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", display(&prefix)),
            ));
        }
        Ok(Self { inner, prefix })
    }

    fn full(&self, path: &str) -> io::Result<String> {
        Ok(join(&self.prefix, &normalize(path)?))
    }
}

impl<F: FileSystem> FileSystem for Sub<F> {
    fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {
        self.inner.open(&self.full(path)?)
    }

    fn stat(&self, path: &str) -> io::Result<ResourceInfo> {
        let mut info = self.inner.stat(&self.full(path)?)?;
        if normalize(path)?.is_empty() {
            info.name = ROOT_NAME.to_string();
        }
        Ok(info)
    }

    fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {
        self.inner.read_dir(&self.full(path)?)
    }

    fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {
        self.inner.create(&self.full(path)?)
    }
}
