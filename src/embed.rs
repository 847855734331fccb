//! Pipeline orchestration.
//!
//! [`Embedder`] runs the stages in order and owns the only side effect of the
//! whole pipeline, the final write:
//!
//! ```text
//! Idle ─► Collecting ─► Compressing ─► Composing ─► Writing ─► Done
//!              │             │              │           │
//!              └─────────────┴──────┬───────┴───────────┘
//!                                   ▼
//!                            Failed(stage)
//! ```
//!
//! Nothing is retried. Each stage error is wrapped in an [`EmbedError`] that
//! names the stage, and the generated file is replaced through
//! [`FileSystem::create`] + [`ResourceWriter::commit`], so a run that fails
//! anywhere, mid-write included, leaves the previous file exactly as it was.
//!
//! [`ResourceWriter::commit`]: crate::fs::ResourceWriter::commit

use crate::collect::{CollectError, Collector};
use crate::compose::{ComposeError, Composer, Generator, GeneratorConfig};
use crate::compress::{self, Archive, CompressError, Compressor, CompressorConfig, DeflateCompressor};
use crate::config::{BundleConfig, ConfigError};
use crate::fs::{Dir, FileSystem};
use crate::naming;
use crate::output::{Discard, EmbedEvent, EventSink};
use crate::resource::Resource;
use std::fmt;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Collecting,
    Compressing,
    Composing,
    Writing,
}

impl Stage {
    /// Lowercase form for use inside sentences.
    pub fn verb(self) -> &'static str {
        match self {
            Stage::Collecting => "collecting",
            Stage::Compressing => "compressing",
            Stage::Composing => "composing",
            Stage::Writing => "writing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Collecting => "Collecting",
            Stage::Compressing => "Compressing",
            Stage::Composing => "Composing",
            Stage::Writing => "Writing",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
    Idle,
    Running(Stage),
    Done,
    Failed(Stage),
}

#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("cannot use {}: {reason}", path.display())]
    PathResolution { path: PathBuf, reason: String },
    #[error("collection failed: {0}")]
    Collection(#[from] CollectError),
    #[error("compression failed: {0}")]
    Compression(#[from] CompressError),
    #[error("code generation failed: {0}")]
    Generation(#[from] ComposeError),
    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid ignore pattern: {0}")]
    Ignore(#[from] glob::PatternError),
}

impl EmbedError {
    /// The stage that failed, or `None` for setup errors raised before any
    /// stage ran.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            EmbedError::Collection(_) => Some(Stage::Collecting),
            EmbedError::Compression(_) => Some(Stage::Compressing),
            EmbedError::Generation(_) => Some(Stage::Composing),
            EmbedError::Write { .. } => Some(Stage::Writing),
            EmbedError::PathResolution { .. } | EmbedError::Config(_) | EmbedError::Ignore(_) => {
                None
            }
        }
    }

    fn path_resolution(path: &Path, reason: impl Into<String>) -> Self {
        EmbedError::PathResolution {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a successful [`Embedder::embed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedReport {
    pub package: String,
    /// Where the generated file was written.
    pub path: PathBuf,
    /// Manifest records (files plus childless directories).
    pub entries: usize,
    pub original_bytes: u64,
    pub archive_bytes: u64,
    pub digest: String,
    /// The previous file already held byte-identical content.
    pub unchanged: bool,
}

/// Sequences collection, compression, composition and the final write.
pub struct Embedder {
    source: Box<dyn FileSystem>,
    source_root: String,
    bundle: Box<dyn FileSystem>,
    bundle_dir: PathBuf,
    collector: Collector,
    compressor: Box<dyn Compressor>,
    composer: Box<dyn Composer>,
    sink: Box<dyn EventSink>,
    state: EmbedState,
}

impl fmt::Debug for Embedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Embedder")
            .field("source_root", &self.source_root)
            .field("bundle_dir", &self.bundle_dir)
            .field("collector", &self.collector)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Embedder {
    /// Wire an embedder from its parts. Events are discarded until
    /// [`with_sink`](Self::with_sink) installs a sink.
    pub fn new(
        source: impl FileSystem + 'static,
        bundle: impl FileSystem + 'static,
        collector: Collector,
        compressor: impl Compressor + 'static,
        composer: impl Composer + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            source_root: String::new(),
            bundle: Box::new(bundle),
            bundle_dir: PathBuf::new(),
            collector,
            compressor: Box::new(compressor),
            composer: Box::new(composer),
            sink: Box::new(Discard),
            state: EmbedState::Idle,
        }
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Collect from this directory of the source filesystem instead of its root.
    pub fn with_source_root(mut self, root: impl Into<String>) -> Self {
        self.source_root = root.into();
        self
    }

    /// Directory reported as the location of the generated file.
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = dir.into();
        self
    }

    /// Build the default pipeline described by `config`.
    ///
    /// Resolves both directories to absolute, lexically cleaned paths (the
    /// resource directory must exist), picks the package name, and ignores the generated file
    /// itself when the bundle directory lies inside the resource directory.
    pub fn from_config(config: &BundleConfig) -> Result<Self, EmbedError> {
        config.validate()?;

        let resource_dir = resolve_dir(&config.resource_dir)?;
        if !resource_dir.is_dir() {
            let reason = if resource_dir.exists() {
                "not a directory"
            } else {
                "no such directory"
            };
            return Err(EmbedError::path_resolution(&resource_dir, reason));
        }
        let bundle_dir = resolve_dir(&config.bundle_path)?;
        if bundle_dir.is_file() {
            return Err(EmbedError::path_resolution(&bundle_dir, "not a directory"));
        }

        let package = match &config.package {
            Some(package) => package.clone(),
            None => naming::package_from_dir(&bundle_dir).ok_or_else(|| {
                EmbedError::path_resolution(&bundle_dir, "cannot derive a package name; set `package`")
            })?,
        };
        let generator = Generator::new(GeneratorConfig {
            package,
            include_docs: config.include_docs,
        })?;

        let mut ignore = config.ignore_rules()?;
        let output = bundle_dir.join(format!("{}.rs", generator.config().package));
        if let Some(rel) = output.strip_prefix(&resource_dir).ok().and_then(slash_path) {
            ignore.push_literal(&rel)?;
        }

        let source = Dir::new(&resource_dir)
            .map_err(|e| EmbedError::path_resolution(&resource_dir, e.to_string()))?;
        let bundle = Dir::new(&bundle_dir)
            .map_err(|e| EmbedError::path_resolution(&bundle_dir, e.to_string()))?;
        let compressor = DeflateCompressor::new(CompressorConfig {
            level: config.compression_level,
        });

        Ok(Self::new(
            source,
            bundle,
            Collector::new(config.recursive, ignore),
            compressor,
            generator,
        )
        .with_bundle_dir(bundle_dir))
    }

    pub fn state(&self) -> EmbedState {
        self.state
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Run the whole pipeline and write the generated file.
    pub fn embed(&mut self) -> Result<EmbedReport, EmbedError> {
        let archive = self.build_archive()?;

        let file = self.track(Stage::Composing, |e| Ok(e.composer.compose(&archive)?))?;
        let source = self.track(Stage::Composing, |_| Ok(file.render()?))?;
        self.sink.emit(&EmbedEvent::Composed {
            package: file.package.clone(),
        });

        let name = file.file_name();
        let path = self.bundle_dir.join(&name);
        let unchanged = self.track(Stage::Writing, |e| e.write(&name, &path, &source))?;

        self.state = EmbedState::Done;
        self.sink.emit(&EmbedEvent::Written {
            path: path.clone(),
            bytes: source.len() as u64,
            digest: archive.digest.clone(),
            unchanged,
        });

        Ok(EmbedReport {
            package: file.package,
            path,
            entries: archive.manifest.len(),
            original_bytes: archive.manifest.original_bytes(),
            archive_bytes: archive.data.len() as u64,
            digest: archive.digest,
            unchanged,
        })
    }

    /// Collect and compress without writing anything.
    pub fn prepare(&mut self) -> Result<Archive, EmbedError> {
        let archive = self.build_archive()?;
        self.state = EmbedState::Done;
        Ok(archive)
    }

    fn build_archive(&mut self) -> Result<Archive, EmbedError> {
        let tree: Resource = self.track(Stage::Collecting, |e| {
            Ok(e.collector.collect(&*e.source, &e.source_root)?)
        })?;
        self.sink.emit(&EmbedEvent::Collected {
            files: tree.file_count(),
            dirs: tree.dir_count(),
            bytes: tree.total_bytes(),
        });

        let archive = self.track(Stage::Compressing, |e| Ok(e.compressor.compress(&tree)?))?;
        self.sink.emit(&EmbedEvent::Compressed {
            entries: archive.manifest.len(),
            original_bytes: archive.manifest.original_bytes(),
            archive_bytes: archive.data.len() as u64,
        });
        Ok(archive)
    }

    /// Run one stage, keeping the state machine and the sink in step.
    fn track<T>(
        &mut self,
        stage: Stage,
        run: impl FnOnce(&Self) -> Result<T, EmbedError>,
    ) -> Result<T, EmbedError> {
        if self.state != EmbedState::Running(stage) {
            self.state = EmbedState::Running(stage);
            self.sink.emit(&EmbedEvent::StageStarted(stage));
        }
        match run(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.state = EmbedState::Failed(stage);
                self.sink.emit(&EmbedEvent::Failed {
                    stage,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Atomically replace `name` in the bundle filesystem. Returns whether the
    /// previous content was identical.
    fn write(&self, name: &str, path: &Path, source: &str) -> Result<bool, EmbedError> {
        let write_err = |source| EmbedError::Write {
            path: path.to_path_buf(),
            source,
        };
        let unchanged = match self.bundle.read(name) {
            Ok(prior) => compress::hex_digest(&prior) == compress::hex_digest(source.as_bytes()),
            Err(_) => false,
        };

        let mut writer = self.bundle.create(name).map_err(write_err)?;
        writer.write_all(source.as_bytes()).map_err(write_err)?;
        writer.commit().map_err(write_err)?;
        Ok(unchanged)
    }
}

/// Absolute form of `path` with `.` and `..` folded away lexically, so
/// `gen/..` names the same directory as its parent.
fn resolve_dir(path: &Path) -> Result<PathBuf, EmbedError> {
    let absolute = std::path::absolute(path)
        .map_err(|e| EmbedError::path_resolution(path, e.to_string()))?;
    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(clean.components().next_back(), Some(Component::Normal(_))) {
                    clean.pop();
                }
            }
            other => clean.push(other),
        }
    }
    Ok(clean)
}

/// `rel` as a `/`-separated string, if it is plain UTF-8 components.
fn slash_path(rel: &Path) -> Option<String> {
    let parts = rel
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}
