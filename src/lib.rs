//! # bundlefs
//!
//! Bundles a directory of static resources into a single compressed archive
//! and generates Rust source that embeds it, so a program can ship its assets
//! inside the binary and read them through an ordinary filesystem interface.
//!
//! # Architecture: Three-Stage Pipeline
//!
//! ```text
//! 1. Collect   resources/  →  Resource tree   (filesystem → in-memory snapshot)
//! 2. Compress  tree        →  Archive         (per-file deflate + sorted manifest)
//! 3. Compose   archive     →  <package>.rs    (byte literal + manifest table)
//! ```
//!
//! [`embed::Embedder`] drives the stages and performs the one write. Every
//! stage works against the [`FileSystem`] trait, and so does the generated
//! code: a host program does
//!
//! ```text
//! include!("assets/assets.rs");
//!
//! let css = assets::RESOURCES.read("css/site.css")?;
//! ```
//!
//! and gets an [`EmbeddedFs`] that behaves like the directory it came from.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`fs`] | The `FileSystem` trait, the disk adapter `Dir`, atomic writes, `walk`, `Sub` |
//! | [`embedded`] | `EmbeddedFs`: read-only filesystem over an embedded archive |
//! | [`resource`] | `Resource` tree snapshot and glob `IgnoreRules` |
//! | [`collect`] | Stage 1: depth-first collection with ignore pruning |
//! | [`compress`] | Stage 2: deflate, manifest, archive digest |
//! | [`compose`] | Stage 3: renders the embeddable Rust module |
//! | [`naming`] | Package identifier derivation and validation |
//! | [`embed`] | Stage sequencing, state machine, error wrapping, atomic write |
//! | [`config`] | `bundlefs.toml` loading, merging, validation |
//! | [`output`] | Pipeline events, sinks, and CLI formatting |
//!
//! # Design Decisions
//!
//! ## One Archive, Inflated Once
//!
//! Files are deflated one by one so the manifest can address each entry, but
//! the runtime inflates the whole archive on first access and serves every
//! later call from memory. Bundled resources are typically small and read
//! repeatedly; paying the decompression cost once keeps lookups trivial.
//!
//! ## Deterministic Output
//!
//! Directory listings are sorted by name and the manifest by path, so the same
//! tree always yields the same archive, digest and generated source. Checking
//! generated files into version control produces no diff noise.
//!
//! ## Atomic Replacement
//!
//! The generated file is written to a temp file next to its target and renamed
//! into place on commit. A failed run never leaves a half-written module that
//! breaks the host build.
//!
//! ## Injected Observability
//!
//! The library never prints. Progress goes to an [`output::EventSink`] chosen
//! by the caller; [`output::Discard`] is always valid.

pub mod collect;
pub mod compose;
pub mod compress;
pub mod config;
pub mod embed;
pub mod embedded;
pub mod fs;
pub mod naming;
pub mod output;
pub mod resource;

pub use collect::Collector;
pub use compose::{Composer, Generator};
pub use compress::{Archive, Compressor, DeflateCompressor, Manifest};
pub use embed::Embedder;
pub use embedded::{EmbeddedFs, ManifestEntry};
pub use fs::{Dir, FileSystem, ResourceInfo, ResourceWriter, Sub, Walk, walk};
pub use resource::{IgnoreRules, Resource};

#[cfg(test)]
pub(crate) mod test_helpers;
