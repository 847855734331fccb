//! Pipeline events and their CLI rendering.
//!
//! The pipeline never prints. It reports progress as [`EmbedEvent`]s through
//! an injected [`EventSink`]; what happens to them is the caller's choice:
//!
//! | Sink | Use |
//! |------|-----|
//! | [`Discard`] | `--quiet`, library callers that don't care |
//! | `mpsc::Sender<EmbedEvent>` | collecting events on another thread, tests |
//! | [`WriterSink`] | human-readable lines on stdout |
//!
//! # Output Format
//!
//! ## Embed
//!
//! ```text
//! Collecting
//!     3 files, 1 directory, 1.2 KB
//! Compressing
//!     4 entries, 1.2 KB -> 512 B (41%)
//! Composing
//!     package assets
//! Writing
//!     /srv/app/assets/assets.rs (3.4 KB)
//!     digest 9f86d081884c7d65…
//! ```
//!
//! ## Check
//!
//! ```text
//! a.txt (2 B)
//! empty/
//! sub/
//!     b.txt (3 B)
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::compress::Manifest;
use crate::embed::Stage;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc;

/// Progress reported by [`Embedder`](crate::embed::Embedder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedEvent {
    StageStarted(Stage),
    Collected {
        files: usize,
        dirs: usize,
        bytes: u64,
    },
    Compressed {
        entries: usize,
        original_bytes: u64,
        archive_bytes: u64,
    },
    Composed {
        package: String,
    },
    Written {
        path: PathBuf,
        bytes: u64,
        digest: String,
        /// The previous file already had exactly this content.
        unchanged: bool,
    },
    Failed {
        stage: Stage,
        message: String,
    },
}

/// Receives pipeline events.
pub trait EventSink {
    fn emit(&mut self, event: &EmbedEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &EmbedEvent) {}
}

impl EventSink for mpsc::Sender<EmbedEvent> {
    fn emit(&mut self, event: &EmbedEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(event.clone());
    }
}

/// Writes [`format_event`] lines to any writer, ignoring write errors.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl WriterSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn emit(&mut self, event: &EmbedEvent) {
        for line in format_event(event) {
            let _ = writeln!(self.out, "{line}");
        }
    }
}

// ============================================================================
// Shared display helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable byte count, binary units.
///
/// ```text
/// 512      -> 512 B
/// 1536     -> 1.5 KB
/// 3145728  -> 3.0 MB
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// First 16 hex digits, enough to tell bundles apart at a glance.
fn short_digest(digest: &str) -> &str {
    digest.get(..16).unwrap_or(digest)
}

// ============================================================================
// Embed output
// ============================================================================

/// Format a single pipeline event as display lines.
pub fn format_event(event: &EmbedEvent) -> Vec<String> {
    match event {
        EmbedEvent::StageStarted(stage) => vec![stage.to_string()],
        EmbedEvent::Collected { files, dirs, bytes } => vec![format!(
            "{}{}, {}, {}",
            indent(1),
            plural(*files, "file", "files"),
            plural(*dirs, "directory", "directories"),
            format_size(*bytes)
        )],
        EmbedEvent::Compressed {
            entries,
            original_bytes,
            archive_bytes,
        } => {
            let ratio = if *original_bytes == 0 {
                String::new()
            } else {
                format!(" ({}%)", archive_bytes * 100 / original_bytes)
            };
            vec![format!(
                "{}{}, {} -> {}{}",
                indent(1),
                plural(*entries, "entry", "entries"),
                format_size(*original_bytes),
                format_size(*archive_bytes),
                ratio
            )]
        }
        EmbedEvent::Composed { package } => vec![format!("{}package {}", indent(1), package)],
        EmbedEvent::Written {
            path,
            bytes,
            digest,
            unchanged,
        } => {
            let status = if *unchanged { ", unchanged" } else { "" };
            vec![
                format!(
                    "{}{} ({}{})",
                    indent(1),
                    path.display(),
                    format_size(*bytes),
                    status
                ),
                format!("{}digest {}", indent(1), short_digest(digest)),
            ]
        }
        EmbedEvent::Failed { stage, message } => {
            vec![format!("Failed while {}: {}", stage.verb(), message)]
        }
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format a manifest as an indented tree.
///
/// Directories implied by file paths get a `name/` line the first time one of
/// their files appears. Sorted paths keep every directory's entries
/// contiguous, so each directory line is printed once.
pub fn format_manifest(manifest: &Manifest) -> Vec<String> {
    let mut lines = Vec::new();
    let mut open: Vec<&str> = Vec::new();

    for record in &manifest.entries {
        let parts: Vec<&str> = record.path.split('/').collect();
        let (name, dirs) = match parts.split_last() {
            Some(split) => split,
            None => continue,
        };

        let common = open
            .iter()
            .zip(dirs.iter())
            .take_while(|(a, b)| a == b)
            .count();
        open.truncate(common);
        for dir in &dirs[common..] {
            lines.push(format!("{}{}/", indent(open.len()), dir));
            open.push(*dir);
        }

        if record.is_dir() {
            lines.push(format!("{}{}/", indent(open.len()), name));
        } else {
            lines.push(format!(
                "{}{} ({})",
                indent(open.len()),
                name,
                format_size(record.original_len())
            ));
        }
    }

    if lines.is_empty() {
        lines.push("(no resources)".to_string());
    }
    lines
}

pub fn print_manifest(manifest: &Manifest) {
    for line in format_manifest(manifest) {
        println!("{line}");
    }
}

// ============================================================================
// Tests
// ============================================================================
