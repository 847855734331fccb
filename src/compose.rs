//! Rust source generation.
//!
//! Stage 3 of the bundling pipeline. Renders an [`Archive`] as a Rust module
//! that embeds the archive bytes and manifest table and exposes them through
//! [`FileSystem`](crate::fs::FileSystem). The file is meant to be pulled into
//! a host crate with `include!`:
//!
//! ```text
//! include!("assets/assets.rs");
//!
//! let logo = assets::RESOURCES.read("img/logo.svg")?;
//! ```
//!
//! The host crate must depend on `bundlefs` for the runtime types.
//!
//! ## Rendered shape
//!
//! ```text
//! // Code generated by bundlefs. DO NOT EDIT.
//!
//! #[allow(dead_code)]
//! pub mod assets {
//!     pub const DIGEST: &str = "…";
//!     const ARCHIVE: &[u8] = b"…";
//!     const MANIFEST: &[ManifestEntry<'static>] = &[ … ];
//!     pub struct Resources { fs: EmbeddedFs<'static> }
//!     pub static RESOURCES: Resources = …;
//!     impl FileSystem for Resources { … }
//! }
//! ```
//!
//! `///` docs are only emitted when `include_docs` is set.

use crate::compress::{Archive, Manifest};
use crate::naming::{self, IdentifierError};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use thiserror::Error;

pub const HEADER: &str = "// Code generated by bundlefs. DO NOT EDIT.";

/// Indent of lines inside the generated module's items.
const INDENT: &str = "        ";

/// Escaped characters per archive literal line, before the continuation.
const LINE_WIDTH: usize = 96;

const HEX: &[u8; 16] = b"0123456789abcdef";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("invalid package name: {0}")]
    InvalidIdentifier(#[from] IdentifierError),
    #[error("rendering failed: {0}")]
    Render(#[from] fmt::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Module name wrapping the generated items; also the file stem.
    pub package: String,
    pub include_docs: bool,
}

/// Turns an archive into a [`GeneratedFile`].
pub trait Composer {
    fn compose(&self, archive: &Archive) -> Result<GeneratedFile, ComposeError>;
}

#[derive(Debug, Clone)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    pub fn new(config: GeneratorConfig) -> Result<Self, ComposeError> {
        naming::validate_identifier(&config.package)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }
}

impl Composer for Generator {
    fn compose(&self, archive: &Archive) -> Result<GeneratedFile, ComposeError> {
        naming::validate_identifier(&self.config.package)?;
        Ok(GeneratedFile {
            package: self.config.package.clone(),
            include_docs: self.config.include_docs,
            archive_literal: byte_string_literal(&archive.data),
            manifest_literal: manifest_literal(&archive.manifest),
            digest: archive.digest.clone(),
        })
    }
}

/// Pieces of one generated source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub package: String,
    pub include_docs: bool,
    pub archive_literal: String,
    pub manifest_literal: String,
    pub digest: String,
}

impl GeneratedFile {
    /// `<package>.rs`
    pub fn file_name(&self) -> String {
        format!("{}.rs", self.package)
    }

    pub fn render(&self) -> Result<String, ComposeError> {
        let mut out = String::with_capacity(
            self.archive_literal.len() + self.manifest_literal.len() + 2048,
        );
        let docs = self.include_docs;
        let p = &self.package;

        writeln!(out, "{HEADER}")?;
        writeln!(out)?;
        if docs {
            writeln!(out, "/// Resources embedded by bundlefs.")?;
            writeln!(out, "///")?;
            writeln!(out, "/// Access them through [`{p}::RESOURCES`].")?;
        }
        writeln!(out, "#[allow(dead_code)]")?;
        writeln!(out, "pub mod {p} {{")?;
        writeln!(out, "    use bundlefs::{{EmbeddedFs, FileSystem, ManifestEntry, ResourceInfo, ResourceWriter}};")?;
        writeln!(out, "    use std::io::{{self, Read}};")?;
        writeln!(out)?;
        if docs {
            writeln!(out, "    /// SHA-256 of the embedded archive, lowercase hex.")?;
        }
        writeln!(out, "    pub const DIGEST: &str = {:?};", self.digest)?;
        writeln!(out)?;
        writeln!(out, "    const ARCHIVE: &[u8] = {};", self.archive_literal)?;
        writeln!(out)?;
        writeln!(
            out,
            "    const MANIFEST: &[ManifestEntry<'static>] = {};",
            self.manifest_literal
        )?;
        writeln!(out)?;
        if docs {
            writeln!(out, "    /// Read-only filesystem over the embedded resources.")?;
        }
        writeln!(out, "    pub struct Resources {{")?;
        writeln!(out, "        fs: EmbeddedFs<'static>,")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "    impl Resources {{")?;
        if docs {
            writeln!(out, "        /// Every embedded entry, sorted by path.")?;
        }
        writeln!(out, "        pub fn manifest(&self) -> &'static [ManifestEntry<'static>] {{")?;
        writeln!(out, "            self.fs.manifest()")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        if docs {
            writeln!(out, "    /// The embedded resources. The archive is inflated on first access.")?;
        }
        writeln!(out, "    pub static RESOURCES: Resources = Resources {{")?;
        writeln!(out, "        fs: EmbeddedFs::new(ARCHIVE, MANIFEST),")?;
        writeln!(out, "    }};")?;
        writeln!(out)?;
        writeln!(out, "    impl FileSystem for Resources {{")?;
        writeln!(out, "        fn open(&self, path: &str) -> io::Result<Box<dyn Read + '_>> {{")?;
        writeln!(out, "            self.fs.open(path)")?;
        writeln!(out, "        }}")?;
        writeln!(out)?;
        writeln!(out, "        fn stat(&self, path: &str) -> io::Result<ResourceInfo> {{")?;
        writeln!(out, "            self.fs.stat(path)")?;
        writeln!(out, "        }}")?;
        writeln!(out)?;
        writeln!(out, "        fn read_dir(&self, path: &str) -> io::Result<Vec<ResourceInfo>> {{")?;
        writeln!(out, "            self.fs.read_dir(path)")?;
        writeln!(out, "        }}")?;
        writeln!(out)?;
        writeln!(out, "        fn create(&self, path: &str) -> io::Result<Box<dyn ResourceWriter + '_>> {{")?;
        writeln!(out, "            self.fs.create(path)")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;
        Ok(out)
    }
}

/// `bytes` as a Rust byte-string literal.
///
/// Printable ASCII except `"` and `\` is kept as is; everything else,
/// including space, becomes `\xNN`. Long literals are split with
/// `\`-newline continuations, which the compiler strips along with the
/// following indentation.
pub fn byte_string_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "b\"\"".to_string();
    }
    let mut out = String::with_capacity(bytes.len() * 3 + bytes.len() / LINE_WIDTH * 12 + 16);
    out.push_str("b\"\\\n");
    out.push_str(INDENT);
    let mut width = 0;
    for &b in bytes {
        if width >= LINE_WIDTH {
            out.push_str("\\\n");
            out.push_str(INDENT);
            width = 0;
        }
        match b {
            b'"' | b'\\' => width += push_hex(&mut out, b),
            0x21..=0x7e => {
                out.push(b as char);
                width += 1;
            }
            _ => width += push_hex(&mut out, b),
        }
    }
    out.push('"');
    out
}

fn push_hex(out: &mut String, b: u8) -> usize {
    out.push_str("\\x");
    out.push(HEX[(b >> 4) as usize] as char);
    out.push(HEX[(b & 0x0f) as usize] as char);
    4
}

/// The manifest as a slice expression of `ManifestEntry` constructor calls.
pub fn manifest_literal(manifest: &Manifest) -> String {
    if manifest.is_empty() {
        return "&[]".to_string();
    }
    let mut lines = vec!["&[".to_string()];
    for r in &manifest.entries {
        let line = if r.is_dir() {
            format!(
                "{INDENT}ManifestEntry::dir({:?}, 0o{:o}, {}),",
                r.path, r.info.mode, r.info.modified
            )
        } else {
            format!(
                "{INDENT}ManifestEntry::file({:?}, {}, {}, {}, 0o{:o}, {}),",
                r.path, r.offset, r.compressed_len, r.info.size, r.info.mode, r.info.modified
            )
        };
        lines.push(line);
    }
    lines.push("    ]".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::{Compressor, DeflateCompressor};
    use crate::fs::ResourceInfo;
    use crate::resource::Resource;

    fn generator(package: &str, include_docs: bool) -> Generator {
        Generator::new(GeneratorConfig {
            package: package.to_string(),
            include_docs,
        })
        .unwrap()
    }

    fn sample_archive() -> Archive {
        let tree = Resource::dir(
            ResourceInfo::dir(".", 0o755, 0),
            vec![
                Resource::file(ResourceInfo::file("a.txt", 0, 0o644, 1_700_000_000), b"hi".to_vec()),
                Resource::empty_dir(ResourceInfo::dir("empty", 0o755, 1_700_000_001)),
            ],
        )
        .unwrap();
        DeflateCompressor::default().compress(&tree).unwrap()
    }

    #[test]
    fn byte_literal_keeps_printable_ascii() {
        assert_eq!(byte_string_literal(b"ab~!"), "b\"\\\n        ab~!\"");
    }

    #[test]
    fn byte_literal_escapes_quote_backslash_space_and_binary() {
        assert_eq!(
            byte_string_literal(b"\"\\ \x00\xff"),
            "b\"\\\n        \\x22\\x5c\\x20\\x00\\xff\""
        );
    }

    #[test]
    fn byte_literal_of_nothing_is_empty() {
        assert_eq!(byte_string_literal(&[]), "b\"\"");
    }

    #[test]
    fn byte_literal_wraps_long_content() {
        let literal = byte_string_literal(&[b'a'; LINE_WIDTH * 2 + 1]);
        let lines: Vec<&str> = literal.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "b\"\\");
        assert!(lines[1].ends_with('\\'));
        assert_eq!(lines[3], format!("{INDENT}a\""));
    }

    #[test]
    fn manifest_literal_lists_constructors() {
        let archive = sample_archive();
        let literal = manifest_literal(&archive.manifest);
        let record = &archive.manifest.entries[0];
        let expected = format!(
            "&[\n        ManifestEntry::file(\"a.txt\", 0, {}, 2, 0o644, 1700000000),\n        ManifestEntry::dir(\"empty\", 0o755, 1700000001),\n    ]",
            record.compressed_len
        );
        assert_eq!(literal, expected);
    }

    #[test]
    fn manifest_literal_escapes_paths() {
        let mut archive = sample_archive();
        archive.manifest.entries[0].path = "say \"hi\".txt".to_string();
        assert!(manifest_literal(&archive.manifest).contains(r#"ManifestEntry::file("say \"hi\".txt""#));
    }

    #[test]
    fn render_wraps_items_in_package_module() {
        let file = generator("assets", false).compose(&sample_archive()).unwrap();
        let source = file.render().unwrap();

        assert!(source.starts_with(HEADER));
        assert!(source.contains("pub mod assets {"));
        assert!(source.contains(&format!("pub const DIGEST: &str = \"{}\";", file.digest)));
        assert!(source.contains("pub static RESOURCES: Resources"));
        assert!(source.contains("impl FileSystem for Resources"));
        assert!(source.ends_with("}\n"));
        assert_eq!(file.file_name(), "assets.rs");
    }

    #[test]
    fn docs_only_when_requested() {
        let archive = sample_archive();
        let with = generator("assets", true).compose(&archive).unwrap().render().unwrap();
        let without = generator("assets", false).compose(&archive).unwrap().render().unwrap();

        assert!(with.contains("///"));
        assert!(!without.contains("///"));
        // Docs are the only difference.
        let stripped: Vec<&str> = with.lines().filter(|l| !l.trim_start().starts_with("///")).collect();
        assert_eq!(stripped.join("\n") + "\n", without);
    }

    #[test]
    fn empty_archive_renders_empty_tables() {
        let archive = DeflateCompressor::default()
            .compress(&Resource::empty_root())
            .unwrap();
        let source = generator("empty", false).compose(&archive).unwrap().render().unwrap();
        assert!(source.contains("const ARCHIVE: &[u8] = b\"\";"));
        assert!(source.contains("const MANIFEST: &[ManifestEntry<'static>] = &[];"));
    }

    #[test]
    fn invalid_package_is_rejected_up_front() {
        let err = Generator::new(GeneratorConfig {
            package: "my-assets".to_string(),
            include_docs: true,
        })
        .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidIdentifier(_)));
    }

    #[test]
    fn rendering_is_deterministic() {
        let archive = sample_archive();
        let g = generator("assets", true);
        assert_eq!(
            g.compose(&archive).unwrap().render().unwrap(),
            g.compose(&archive).unwrap().render().unwrap()
        );
    }
}
