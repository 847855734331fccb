//! Package naming for generated code.
//!
//! The generated file wraps everything in `pub mod <package> { ... }`, so the
//! package must be a plain Rust identifier. When none is configured it is
//! derived from the bundle directory's base name:
//!
//! - `assets/` → `assets`
//! - `static-files/` → `static_files`
//! - `3d-models/` → rejected (cannot start with a digit)
//!
//! Raw identifiers (`r#type`) are not accepted; pick a different name instead.

use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("package name is empty")]
    Empty,
    #[error("package name {0:?} is a Rust keyword")]
    Keyword(String),
    #[error("package name {0:?} must start with a letter or underscore")]
    BadStart(String),
    #[error("package name {name:?} contains invalid character {ch:?}")]
    BadChar { name: String, ch: char },
    #[error("`_` alone is not a valid package name")]
    Underscore,
}

/// Strict and reserved keywords across editions, 2024 included.
const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Check that `name` can be used as `pub mod <name>`.
pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(IdentifierError::Empty)?;
    if name == "_" {
        return Err(IdentifierError::Underscore);
    }
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(IdentifierError::BadStart(name.to_string()));
    }
    if let Some(ch) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(IdentifierError::BadChar {
            name: name.to_string(),
            ch,
        });
    }
    if is_keyword(name) {
        return Err(IdentifierError::Keyword(name.to_string()));
    }
    Ok(())
}

/// Package name for a bundle written into `dir`: its base name with dashes
/// turned into underscores. Not validated; `None` when `dir` has no UTF-8
/// base name (e.g. `/`).
pub fn package_from_dir(dir: &Path) -> Option<String> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.replace('-', "_"))
}
