//! Bundle configuration.
//!
//! Handles loading, validating, and merging `bundlefs.toml` files. Stock
//! defaults are the base layer; a user file overrides any subset of keys, and
//! command-line flags override both.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! resource_dir = "."        # Directory whose contents are embedded
//! bundle_path = "."         # Directory receiving <package>.rs
//! recursive = false         # Descend into subdirectories
//! ignore = []               # Glob patterns to leave out, e.g. ["*.psd", "drafts"]
//! include_docs = true       # Emit /// docs in the generated code
//! # package = "assets"      # Module name; default derives from bundle_path
//! compression_level = 9     # Deflate level, 0 (store) to 9 (smallest)
//! ```
//!
//! ## Relative Paths
//!
//! Paths in a config file are relative to the directory holding that file, so
//! a project can be bundled from anywhere. Paths given on the command line are
//! relative to the working directory.
//!
//! Unknown keys are rejected to catch typos early.

use crate::compress::MAX_LEVEL;
use crate::naming;
use crate::resource::IgnoreRules;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File picked up from the working directory when `--config` is not given.
pub const CONFIG_FILE: &str = "bundlefs.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Bundle configuration loaded from `bundlefs.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundleConfig {
    /// Directory whose contents are embedded.
    pub resource_dir: PathBuf,
    /// Directory the generated `<package>.rs` is written to.
    pub bundle_path: PathBuf,
    /// Descend into subdirectories instead of recording them empty.
    pub recursive: bool,
    /// Glob patterns; matching resources are left out.
    pub ignore: Vec<String>,
    /// Emit `///` documentation in the generated code.
    pub include_docs: bool,
    /// Module name for the generated code. Derived from `bundle_path` if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Deflate level, 0-9.
    pub compression_level: u32,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            resource_dir: PathBuf::from("."),
            bundle_path: PathBuf::from("."),
            recursive: false,
            ignore: Vec::new(),
            include_docs: true,
            package: None,
            compression_level: MAX_LEVEL,
        }
    }
}

impl BundleConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression_level > MAX_LEVEL {
            return Err(ConfigError::Validation(format!(
                "compression_level must be 0-{MAX_LEVEL}, got {}",
                self.compression_level
            )));
        }
        if let Some(package) = &self.package {
            naming::validate_identifier(package)
                .map_err(|e| ConfigError::Validation(format!("package: {e}")))?;
        }
        self.ignore_rules()
            .map_err(|e| ConfigError::Validation(format!("ignore: {e}")))?;
        Ok(())
    }

    /// Compiled `ignore` patterns.
    pub fn ignore_rules(&self) -> Result<IgnoreRules, glob::PatternError> {
        IgnoreRules::new(&self.ignore)
    }

    /// Resolve relative `resource_dir` and `bundle_path` against `base`.
    pub fn rebase(&mut self, base: &Path) {
        for path in [&mut self.resource_dir, &mut self.bundle_path] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BundleConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BundleConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BundleConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or stock defaults when `path` is `None`.
///
/// Relative paths from the file are rebased onto the file's directory.
pub fn load_config(path: Option<&Path>) -> Result<BundleConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let Some(path) = path else {
        return resolve_config(base, None);
    };
    let overlay = load_raw_config(path)?;
    let mut config = resolve_config(base, Some(overlay))?;
    if let Some(dir) = path.parent() {
        config.rebase(dir);
    }
    Ok(config)
}

/// `dir/bundlefs.toml` if it exists.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    let candidate = dir.join(CONFIG_FILE);
    candidate.is_file().then_some(candidate)
}

/// Returns a fully-commented stock `bundlefs.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# bundlefs configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Relative paths are resolved against the directory holding this file.
# Command-line flags override anything set here.
# Unknown keys will cause an error.

# Directory whose contents are embedded.
resource_dir = "."

# Directory the generated <package>.rs is written to. When it lies inside
# resource_dir, the generated file itself is never embedded.
bundle_path = "."

# Descend into subdirectories. When false, subdirectories are recorded as
# empty directories and their contents are left out.
recursive = false

# Glob patterns for resources to leave out. A pattern matches a resource's
# path relative to resource_dir or its file name, so "*.psd" applies at any
# depth while "drafts/*" only applies directly inside drafts/. An ignored
# directory is skipped along with everything below it.
ignore = []

# Emit /// documentation comments in the generated code.
include_docs = true

# Name of the generated module and file. Must be a valid Rust identifier.
# Defaults to the base name of bundle_path with dashes turned into
# underscores.
# package = "assets"

# Deflate compression level: 0 (store only) to 9 (smallest output).
compression_level = 9
"##
}
