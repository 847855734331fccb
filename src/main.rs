use bundlefs::config::{self, BundleConfig};
use bundlefs::output::{self, WriterSink};
use bundlefs::{Archive, Embedder};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let on_tag = env!("BUNDLEFS_RELEASE");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("BUNDLEFS_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "bundlefs")]
#[command(about = "Embed a directory of resources into generated Rust source")]
#[command(long_about = "\
Embed a directory of resources into generated Rust source

Collects the files under a resource directory, compresses them into one
archive and writes <bundle-path>/<package>.rs: a Rust module holding the
archive and a read-only filesystem over it.

  assets/
  ├── css/site.css
  ├── img/logo.svg
  └── assets.rs          # generated; pull in with include!(\"assets/assets.rs\")

Then, in the host program (which depends on the bundlefs crate):

  use bundlefs::FileSystem;
  let css = assets::RESOURCES.read(\"css/site.css\")?;

Settings come from --config, else ./bundlefs.toml if present, else defaults.
Flags override file settings. Run 'bundlefs gen-config' for a documented
config file.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./bundlefs.toml if it exists)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory whose contents are embedded
    #[arg(short = 'd', long, global = true)]
    resource_dir: Option<PathBuf>,

    /// Directory the generated <package>.rs is written to
    #[arg(short = 'b', long, global = true)]
    bundle_path: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long, global = true)]
    recursive: bool,

    /// Record subdirectories as empty, even if the config enables recursion
    #[arg(long, global = true, conflicts_with = "recursive")]
    no_recursive: bool,

    /// Glob pattern to leave out; repeatable, added to the config's list
    #[arg(short, long = "ignore", value_name = "GLOB", global = true)]
    ignore: Vec<String>,

    /// Omit /// docs from the generated code
    #[arg(long, global = true)]
    no_docs: bool,

    /// Module name for the generated code
    #[arg(long, global = true)]
    package: Option<String>,

    /// Deflate level, 0 (store) to 9 (smallest)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9), global = true)]
    level: Option<u32>,

    /// Print nothing but errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Collect, compress and write the generated module (default)
    Embed,
    /// Show what would be embedded without writing anything
    Check,
    /// Print a stock bundlefs.toml with all options documented
    GenConfig,
    /// Write the archive manifest as JSON
    Manifest {
        /// Destination file
        file: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Embed);

    match command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Embed => {
            let config = resolve_config(&cli)?;
            let report = embedder(&config, cli.quiet)?.embed()?;
            if !cli.quiet {
                println!(
                    "==> Embedded {} entries into {}",
                    report.entries,
                    report.path.display()
                );
            }
        }
        Command::Check => {
            let config = resolve_config(&cli)?;
            let archive = prepare(&config, cli.quiet)?;
            output::print_manifest(&archive.manifest);
            println!(
                "==> {} entries, {} -> {}",
                archive.manifest.len(),
                output::format_size(archive.manifest.original_bytes()),
                output::format_size(archive.data.len() as u64)
            );
        }
        Command::Manifest { file } => {
            let config = resolve_config(&cli)?;
            let archive = prepare(&config, cli.quiet)?;
            let json = serde_json::to_string_pretty(&archive.manifest)?;
            std::fs::write(&file, json)?;
            if !cli.quiet {
                println!("==> Manifest written to {}", file.display());
            }
        }
    }

    Ok(())
}

/// Config file (explicit or discovered) with command-line flags applied on top.
fn resolve_config(cli: &Cli) -> Result<BundleConfig, Box<dyn std::error::Error>> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => config::discover(&std::env::current_dir()?),
    };
    let mut config = config::load_config(path.as_deref())?;
    apply_flags(cli, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_flags(cli: &Cli, config: &mut BundleConfig) {
    if let Some(dir) = &cli.resource_dir {
        config.resource_dir = dir.clone();
    }
    if let Some(dir) = &cli.bundle_path {
        config.bundle_path = dir.clone();
    }
    if cli.recursive {
        config.recursive = true;
    }
    if cli.no_recursive {
        config.recursive = false;
    }
    config.ignore.extend(cli.ignore.iter().cloned());
    if cli.no_docs {
        config.include_docs = false;
    }
    if let Some(package) = &cli.package {
        config.package = Some(package.clone());
    }
    if let Some(level) = cli.level {
        config.compression_level = level;
    }
}

fn embedder(config: &BundleConfig, quiet: bool) -> Result<Embedder, Box<dyn std::error::Error>> {
    let embedder = Embedder::from_config(config)?;
    Ok(if quiet {
        embedder
    } else {
        embedder.with_sink(WriterSink::stdout())
    })
}

fn prepare(config: &BundleConfig, quiet: bool) -> Result<Archive, Box<dyn std::error::Error>> {
    Ok(embedder(config, quiet)?.prepare()?)
}
