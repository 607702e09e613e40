//! Menu extraction CLI - command-line interface for the menu extraction
//! pipeline.
//!
//! # Architecture
//!
//! The CLI is built using `clap` and provides three commands:
//! - `extract`: extract a structured menu payload from a single input
//! - `batch`: process multiple inputs independently
//! - `debug-rotation`: run extraction and print the per-page/column rotation
//!   scores that fed orientation normalisation
//!
//! # Configuration
//!
//! Pipeline configuration is read from TOML, YAML, or JSON:
//! - Explicit: `--config path/to/menu-extract.toml`
//! - Auto-discovery: searches for `menu-extract.{toml,yaml,yml,json}` in the
//!   current and parent directories
//!
//! # Examples
//!
//! ```bash
//! # Extract a menu from a single scanned page
//! menu-extract extract page1.png
//!
//! # Extract from a directory of pages, sorted by filename
//! menu-extract extract menu-pages/ --format json
//!
//! # Parse already-OCR'd plain text with no geometry
//! menu-extract extract menu.txt --text-only
//! ```

#![deny(unsafe_code)]

mod commands;
mod ocr_engine;
mod rasteriser;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{batch_command, extract_command, load_config};

/// Menu extraction command-line interface
#[derive(Parser)]
#[command(name = "menu-extract")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a structured menu payload from a single input
    Extract {
        /// Path to an image file, a directory of page images, or (with
        /// `--text-only`) a plain-text file
        path: PathBuf,

        /// Path to config file (TOML, YAML, or JSON). If not specified,
        /// searches for menu-extract.toml/yaml/yml/json in current and
        /// parent directories.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parse already-OCR'd plain text instead of running the image
        /// pipeline
        #[arg(long)]
        text_only: bool,

        /// Output format (text or json)
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Extract a structured menu payload from several inputs independently
    Batch {
        /// Paths to process (each is an image, a directory of pages, or,
        /// with `--text-only`, a plain-text file)
        paths: Vec<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        text_only: bool,

        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Run extraction and print the per-page/column rotation scores that
    /// fed orientation normalisation
    DebugRotation {
        /// Path to an image file or a directory of page images
        path: PathBuf,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'text' or 'json'", s)),
        }
    }
}

/// Validates that a file or directory exists and is accessible.
///
/// # Errors
///
/// Returns an error if the path does not exist.
fn validate_path_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(
            "Path not found: '{}'. Please check that the file or directory exists and is accessible.",
            path.display()
        );
    }
    Ok(())
}

/// Validates batch extraction paths for correctness.
///
/// # Errors
///
/// Returns an error if the paths array is empty, or any path does not exist.
fn validate_batch_paths(paths: &[PathBuf]) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No inputs provided for batch extraction. Please provide at least one path.");
    }
    for (i, path) in paths.iter().enumerate() {
        validate_path_exists(path).with_context(|| format!("Invalid input at position {}", i + 1))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { path, config, text_only, format } => {
            validate_path_exists(&path)?;
            let config = load_config(config)?;
            tracing::info!(path = %path.display(), text_only, "extracting menu");
            extract_command(path, text_only, config, format)?;
        }

        Commands::Batch { paths, config, text_only, format } => {
            validate_batch_paths(&paths)?;
            let config = load_config(config)?;
            tracing::info!(count = paths.len(), text_only, "batch extracting menus");
            batch_command(paths, text_only, config, format)?;
        }

        Commands::DebugRotation { path, config } => {
            validate_path_exists(&path)?;
            let config = load_config(config)?;
            let rasteriser = rasteriser::ImageFileRasteriser;
            let ocr = ocr_engine::TesseractOcrEngine::default();
            let path_str = path.to_string_lossy();
            let payload = menu_extract::extract(path_str.as_bytes(), &rasteriser, &ocr, None, &config)
                .with_context(|| format!("Failed to extract menu from '{}'", path.display()))?;
            let scores = payload.meta.map(|m| m.rotation_scores).unwrap_or_default();
            println!(
                "{}",
                serde_json::to_string_pretty(&scores).context("Failed to serialize rotation scores to JSON")?
            );
        }

        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
