//! # vde-build
//!
//! Builds a vBulletin product from an extension project directory.
//!
//! The project directory holds a `config.toml` plus one subdirectory per
//! content type (`updown/`, `templates/`, `plugins/`, `cron/`, `options/`,
//! `phrases/`). A build writes `product-<id>.xml` into the build path and
//! mirrors the project's upload files into `<buildpath>/upload`.
//!
//! ## Usage
//!
//! ```bash
//! # Build the project in the current directory
//! vde-build
//!
//! # Build another project into a custom directory
//! vde-build path/to/project --build-path /tmp/out
//!
//! # Machine-readable report
//! vde-build --json
//! ```

mod cli;

use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use humansize::{DECIMAL, format_size};
use tracing_subscriber::EnvFilter;
use vde_builder::{Builder, ProjectLoader};

/// Entry point for the vde-build application.
///
/// Errors from [`inner_main`] are printed to stderr before exiting with a
/// non-zero status code.
fn main() {
    if let Err(err) = inner_main() {
        eprintln!("{} {err:#}", "Error:".red());

        exit(1);
    }
}

/// Main application logic that can return errors.
///
/// 1. Parses command-line arguments and sets up logging
/// 2. Loads the project from the given directory
/// 3. Applies command-line overrides
/// 4. Builds the descriptor and upload tree
/// 5. Prints the build log, or a JSON report with `--json`
///
/// # Errors
///
/// Any project loading, build or serialization error.
fn inner_main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose)?;

    let mut project = ProjectLoader::load(&args.dir)?;

    let mut options = args.build_options();
    if let Some(build_path) = &options.build_path {
        let absolute = std::path::absolute(build_path)
            .with_context(|| format!("Invalid build path {}", build_path.display()))?;
        options.build_path = Some(absolute);
    }
    options.apply(&mut project);

    if !args.json() {
        println!("{} {project}", "Building".bold());
    }

    let report = Builder::new(&project).build()?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in report.log.lines() {
        println!("  {line}");
    }
    println!(
        "\n{} {}",
        "✅ Built".green(),
        format!(
            "{} ({} uploaded, {})",
            report.descriptor.display(),
            report.copied_files.len(),
            format_size(report.copied_bytes, DECIMAL)
        )
        .bright_white()
    );

    Ok(())
}

/// Route `tracing` output to stderr, honoring `RUST_LOG` when it is set.
fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "vde_builder=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    Ok(())
}
