//! Main entry point for the unhpi CLI application.
//!
//! This binary provides a command-line interface for listing and extracting
//! HPI archives from both the local filesystem and remote HTTP URLs.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use unhpi::{Cli, HpiExtractor, HpiFileEntry, HttpRangeReader, LocalFileReader, OutputAction, ReadAt};

/// Application entry point.
///
/// # Returns
///
/// `Ok(())` on success; any error is printed by the runtime and the process
/// exits non-zero.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the -q derived default
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .with_writer(std::io::stderr)
        .init();

    // Remote archives are read through HTTP Range requests
    if cli.is_http_url() {
        let reader = Arc::new(HttpRangeReader::with_options(cli.file.clone(), cli.http_options()).await?);

        process_archive(reader.clone(), &cli).await?;

        if !cli.is_quiet() {
            eprintln!("\nTotal bytes transferred: {}", format_size(reader.transferred_bytes()));
        }
    } else {
        let reader = Arc::new(
            LocalFileReader::new(Path::new(&cli.file))
                .with_context(|| format!("cannot open {}", cli.file))?,
        );
        process_archive(reader, &cli).await?;
    }

    Ok(())
}

/// Lists or extracts an archive according to the CLI options.
///
/// # Arguments
///
/// * `reader` - Archive source, local or remote
/// * `cli` - Parsed command-line options
///
/// # Returns
///
/// `Ok(())` once every selected entry is handled, or the first error met.
async fn process_archive<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let extractor = HpiExtractor::open(reader).await?;

    if cli.list || cli.verbose {
        return list_files(&extractor, cli.verbose).await;
    }

    // Compile patterns up front so a bad glob fails before anything is written
    let selection = cli.selection()?;

    let entries = extractor.list_files().await?;
    let selected: Vec<_> = entries.iter().filter(|e| selection.selects(e)).collect();

    // Piping several files needs a separator line between them
    let multiple_files = cli.pipe && selected.len() > 1;
    for entry in selected {
        extract_file(&extractor, entry, cli, multiple_files).await?;
    }

    Ok(())
}

/// Prints the archive contents, either names only or as a table.
///
/// # Arguments
///
/// * `extractor` - Opened archive
/// * `verbose` - Print sizes, chunk counts and methods instead of bare paths
async fn list_files<R: ReadAt + 'static>(extractor: &HpiExtractor<R>, verbose: bool) -> Result<()> {
    let entries = extractor.list_files().await?;

    if !verbose {
        for entry in &entries {
            println!("{}", entry.path);
        }
        return Ok(());
    }

    let header = extractor.header();
    println!(
        "Archive key: {:#04x}{}",
        header.derived_key(),
        if header.is_saved_game() { " (saved game)" } else { "" }
    );
    println!("{:>10}  {:>6}  {:>6}  Name", "Length", "Chunks", "Method");
    println!("{}", "-".repeat(50));

    let mut total = 0u64;
    for entry in &entries {
        println!(
            "{:>10}  {:>6}  {:>6}  {}",
            entry.data.file_size,
            entry.data.chunk_count(),
            entry.data.compression_method().name(),
            entry.path
        );
        total += u64::from(entry.data.file_size);
    }

    println!("{}", "-".repeat(50));
    println!("{:>10}  {:>14}  {} files", total, "", entries.len());
    Ok(())
}

/// Extracts one entry to stdout or to disk.
///
/// # Arguments
///
/// * `extractor` - Opened archive
/// * `entry` - Entry to extract
/// * `cli` - Pipe, destination, junk-path and overwrite options
/// * `show_filename` - Write a `--- path ---` separator before piped data
///
/// # Returns
///
/// `Ok(())` when the entry is written or skipped because its output exists.
async fn extract_file<R: ReadAt + 'static>(
    extractor: &HpiExtractor<R>,
    entry: &HpiFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        if show_filename {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", entry.path).as_bytes())
                .await?;
        }
        extractor.extract_to_stdout(entry).await?;
        return Ok(());
    }

    let output_path = cli.output_path(entry);

    // Check the overwrite policy before touching the file
    match cli.output_action(&output_path) {
        OutputAction::Extract => {}
        OutputAction::SkipExisting => {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.path);
            }
            return Ok(());
        }
        OutputAction::NeedsOverwrite => {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.path);
            }
            return Ok(());
        }
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.path);
    }

    extractor
        .extract_to_file(entry, &output_path)
        .await
        .with_context(|| format!("failed to extract {}", entry.path))?;

    Ok(())
}

/// Renders a byte count with a binary unit.
///
/// # Arguments
///
/// * `size` - Byte count
///
/// # Returns
///
/// `"512 bytes"` below 1 KB, otherwise two decimals and the largest unit
/// that keeps the value at or above one (`"1.50 MB"`).
fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    let mut value = size as f64;
    let mut unit = None;
    for name in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(name);
    }

    match unit {
        Some(name) => format!("{value:.2} {name}"),
        None => format!("{size} bytes"),
    }
}
