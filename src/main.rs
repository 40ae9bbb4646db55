//! Stax CLI - Command-line tool for stacked-file archives.
//!
//! This is the main entry point for the stax command-line application.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};

use stax::archive::walk_sources;
use stax::prelude::*;

/// Stax - stacked-file archive tool
#[derive(Parser)]
#[command(name = "stax")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log every processed file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new archive from a file or directory
    #[command(alias = "c")]
    Create(WriteArgs),

    /// Append a file or directory to an existing archive
    #[command(alias = "a")]
    Append(WriteArgs),

    /// Extract files from an archive
    #[command(alias = "e")]
    Extract {
        /// Path to the archive
        #[arg(short, long, env = "STAX_ARCHIVE")]
        file: PathBuf,

        /// Output directory
        #[arg(short, long)]
        source: PathBuf,

        /// Only extract these entries
        #[arg(short, long, num_args = 1..)]
        limit: Vec<String>,

        /// Filter pattern (glob-style)
        #[arg(long)]
        filter: Option<String>,

        /// Skip signature and CRC32 checks
        #[arg(short = 'c', long)]
        no_checks: bool,

        /// Skip entries that fail instead of aborting
        #[arg(short, long)]
        ignore_errors: bool,
    },

    /// List contents of an archive
    #[command(alias = "l")]
    List {
        /// Path to the archive
        #[arg(short, long, env = "STAX_ARCHIVE")]
        file: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(long)]
        filter: Option<String>,

        /// Show size, CRC32 and offset of every entry
        #[arg(short, long)]
        detailed: bool,

        /// Print names only
        #[arg(short, long, conflicts_with_all = ["detailed", "json"])]
        names: bool,

        /// Print JSON
        #[arg(long)]
        json: bool,

        /// Skip signature checks
        #[arg(short = 'c', long)]
        no_checks: bool,
    },

    /// Read every entry and verify its CRC32
    #[command(alias = "v")]
    Validate {
        /// Path to the archive
        #[arg(short, long, env = "STAX_ARCHIVE")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct WriteArgs {
    /// Path to the archive
    #[arg(short, long, env = "STAX_ARCHIVE")]
    file: PathBuf,

    /// File or directory to add
    #[arg(short, long)]
    source: PathBuf,

    /// Width of the data-size field: 16, 32 or 64 (new archives only)
    #[arg(long, default_value = "64")]
    size_mode: SizeMode,

    /// General-purpose number stored in the signature
    #[arg(short = 'g', long)]
    general_purpose: Option<u32>,

    /// Store file names only, without their directories
    #[arg(short, long)]
    names: bool,

    /// Don't store CRC32 checksums (new archives only)
    #[arg(short = 'r', long)]
    no_crc: bool,

    /// Skip files that fail instead of aborting
    #[arg(short, long)]
    ignore_errors: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Create(args) => {
            cmd_write(&args, OpenMode::Create, cli.verbose)?;
        }
        Commands::Append(args) => {
            cmd_write(&args, OpenMode::Append, cli.verbose)?;
        }
        Commands::Extract {
            file,
            source,
            limit,
            filter,
            no_checks,
            ignore_errors,
        } => {
            let options = ArchiveOptions::default()
                .verbose(cli.verbose)
                .disable_checks(no_checks)
                .ignore_errors(ignore_errors);
            cmd_extract(&file, &source, &limit, filter.as_deref(), options)?;
        }
        Commands::List {
            file,
            filter,
            detailed,
            names,
            json,
            no_checks,
        } => {
            let format = if json {
                ListFormat::Json
            } else if names {
                ListFormat::Names
            } else if detailed {
                ListFormat::Detailed
            } else {
                ListFormat::Plain
            };
            cmd_list(&file, filter.as_deref(), format, no_checks)?;
        }
        Commands::Validate { file } => {
            cmd_validate(&file, cli.verbose)?;
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `info` with `--verbose` and `warn` without.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn progress_bar(len: u64, verbose: bool) -> Result<ProgressBar> {
    // Verbose runs log every file, which would tear the bar apart.
    if verbose {
        return Ok(ProgressBar::hidden());
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn parse_filter(filter: Option<&str>) -> Result<Option<Pattern>> {
    filter
        .map(|f| Pattern::new(f).with_context(|| format!("Invalid filter pattern: {f}")))
        .transpose()
}

fn print_failures(failed: &[(String, Error)]) {
    for (name, err) in failed {
        eprintln!("  skipped {name}: {err}");
    }
}

fn cmd_write(args: &WriteArgs, mode: OpenMode, verbose: bool) -> Result<()> {
    let options = ArchiveOptions::default()
        .verbose(verbose)
        .only_names(args.names)
        .ignore_errors(args.ignore_errors)
        .write_crc(!args.no_crc);

    let mut sources = walk_sources(&args.source, args.names)
        .with_context(|| format!("Failed to read {}", args.source.display()))?;

    let mut archive = Archive::open(&args.file, mode, args.size_mode, options)
        .with_context(|| format!("Failed to open archive {}", args.file.display()))?;

    // The archive may live inside the tree being added.
    if let Ok(archive_path) = fs::canonicalize(&args.file) {
        sources.retain(|s| fs::canonicalize(&s.path).map_or(true, |p| p != archive_path));
    }

    if let Some(value) = args.general_purpose {
        archive.set_general_purpose(value)?;
    }

    println!(
        "Adding {} files to {} ({}, CRC32 {})",
        sources.len(),
        args.file.display(),
        archive.size_mode(),
        if archive.crc_enabled() { "on" } else { "off" }
    );

    let pb = progress_bar(sources.len() as u64, verbose)?;
    let start = Instant::now();
    let report = archive
        .add_sources(&sources, |_| pb.inc(1))
        .context("Failed to add files")?;
    pb.finish_with_message("Done");

    archive.sync_all().context("Failed to write archive to disk")?;
    archive.close().context("Failed to close archive")?;

    println!(
        "Added {} files in {:?} ({} skipped)",
        report.succeeded.len(),
        start.elapsed(),
        report.failed.len()
    );
    print_failures(&report.failed);

    Ok(())
}

fn cmd_extract(
    archive_path: &Path,
    output: &Path,
    limit: &[String],
    filter: Option<&str>,
    options: ArchiveOptions,
) -> Result<()> {
    println!("Opening archive: {}", archive_path.display());

    let start = Instant::now();
    let mut archive = Archive::open(archive_path, OpenMode::Read, SizeMode::default(), options)
        .context("Failed to open archive")?;

    println!("Loaded {} entries in {:?}", archive.file_count(), start.elapsed());

    let pattern = parse_filter(filter)?;
    let mut entries: Vec<FileInfo> = if limit.is_empty() {
        archive.file_infos()?.to_vec()
    } else {
        limit
            .iter()
            .map(|name| archive.file_info(name).cloned())
            .collect::<stax::archive::Result<_>>()?
    };
    if let Some(pattern) = &pattern {
        entries.retain(|e| pattern.matches(e.name()));
    }

    println!("Extracting {} entries...", entries.len());

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let pb = progress_bar(entries.len() as u64, options.verbose)?;
    let start = Instant::now();
    let report = archive.extract_with(output, Some(&entries), |_| pb.inc(1))?;
    pb.finish_with_message("Done");

    println!(
        "Extracted {} entries in {:?} ({} skipped)",
        report.succeeded.len(),
        start.elapsed(),
        report.failed.len()
    );
    print_failures(&report.failed);

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListFormat {
    Plain,
    Detailed,
    Names,
    Json,
}

fn cmd_list(archive_path: &Path, filter: Option<&str>, format: ListFormat, no_checks: bool) -> Result<()> {
    let archive = Archive::open_read(archive_path, ArchiveOptions::default().disable_checks(no_checks))
        .context("Failed to open archive")?;

    let pattern = parse_filter(filter)?;
    let entries: Vec<&FileInfo> = archive
        .file_infos()?
        .iter()
        .filter(|e| pattern.as_ref().map_or(true, |p| p.matches(e.name())))
        .collect();

    match format {
        ListFormat::Json => {
            let summary = serde_json::json!({
                "size_mode": archive.size_mode(),
                "general_purpose": archive.general_purpose(),
                "crc_enabled": archive.crc_enabled(),
                "file_count": archive.file_count(),
                "max_file_size": archive.max_file_size(),
                "entries": entries,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ListFormat::Names => {
            for entry in &entries {
                println!("{}", entry.name());
            }
        }
        ListFormat::Plain | ListFormat::Detailed => {
            println!("Size mode:       {}", archive.size_mode());
            println!("General purpose: {}", archive.general_purpose());
            println!("CRC32:           {}", if archive.crc_enabled() { "yes" } else { "no" });
            println!("Files:           {}", archive.file_count());
            println!("Max file size:   {}", archive.max_file_size());
            println!();

            for entry in &entries {
                if format == ListFormat::Detailed {
                    println!(
                        "{:>12} {:08x} {:>12} {}",
                        entry.size(),
                        entry.crc32(),
                        entry.offset(),
                        entry.name()
                    );
                } else {
                    println!("{}", entry.name());
                }
            }

            println!("\nTotal: {} entries", entries.len());
        }
    }

    Ok(())
}

fn cmd_validate(archive_path: &Path, verbose: bool) -> Result<()> {
    println!("Validating archive: {}", archive_path.display());

    let mut archive = Archive::open_read(archive_path, ArchiveOptions::default().verbose(verbose))
        .context("Failed to open archive")?;

    if !archive.crc_enabled() {
        println!("Archive stores no CRC32 checksums, checking structure only");
    }

    let entries = archive.file_infos()?.to_vec();
    let pb = progress_bar(entries.len() as u64, verbose)?;
    let start = Instant::now();
    let mut failures = 0usize;

    for info in &entries {
        if let Err(err) = archive.read_into(info, &mut io::sink()) {
            pb.suspend(|| eprintln!("FAILED {}: {}", info.name(), err));
            failures += 1;
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    if failures > 0 {
        bail!("{} of {} entries failed validation", failures, entries.len());
    }

    println!("All {} entries OK in {:?}", entries.len(), start.elapsed());
    Ok(())
}
