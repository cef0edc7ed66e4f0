//! Main entry point for the seekbuf CLI application.
//!
//! Lists or extracts a ZIP archive in a single forward pass over stdin, a
//! local file or an HTTP body.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncRead;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use seekbuf::{AsyncSeekBufferStream, Cli, Source, ZipExtractor, ZipFileEntry, open_source};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let Source {
        reader,
        transferred,
    } = open_source(&cli.source).await?;
    let stream = AsyncSeekBufferStream::with_capacity(reader, cli.buffer_size)
        .context("invalid --buffer-size")?;
    debug!(capacity = stream.capacity(), "seek buffer ready");

    let mut extractor = ZipExtractor::new(stream);
    if cli.is_listing() {
        list_files(&mut extractor, cli.verbose).await?;
    } else {
        extract_files(&mut extractor, &cli).await?;
    }

    // network statistics for HTTP sources
    if let Some(transferred) = transferred {
        if !cli.is_quiet() {
            eprintln!("\nTotal bytes transferred: {}", format_size(transferred.get()));
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Prints entries as they are walked; sizes are final once each one is skipped.
async fn list_files<R: AsyncRead + Unpin>(extractor: &mut ZipExtractor<R>, verbose: bool) -> Result<()> {
    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    while let Some(mut entry) = extractor.next_entry().await? {
        extractor.skip(&mut entry).await?;

        if !verbose {
            println!("{}", entry.file_name);
            continue;
        }

        let (year, month, day) = entry.mod_date();
        let (hour, minute, _) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {:>4}%  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            entry.savings_percent(),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    if verbose {
        println!("{}", "-".repeat(70));
        println!(
            "{:>10}  {:>10}  {:>4}%  {:>17}  {} files",
            total_uncompressed,
            total_compressed,
            seekbuf::zip::savings_percent(total_compressed, total_uncompressed),
            "",
            file_count
        );
    }

    Ok(())
}

async fn extract_files<R: AsyncRead + Unpin>(extractor: &mut ZipExtractor<R>, cli: &Cli) -> Result<()> {
    let mut extracted = 0usize;

    while let Some(mut entry) = extractor.next_entry().await? {
        let wanted = cli.selects(&entry.file_name) && !(cli.pipe && entry.is_directory);
        if !wanted {
            extractor.skip(&mut entry).await?;
            continue;
        }

        extract_file(extractor, &mut entry, cli, extracted > 0).await?;
        extracted += 1;
    }

    if extracted == 0 && !cli.files.is_empty() && !cli.is_very_quiet() {
        eprintln!("caution: filename not matched: {}", cli.files.join(" "));
    }
    Ok(())
}

async fn extract_file<R: AsyncRead + Unpin>(
    extractor: &mut ZipExtractor<R>,
    entry: &mut ZipFileEntry,
    cli: &Cli,
    after_another: bool,
) -> Result<()> {
    if cli.pipe {
        // mark where each file starts once there is more than one
        if after_another || cli.files.len() != 1 {
            use tokio::io::AsyncWriteExt;
            tokio::io::stdout()
                .write_all(format!("--- {} ---\n", entry.file_name).as_bytes())
                .await?;
        }
        return extractor.extract_to_stdout(entry).await;
    }

    let Some(output_path) = cli.output_path(&entry.file_name) else {
        warn!(name = %entry.file_name, "unsafe entry name, skipping");
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {} (unsafe path)", entry.file_name);
        }
        return extractor.skip(entry).await;
    };

    // -o overwrites silently, -n and the default both keep the existing file
    let keep_existing = cli.never_overwrite || !cli.overwrite;
    if keep_existing && !entry.is_directory && output_path.exists() {
        if !cli.is_quiet() {
            let hint = if cli.never_overwrite {
                "file exists"
            } else {
                "use -o to overwrite"
            };
            eprintln!("Skipping: {} ({hint})", entry.file_name);
        }
        return extractor.skip(entry).await;
    }

    if !cli.is_quiet() {
        let action = if entry.is_directory { "creating" } else { "extracting" };
        println!("{action:>12}: {}", output_path.display());
    }
    extractor.extract_to_file(entry, &output_path).await
}

fn format_size(size: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if size < 1024 {
        return format!("{size} bytes");
    }
    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
