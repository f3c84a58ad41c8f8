//! SplitVault CLI - encrypted, chunked directory backups
//!
//! Backs up a directory as `tar | gpg | split` and restores it as
//! `cat | gpg | tar`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use splitvault_ops::{
    backup, restore, validate_backup_paths, validate_restore_paths, BackupRequest, RestoreRequest,
    ToolConfig, DEFAULT_CHUNK_SIZE,
};
use splitvault_pipeline::report::{format_bytes, format_duration};
use splitvault_pipeline::{CancellationToken, PipelineReport};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "splitvault")]
#[command(about = "Encrypted, chunked directory backup and restore")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Tool configuration file (JSON)
    #[arg(long, global = true, env = "SPLITVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// File holding the gpg passphrase; gpg prompts when unset
    #[arg(long, global = true, env = "SPLITVAULT_PASSPHRASE_FILE")]
    passphrase_file: Option<PathBuf>,

    /// Link transfer block size in bytes
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    buffer_size: Option<u64>,

    /// Log level
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive, encrypt and split a directory into chunk files
    Backup {
        /// Directory to back up
        #[arg(short, long)]
        source: PathBuf,

        /// Chunk path prefix, e.g. /backups/home.tar.gz.gpg-
        #[arg(short, long)]
        target: PathBuf,

        /// Maximum chunk size in bytes
        #[arg(short = 'z', long, default_value_t = DEFAULT_CHUNK_SIZE,
              value_parser = clap::value_parser!(u64).range(1..))]
        chunk_size: u64,

        /// Do not write a digest manifest beside the chunks
        #[arg(long)]
        no_manifest: bool,
    },

    /// Concatenate, decrypt and extract a chunk set
    Restore {
        /// Directory holding the chunks
        #[arg(short, long)]
        source: PathBuf,

        /// Directory to extract into
        #[arg(short, long)]
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping pipeline");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Command::Backup {
            source,
            target,
            chunk_size,
            no_manifest,
        } => {
            validate_backup_paths(&source, &target)?;
            let config = ToolConfig {
                write_manifest: config.write_manifest && !no_manifest,
                ..config
            };
            let request = BackupRequest::new(source, target).with_chunk_size(chunk_size);
            let summary = backup(&request, &config, cancel)
                .await
                .context("backup failed")?;

            println!("=== Backup complete ===");
            println!("Source:   {}", request.source.display());
            println!("Chunks:   {}", summary.chunks.len());
            for name in summary.chunks.file_names() {
                println!("  {}", name);
            }
            if let Some(manifest) = &summary.manifest {
                println!("Manifest: {}", manifest.display());
            }
            print_report(&summary.report);
        }

        Command::Restore { source, target } => {
            validate_restore_paths(&source, &target)?;
            let request = RestoreRequest::new(source, target);
            let summary = restore(&request, &config, cancel)
                .await
                .context("restore failed")?;

            println!("=== Restore complete ===");
            println!("Target:   {}", request.target.display());
            println!("Chunks:   {}", summary.chunks.len());
            println!(
                "Verified: {}",
                if summary.verified { "yes" } else { "no manifest" }
            );
            print_report(&summary.report);
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<ToolConfig> {
    let mut config = match &cli.config {
        Some(path) => ToolConfig::load(path)?,
        None => ToolConfig::default(),
    };

    if let Some(file) = &cli.passphrase_file {
        config = config.with_passphrase_file(file);
    }
    if let Some(size) = cli.buffer_size {
        config.buffer_size = usize::try_from(size).context("buffer size too large")?;
    }

    config.validate()?;
    Ok(config)
}

fn print_report(report: &PipelineReport) {
    println!("Elapsed:  {}", format_duration(report.elapsed));
    for link in &report.links {
        println!("  {}", link.format());
    }
    println!("Total:    {}", format_bytes(report.bytes_delivered()));
}
