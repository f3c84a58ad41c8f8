//! Restore: concatenator -> decryptor -> extractor

use crate::chunks::ChunkSet;
use crate::config::ToolConfig;
use crate::manifest::ChunkManifest;
use splitvault_core::{Error, Result, StageSpec};
use splitvault_pipeline::report::format_bytes;
use splitvault_pipeline::{CancellationToken, ChainBuilder, PipelineReport, PipelineRunner};
use std::path::{Path, PathBuf};

/// Where the chunks are and where to unpack them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Directory holding exactly one chunk set
    pub source: PathBuf,
    /// Directory the archive is extracted into
    pub target: PathBuf,
}

impl RestoreRequest {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Result of a successful restore
#[derive(Debug)]
pub struct RestoreSummary {
    /// Chunks consumed, in order
    pub chunks: ChunkSet,
    /// Whether a manifest was found and matched
    pub verified: bool,
    /// Pipeline transfer report
    pub report: PipelineReport,
}

/// Concatenator stage reading the chunks in order
///
/// Runs inside the chunk directory with bare file names to keep the argument
/// list short for large sets.
pub fn concat_stage(config: &ToolConfig, chunks: &ChunkSet) -> StageSpec {
    StageSpec::new(&config.concatenator)
        .arg("--")
        .args(chunks.file_names())
        .current_dir(chunks.dir())
}

/// Extractor stage unpacking a tar.gz stream into `target`
pub fn extract_stage(config: &ToolConfig, target: &Path) -> StageSpec {
    StageSpec::new(&config.archiver)
        .args(["-xzf", "-", "-C"])
        .arg(target)
}

/// The three stages of a restore chain
pub fn restore_stages(chunks: &ChunkSet, target: &Path, config: &ToolConfig) -> Vec<StageSpec> {
    vec![
        concat_stage(config, chunks),
        config.cipher.decrypt_stage(),
        extract_stage(config, target),
    ]
}

/// Concatenate, decrypt and extract the chunk set in `request.source`
///
/// # Errors
///
/// Chunk discovery and manifest verification errors are returned before any
/// process is launched. Afterwards the pipeline's error is returned as is;
/// files extracted so far are left in the target.
pub async fn restore(
    request: &RestoreRequest,
    config: &ToolConfig,
    cancel: CancellationToken,
) -> Result<RestoreSummary> {
    config.validate()?;

    let chunks = ChunkSet::discover(&request.source)?;
    tracing::info!(
        "Restoring {} chunks ({}*) from {} to {}",
        chunks.len(),
        chunks.prefix(),
        request.source.display(),
        request.target.display()
    );

    let verified = match ChunkManifest::find(&chunks)? {
        Some(manifest) => {
            if manifest.encrypted != config.cipher.is_encrypted() {
                return Err(Error::validation(format!(
                    "chunks were written {} but the cipher is configured {}",
                    if manifest.encrypted { "encrypted" } else { "unencrypted" },
                    if config.cipher.is_encrypted() { "to decrypt" } else { "as passthrough" }
                )));
            }
            manifest.verify(&chunks).await?;
            tracing::info!("All {} chunks match the manifest", chunks.len());
            true
        }
        None => {
            tracing::warn!(
                "No manifest for {} in {}; chunks are not verified before extraction",
                chunks.prefix(),
                chunks.dir().display()
            );
            false
        }
    };

    let builder = restore_stages(&chunks, &request.target, config)
        .into_iter()
        .fold(ChainBuilder::new(), |builder, spec| builder.process(spec))
        .buffer_size(config.buffer_size)
        .cancellation(cancel);

    let report = PipelineRunner::execute(builder).await.map_err(|e| {
        tracing::error!(
            "Restore failed; {} may hold a partial tree",
            request.target.display()
        );
        e
    })?;

    tracing::info!(
        "Restore complete: {} read from {} chunks",
        format_bytes(report.bytes_delivered()),
        chunks.len()
    );

    Ok(RestoreSummary {
        chunks,
        verified,
        report,
    })
}
