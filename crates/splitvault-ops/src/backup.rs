//! Backup: archiver -> encryptor -> splitter

use crate::chunks::{split_pattern, ChunkSet};
use crate::config::ToolConfig;
use crate::manifest::ChunkManifest;
use splitvault_core::{Error, Result, StageSpec};
use splitvault_pipeline::report::format_bytes;
use splitvault_pipeline::{CancellationToken, ChainBuilder, PipelineReport, PipelineRunner};
use std::path::{Path, PathBuf};

/// Default maximum chunk size in bytes
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000_000_000;

/// What to back up and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRequest {
    /// Directory to archive
    pub source: PathBuf,
    /// Chunk path prefix, e.g. `/backups/home.tar.gz.gpg-`
    pub target_pattern: PathBuf,
    /// Maximum bytes per chunk
    pub chunk_size: u64,
}

impl BackupRequest {
    /// Create a request with the default chunk size
    pub fn new(source: impl Into<PathBuf>, target_pattern: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target_pattern: target_pattern.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the maximum chunk size
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Result of a successful backup
#[derive(Debug)]
pub struct BackupSummary {
    /// Chunks written, in restore order
    pub chunks: ChunkSet,
    /// Manifest path, when one was written
    pub manifest: Option<PathBuf>,
    /// Pipeline transfer report
    pub report: PipelineReport,
}

/// Archiver stage: the contents of `source`, relative to it, as tar.gz
pub fn archive_stage(config: &ToolConfig, source: &Path) -> StageSpec {
    StageSpec::new(&config.archiver)
        .args(["-czf", "-", "-C"])
        .arg(source)
        .arg(".")
}

/// Splitter stage: numbered chunks of at most `chunk_size` bytes
///
/// No `-a`: split then widens the suffix as needed instead of running out.
pub fn split_stage(config: &ToolConfig, chunk_size: u64, target_pattern: &Path) -> StageSpec {
    StageSpec::new(&config.splitter)
        .arg("-b")
        .arg(chunk_size.to_string())
        .args(["-d", "-"])
        .arg(target_pattern)
}

/// The three stages of a backup chain
pub fn backup_stages(request: &BackupRequest, config: &ToolConfig) -> Vec<StageSpec> {
    vec![
        archive_stage(config, &request.source),
        config.cipher.encrypt_stage(),
        split_stage(config, request.chunk_size, &request.target_pattern),
    ]
}

/// Archive, encrypt and split `request.source` into chunk files
///
/// # Errors
///
/// Fails before launching anything if chunks with the target prefix already
/// exist. Fails with the pipeline's error if any stage or link fails; chunks
/// written so far are left on disk and no manifest is written.
pub async fn backup(
    request: &BackupRequest,
    config: &ToolConfig,
    cancel: CancellationToken,
) -> Result<BackupSummary> {
    config.validate()?;
    if request.chunk_size == 0 {
        return Err(Error::validation("chunk size must be at least 1 byte"));
    }

    let existing = ChunkSet::for_prefix(&request.target_pattern)?;
    if !existing.is_empty() {
        return Err(Error::validation(format!(
            "{} chunk files with prefix {} already exist in {}",
            existing.len(),
            existing.prefix(),
            existing.dir().display()
        )));
    }

    if !config.cipher.is_encrypted() {
        tracing::warn!("Cipher is passthrough: chunks will not be encrypted");
    }

    let (dir, prefix) = split_pattern(&request.target_pattern)?;
    tracing::info!(
        "Backing up {} to {} ({}* in chunks of {} bytes)",
        request.source.display(),
        dir.display(),
        prefix,
        request.chunk_size
    );

    let builder = backup_stages(request, config)
        .into_iter()
        .fold(ChainBuilder::new(), |builder, spec| builder.process(spec))
        .buffer_size(config.buffer_size)
        .cancellation(cancel);

    let report = PipelineRunner::execute(builder).await.map_err(|e| {
        tracing::error!(
            "Backup failed; chunks written so far are left in {} and are not a usable backup",
            dir.display()
        );
        e
    })?;

    let chunks = ChunkSet::for_prefix(&request.target_pattern)?;
    chunks.check_sequence()?;
    check_chunk_sizes(&chunks, request.chunk_size, report.bytes_delivered())?;

    let manifest = if config.write_manifest {
        let manifest =
            ChunkManifest::build(&chunks, request.chunk_size, config.cipher.is_encrypted()).await?;
        Some(manifest.save(&chunks)?)
    } else {
        None
    };

    tracing::info!(
        "Backup complete: {} chunks, {}",
        chunks.len(),
        format_bytes(report.bytes_delivered())
    );

    Ok(BackupSummary {
        chunks,
        manifest,
        report,
    })
}

/// Every chunk fits the limit and together they hold every delivered byte
fn check_chunk_sizes(chunks: &ChunkSet, chunk_size: u64, delivered: u64) -> Result<()> {
    let sizes = chunks.sizes()?;

    for (name, size) in chunks.file_names().iter().zip(&sizes) {
        if *size > chunk_size {
            return Err(Error::chunk_set(format!(
                "chunk {} is {} bytes, above the {} byte limit",
                name, size, chunk_size
            )));
        }
    }

    let total: u64 = sizes.iter().sum();
    if total != delivered {
        return Err(Error::chunk_set(format!(
            "chunks hold {} bytes but the splitter received {}",
            total, delivered
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::expected_chunk_count;
    use crate::test_support::{noise, passthrough};

    #[test]
    fn test_backup_stage_arguments() {
        let request = BackupRequest::new("/home/user", "/backups/home.tar.gz.gpg-")
            .with_chunk_size(1_000_000);
        let stages = backup_stages(&request, &ToolConfig::default());

        assert_eq!(stages[0].command_line(), "tar -czf - -C /home/user .");
        assert_eq!(stages[1].command_line(), "gpg --cipher-algo AES256 --symmetric -");
        assert_eq!(
            stages[2].command_line(),
            "split -b 1000000 -d - /backups/home.tar.gz.gpg-"
        );
        assert_eq!(BackupRequest::new("a", "b").chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[tokio::test]
    async fn test_split_chunk_count_and_concatenation() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("stream.bin");
        let out = dir.path().join("chunks");
        std::fs::create_dir(&out).unwrap();

        let data = noise(250_001, 7);
        std::fs::write(&input, &data).unwrap();

        let config = passthrough();
        let size = 50_000;

        PipelineRunner::execute(
            ChainBuilder::new()
                .process(StageSpec::new("cat").arg(&input))
                .process(config.cipher.encrypt_stage())
                .process(split_stage(&config, size, &out.join("s-"))),
        )
        .await
        .unwrap();

        let chunks = ChunkSet::discover(&out).unwrap();
        assert_eq!(
            chunks.len() as u64,
            expected_chunk_count(data.len() as u64, size)
        );
        assert_eq!(chunks.len(), 6);
        assert!(chunks.sizes().unwrap().iter().all(|s| *s <= size));

        let mut joined = Vec::new();
        for path in chunks.paths() {
            joined.extend(std::fs::read(path).unwrap());
        }
        assert_eq!(joined, data);
    }

    #[tokio::test]
    async fn test_backup_writes_chunks_and_manifest() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.bin"), noise(3_500_000, 11)).unwrap();

        let request = BackupRequest::new(source.path(), target.path().join("set-"))
            .with_chunk_size(1_000_000);
        let summary = backup(&request, &passthrough(), CancellationToken::new())
            .await
            .unwrap();

        let sizes = summary.chunks.sizes().unwrap();
        assert_eq!(
            summary.chunks.file_names(),
            vec!["set-00", "set-01", "set-02", "set-03"]
        );
        assert_eq!(&sizes[..3], &[1_000_000, 1_000_000, 1_000_000]);
        assert!(sizes[3] > 400_000 && sizes[3] < 1_000_000);
        assert_eq!(sizes.iter().sum::<u64>(), summary.report.bytes_delivered());

        let manifest_path = summary.manifest.unwrap();
        assert_eq!(manifest_path, target.path().join(".set-manifest.json"));
        let manifest = ChunkManifest::load(&manifest_path).unwrap();
        assert!(!manifest.encrypted);
        assert_eq!(manifest.chunk_size, 1_000_000);
        manifest.verify(&summary.chunks).await.unwrap();
    }

    #[tokio::test]
    async fn test_backup_refuses_existing_chunks() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        std::fs::write(target.path().join("set-00"), b"stale").unwrap();

        let request = BackupRequest::new(source.path(), target.path().join("set-"));
        let err = backup(&request, &passthrough(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(std::fs::read(target.path().join("set-00")).unwrap(), b"stale");
    }

    #[tokio::test]
    async fn test_backup_of_missing_source_fails() {
        let target = tempfile::tempdir().unwrap();
        let request =
            BackupRequest::new("/nonexistent/splitvault/source", target.path().join("set-"))
                .with_chunk_size(1000);

        match backup(&request, &passthrough(), CancellationToken::new()).await {
            Err(Error::Pipeline {
                stage_index,
                stage,
                status,
            }) => {
                assert_eq!(stage_index, 0);
                assert_eq!(stage, "tar");
                assert!(!status.is_success());
            }
            other => panic!(
                "expected archiver failure, got {:?}",
                other.map(|s| s.chunks.len())
            ),
        }

        assert!(!target.path().join(".set-manifest.json").exists());
    }

    #[tokio::test]
    async fn test_backup_rejects_zero_chunk_size() {
        let source = tempfile::tempdir().unwrap();
        let request =
            BackupRequest::new(source.path(), source.path().join("x-")).with_chunk_size(0);

        let err = backup(&request, &passthrough(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
