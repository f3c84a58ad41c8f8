//! Chunk manifest: sizes and digests of a completed backup
//!
//! Stored as a hidden file beside the chunks so chunk discovery skips it.

use crate::chunks::ChunkSet;
use crate::hash::hash_files;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splitvault_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Manifest format version
pub const MANIFEST_VERSION: u32 = 1;

/// One chunk as recorded at backup time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Chunk file name
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Lowercase hex SHA-256
    pub sha256: String,
}

/// Record of every chunk written by one backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
    /// Format version
    pub version: u32,
    /// When the backup finished
    pub created: DateTime<Utc>,
    /// Chunk file name prefix
    pub prefix: String,
    /// Maximum chunk size used by the splitter
    pub chunk_size: u64,
    /// Whether the chunks hold ciphertext
    pub encrypted: bool,
    /// Chunks in restore order
    pub chunks: Vec<ChunkEntry>,
}

impl ChunkManifest {
    /// Manifest file name for a chunk prefix
    pub fn file_name(prefix: &str) -> String {
        format!(".{}manifest.json", prefix)
    }

    /// Manifest path for a chunk set
    pub fn path_for(set: &ChunkSet) -> PathBuf {
        set.dir().join(Self::file_name(set.prefix()))
    }

    /// Hash every chunk of a set
    pub async fn build(set: &ChunkSet, chunk_size: u64, encrypted: bool) -> Result<Self> {
        let digests = hash_files(set.paths().to_vec()).await?;

        let chunks = set
            .file_names()
            .into_iter()
            .zip(digests)
            .map(|(name, digest)| ChunkEntry {
                name,
                size: digest.size,
                sha256: digest.sha256,
            })
            .collect();

        Ok(Self {
            version: MANIFEST_VERSION,
            created: Utc::now(),
            prefix: set.prefix().to_string(),
            chunk_size,
            encrypted,
            chunks,
        })
    }

    /// Write the manifest beside the chunks
    pub fn save(&self, set: &ChunkSet) -> Result<PathBuf> {
        let path = Self::path_for(set);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::invalid_operation(format!("cannot encode manifest: {}", e)))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// Read a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&content).map_err(|e| {
            Error::chunk_set(format!("unreadable manifest {}: {}", path.display(), e))
        })?;

        if manifest.version != MANIFEST_VERSION {
            return Err(Error::chunk_set(format!(
                "unsupported manifest version {} in {}",
                manifest.version,
                path.display()
            )));
        }
        Ok(manifest)
    }

    /// Load the manifest of a chunk set, if one was written
    pub fn find(set: &ChunkSet) -> Result<Option<Self>> {
        let path = Self::path_for(set);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Combined size of all chunks
    pub fn total_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.size).sum()
    }

    /// Check a chunk set against this manifest
    ///
    /// Names, count and sizes are compared first; digests are only computed
    /// once those agree.
    pub async fn verify(&self, set: &ChunkSet) -> Result<()> {
        let names = set.file_names();
        if names.len() != self.chunks.len() {
            return Err(Error::chunk_set(format!(
                "manifest lists {} chunks, found {}",
                self.chunks.len(),
                names.len()
            )));
        }

        let sizes = set.sizes()?;
        for ((entry, name), size) in self.chunks.iter().zip(&names).zip(sizes) {
            if &entry.name != name {
                return Err(Error::chunk_set(format!(
                    "manifest expects chunk {}, found {}",
                    entry.name, name
                )));
            }
            if entry.size != size {
                return Err(Error::chunk_set(format!(
                    "chunk {} is {} bytes, manifest says {}",
                    name, size, entry.size
                )));
            }
        }

        let digests = hash_files(set.paths().to_vec()).await?;
        for (entry, digest) in self.chunks.iter().zip(digests) {
            if !digest.matches_hex(&entry.sha256) {
                return Err(Error::ChecksumMismatch {
                    chunk: entry.name.clone(),
                    expected: entry.sha256.clone(),
                    actual: digest.sha256,
                });
            }
        }

        tracing::debug!("Verified {} chunks against manifest", self.chunks.len());
        Ok(())
    }
}
