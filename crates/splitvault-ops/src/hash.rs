//! SHA-256 digests for chunk verification

use sha2::{Digest, Sha256};
use splitvault_core::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Size and digest of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    /// Bytes hashed
    pub size: u64,
    /// Lowercase hex SHA-256
    pub sha256: String,
}

impl FileDigest {
    /// Verify against a hex string
    pub fn matches_hex(&self, hex: &str) -> bool {
        self.sha256.eq_ignore_ascii_case(hex)
    }
}

/// Compute the digest of a reader
pub fn hash_reader<R: Read>(reader: &mut R) -> std::io::Result<FileDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024]; // 1MB buffer
    let mut size: u64 = 0;

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        size += bytes_read as u64;
    }

    Ok(FileDigest {
        size,
        sha256: hex::encode(hasher.finalize()),
    })
}

/// Compute the digest of a file
pub fn hash_file(path: &Path) -> std::io::Result<FileDigest> {
    let mut file = std::fs::File::open(path)?;
    hash_reader(&mut file)
}

/// Hash several files off the async runtime, in order
pub async fn hash_files(paths: Vec<PathBuf>) -> Result<Vec<FileDigest>> {
    tokio::task::spawn_blocking(move || {
        paths
            .iter()
            .map(|p| hash_file(p))
            .collect::<std::io::Result<Vec<_>>>()
    })
    .await
    .map_err(|e| Error::invalid_operation(format!("hashing task failed: {}", e)))?
    .map_err(Error::from)
}
