//! Backup and restore operations for SplitVault
//!
//! Each operation is a three-stage chain of external tools run by the
//! pipeline engine:
//! - Backup: `tar` -> `gpg --symmetric` -> `split`
//! - Restore: `cat` -> `gpg --decrypt` -> `tar -x`
//!
//! Around the chains this crate provides chunk naming and discovery, an
//! optional SHA-256 manifest, tool configuration and path checks.

pub mod backup;
pub mod chunks;
pub mod config;
pub mod hash;
pub mod manifest;
pub mod restore;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use backup::{backup, BackupRequest, BackupSummary, DEFAULT_CHUNK_SIZE};
pub use chunks::{chunk_name, expected_chunk_count, ChunkSet};
pub use config::{CipherConfig, ToolConfig};
pub use manifest::{ChunkEntry, ChunkManifest};
pub use restore::{restore, RestoreRequest, RestoreSummary};
pub use validate::{validate_backup_paths, validate_restore_paths};
