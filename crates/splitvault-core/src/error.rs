//! SplitVault error types

use crate::types::StageExit;
use thiserror::Error;

/// The main error type for SplitVault operations
#[derive(Error, Debug)]
pub enum Error {
    /// An external tool could not be started
    #[error("Failed to launch stage '{stage}': {source}")]
    ProcessLaunch {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// A read or write on a link failed mid-stream
    #[error("Link {link} ({from} -> {to}) failed: {source}")]
    PipeIo {
        link: usize,
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    /// A stage exited abnormally
    #[error("Stage {stage_index} ('{stage}') failed with {status}")]
    Pipeline {
        stage_index: usize,
        stage: String,
        status: StageExit,
    },

    /// Bad arguments or paths
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Chunk files are missing, foreign, or out of sequence
    #[error("Invalid chunk set: {0}")]
    ChunkSet(String),

    /// A chunk's digest does not match the manifest
    #[error("Checksum mismatch for chunk {chunk}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        chunk: String,
        expected: String,
        actual: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The pipeline was cancelled before completion
    #[error("Pipeline cancelled")]
    Cancelled,

    /// I/O error outside of a link
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SplitVault operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a chunk set error
    pub fn chunk_set(msg: impl Into<String>) -> Self {
        Error::ChunkSet(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Error::InvalidOperation(msg.into())
    }

    /// True for errors produced by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
