//! # SplitVault Core
//!
//! Core traits, types, and error handling for SplitVault.
//!
//! This crate provides the foundational abstractions for running chains of
//! byte-stream stages:
//! - **StageSpec**: An external process with its arguments
//! - **StageLauncher / RunningStage**: The capability every chain stage offers
//! - **StageExit**: How a stage terminated
//! - **Error**: The error taxonomy shared by every crate
//!
//! ## Terminology
//!
//! - **Stage** = One process (or transform) in a pipeline
//! - **Chain** = The ordered stages of one backup or restore
//! - **Link** = The byte stream between two adjacent stages
//! - **Chunk** = One numbered file written by the splitting stage
//!
//! ## Example
//!
//! ```rust
//! use splitvault_core::{StageSpec, StageWiring};
//!
//! let archiver = StageSpec::new("tar").args(["-czf", "-", "-C", "/data", "."]);
//! assert_eq!(archiver.name(), "tar");
//!
//! let wiring = StageWiring::for_position(0, 3);
//! assert!(!wiring.piped_input);
//! ```

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use error::{Error, Result};
pub use traits::{RunningStage, StageInput, StageLauncher, StageOutput};
pub use types::{StageExit, StageSpec, StageWiring};
