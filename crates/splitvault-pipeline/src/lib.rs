//! # SplitVault Pipeline
//!
//! The process pipeline engine for SplitVault.
//!
//! This crate launches chains of stages and streams bytes between them:
//! - **connector**: One copier task per link, forwarding output to input
//! - **chain**: Starts every stage and wires every link without deadlock
//! - **runner**: Waits for stages and links, yields one pass/fail result
//! - **process**: External tools as chain stages
//! - **report**: Per-link and per-pipeline transfer reports
//!
//! ## Example
//!
//! ```rust,no_run
//! use splitvault_core::StageSpec;
//! use splitvault_pipeline::{ChainBuilder, PipelineRunner};
//!
//! # async fn run() -> splitvault_core::Result<()> {
//! let report = PipelineRunner::execute(
//!     ChainBuilder::new()
//!         .process(StageSpec::new("tar").args(["-czf", "-", "-C", "/data", "."]))
//!         .process(StageSpec::new("gpg").args(["--symmetric", "-"]))
//!         .process(StageSpec::new("split").args(["-b", "1000000", "-d", "-", "/backup/data-"])),
//! )
//! .await?;
//!
//! println!("{} bytes stored", report.bytes_delivered());
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod connector;
pub mod process;
pub mod report;
pub mod runner;

pub use chain::{ChainBuilder, ProcessChain};
pub use connector::{connect, pump, Link, LinkEnds, DEFAULT_BUFFER_SIZE};
pub use process::ProcessStage;
pub use report::{LinkReport, PipelineReport, StageOutcome};
pub use runner::PipelineRunner;

// Re-exported so callers can cancel without a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
