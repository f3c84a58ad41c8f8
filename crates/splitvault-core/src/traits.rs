//! Core traits for SplitVault

use crate::{
    error::Result,
    types::{StageExit, StageWiring},
};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Writable end feeding a stage's input
pub type StageInput = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable end draining a stage's output
pub type StageOutput = Box<dyn AsyncRead + Send + Unpin>;

/// Anything that can be started as one stage of a chain
///
/// A stage consumes a byte stream, produces one, or both. External tools
/// are the usual implementation, but an in-process transform works as well.
pub trait StageLauncher: Send + Sync {
    /// Get a human-readable name for this stage
    fn name(&self) -> &str;

    /// Start the stage with the given stream wiring
    fn launch(&self, wiring: StageWiring) -> Result<Box<dyn RunningStage>>;
}

/// A started stage
#[async_trait]
pub trait RunningStage: Send {
    /// Get the stage name
    fn name(&self) -> &str;

    /// Take the input handle (present once, and only if input is piped)
    fn take_input(&mut self) -> Option<StageInput>;

    /// Take the output handle (present once, and only if output is piped)
    fn take_output(&mut self) -> Option<StageOutput>;

    /// Wait for the stage to finish
    async fn wait(&mut self) -> Result<StageExit>;

    /// Forcibly stop the stage and reap it
    async fn terminate(&mut self) -> Result<()>;
}
