//! Pipeline runner - drives a built chain to one pass/fail result
//!
//! Success requires every stage to exit 0 *and* every link to reach
//! end-of-stream without an I/O error.

use crate::chain::{ChainBuilder, ProcessChain};
use crate::report::{format_duration, PipelineReport, StageOutcome};
use splitvault_core::{Error, Result, RunningStage, StageExit};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs chains to completion
pub struct PipelineRunner;

impl PipelineRunner {
    /// Build a chain and run it
    pub async fn execute(builder: ChainBuilder) -> Result<PipelineReport> {
        let chain = builder.build().await?;
        Self::run(chain).await
    }

    /// Wait for every stage and link of a started chain
    ///
    /// # Errors
    ///
    /// - `Cancelled` if the chain's token fired before everything succeeded
    /// - `Pipeline` for the first stage, in chain order, that exited with a
    ///   non-zero code (or, failing that, the first one killed by a signal)
    /// - `PipeIo` for the first failed link when every stage exited 0
    pub async fn run(chain: ProcessChain) -> Result<PipelineReport> {
        let start = Instant::now();
        let names = chain.stage_names();
        let (stages, links, cancel) = chain.into_parts();

        tracing::info!("Running pipeline: {}", names.join(" | "));

        let supervisors: Vec<JoinHandle<Result<StageExit>>> = stages
            .into_iter()
            .map(|stage| tokio::spawn(supervise(stage, cancel.clone())))
            .collect();

        let mut outcomes = Vec::with_capacity(names.len());
        let mut wait_errors = Vec::new();

        for (index, (name, supervisor)) in names.iter().zip(supervisors).enumerate() {
            let joined = supervisor.await.map_err(|e| {
                Error::invalid_operation(format!("supervisor of stage {} failed: {}", name, e))
            });

            match joined.and_then(|exit| exit) {
                Ok(exit) => outcomes.push(StageOutcome {
                    index,
                    name: name.clone(),
                    exit,
                }),
                Err(e) => {
                    tracing::warn!("Could not collect exit of stage {} ({}): {}", index, name, e);
                    wait_errors.push(e);
                }
            }
        }

        let mut reports = Vec::with_capacity(links.len());
        let mut link_errors = Vec::new();
        for link in links {
            match link.join().await {
                Ok(report) => reports.push(report),
                Err(e) => link_errors.push(e),
            }
        }

        let failed = outcomes.iter().any(|o| !o.exit.is_success())
            || !wait_errors.is_empty()
            || !link_errors.is_empty();

        if !failed {
            let report = PipelineReport {
                stages: outcomes,
                links: reports,
                elapsed: start.elapsed(),
            };
            for link in &report.links {
                tracing::info!("{}", link.format());
            }
            tracing::info!(
                "Pipeline finished in {}",
                format_duration(report.elapsed)
            );
            return Ok(report);
        }

        if cancel.is_cancelled() {
            tracing::warn!("Pipeline cancelled: {}", names.join(" | "));
            return Err(Error::Cancelled);
        }

        for outcome in outcomes.iter().filter(|o| !o.exit.is_success()) {
            tracing::warn!(
                "Stage {} ({}) failed with {}",
                outcome.index,
                outcome.name,
                outcome.exit
            );
        }

        if let Some(primary) = primary_failure(&outcomes) {
            return Err(Error::Pipeline {
                stage_index: primary.index,
                stage: primary.name.clone(),
                status: primary.exit,
            });
        }

        Err(wait_errors
            .into_iter()
            .chain(link_errors)
            .next()
            .unwrap_or_else(|| Error::invalid_operation("pipeline failed without a cause")))
    }
}

impl ProcessChain {
    /// Run this chain to completion
    pub async fn wait(self) -> Result<PipelineReport> {
        PipelineRunner::run(self).await
    }
}

/// Wait for one stage, killing it if the chain is cancelled first
async fn supervise(
    mut stage: Box<dyn RunningStage>,
    cancel: CancellationToken,
) -> Result<StageExit> {
    let finished = tokio::select! {
        exit = stage.wait() => Some(exit),
        _ = cancel.cancelled() => None,
    };

    match finished {
        Some(exit) => exit,
        None => {
            tracing::debug!("Terminating stage {} after cancellation", stage.name());
            stage.terminate().await?;
            stage.wait().await
        }
    }
}

/// Pick the stage to blame: the first with a non-zero exit code, else the
/// first killed by a signal
///
/// A downstream crash makes upstream stages die of a broken pipe, so a real
/// exit code is the better root cause.
fn primary_failure(outcomes: &[StageOutcome]) -> Option<&StageOutcome> {
    outcomes
        .iter()
        .find(|o| !o.exit.is_success() && o.exit.code.is_some())
        .or_else(|| outcomes.iter().find(|o| !o.exit.is_success()))
}
