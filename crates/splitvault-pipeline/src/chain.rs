//! Process chain builder - starts every stage and wires every link
//!
//! Stages are launched in order. As soon as stage `i` exists, the link from
//! stage `i - 1` is started, before stage `i + 1` is launched, so no stage
//! can block on a pipe nobody drains.

use crate::connector::{connect, Link, LinkEnds, DEFAULT_BUFFER_SIZE};
use crate::process::ProcessStage;
use splitvault_core::{Error, Result, RunningStage, StageLauncher, StageSpec, StageWiring};
use tokio_util::sync::CancellationToken;

/// Builder for a chain of stages
pub struct ChainBuilder {
    stages: Vec<Box<dyn StageLauncher>>,
    buffer_size: usize,
    cancel: CancellationToken,
}

impl ChainBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            cancel: CancellationToken::new(),
        }
    }

    /// Append a stage
    pub fn stage<L: StageLauncher + 'static>(mut self, launcher: L) -> Self {
        self.stages.push(Box::new(launcher));
        self
    }

    /// Append an external process stage
    pub fn process(self, spec: StageSpec) -> Self {
        self.stage(ProcessStage::new(spec))
    }

    /// Set the transfer block size of every link
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Use the given token to cancel the chain
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True when no stage was added
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names, in chain order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Launch every stage and start every link
    ///
    /// # Errors
    ///
    /// Returns `ProcessLaunch` if a stage cannot be started. Stages that were
    /// already running are killed and reaped before the error is returned.
    pub async fn build(self) -> Result<ProcessChain> {
        let len = self.stages.len();
        if len < 2 {
            return Err(Error::invalid_operation(format!(
                "a chain needs at least two stages, got {}",
                len
            )));
        }
        if self.buffer_size == 0 {
            return Err(Error::invalid_config("link buffer size must be positive"));
        }

        let mut running: Vec<Box<dyn RunningStage>> = Vec::with_capacity(len);
        let mut links: Vec<Link> = Vec::with_capacity(len - 1);

        for (index, launcher) in self.stages.iter().enumerate() {
            let wiring = StageWiring::for_position(index, len);

            let mut stage = match launcher.launch(wiring) {
                Ok(stage) => stage,
                Err(err) => {
                    tracing::error!(
                        "Stage {} ({}) failed to start: {}",
                        index,
                        launcher.name(),
                        err
                    );
                    abort_started(&mut running, &links).await;
                    return Err(err);
                }
            };

            if let Some(upstream) = running.last_mut() {
                let ends = LinkEnds {
                    index: index - 1,
                    from: upstream.name().to_string(),
                    to: stage.name().to_string(),
                };

                match (upstream.take_output(), stage.take_input()) {
                    (Some(from), Some(to)) => {
                        links.push(connect(ends, from, to, self.buffer_size, self.cancel.clone()));
                    }
                    _ => {
                        running.push(stage);
                        abort_started(&mut running, &links).await;
                        return Err(Error::invalid_operation(format!(
                            "link {} ({} -> {}) has no piped streams",
                            ends.index, ends.from, ends.to
                        )));
                    }
                }
            }

            running.push(stage);
        }

        tracing::debug!("Chain started with {} stages and {} links", running.len(), links.len());

        Ok(ProcessChain {
            stages: running,
            links,
            cancel: self.cancel,
        })
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop everything a failed build already started
async fn abort_started(running: &mut [Box<dyn RunningStage>], links: &[Link]) {
    for link in links {
        link.abort();
    }

    for stage in running.iter_mut().rev() {
        if let Err(e) = stage.terminate().await {
            tracing::warn!("Failed to stop stage {}: {}", stage.name(), e);
        }
    }
}

/// A fully started chain: running stages plus their links
pub struct ProcessChain {
    stages: Vec<Box<dyn RunningStage>>,
    links: Vec<Link>,
    cancel: CancellationToken,
}

impl ProcessChain {
    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a built chain has at least two stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stage names, in chain order
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    /// Identities of every link, in chain order
    pub fn links(&self) -> impl Iterator<Item = &LinkEnds> {
        self.links.iter().map(|l| l.ends())
    }

    /// Token that cancels this chain
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (Vec<Box<dyn RunningStage>>, Vec<Link>, CancellationToken) {
        (self.stages, self.links, self.cancel)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use splitvault_core::{StageExit, StageInput, StageOutput};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::task::JoinHandle;

    /// In-process first stage emitting a fixed buffer
    pub(crate) struct MemorySource {
        pub(crate) data: Vec<u8>,
    }

    struct RunningSource {
        output: Option<StageOutput>,
    }

    impl StageLauncher for MemorySource {
        fn name(&self) -> &str {
            "memory-source"
        }

        fn launch(&self, _wiring: StageWiring) -> Result<Box<dyn RunningStage>> {
            Ok(Box::new(RunningSource {
                output: Some(Box::new(std::io::Cursor::new(self.data.clone()))),
            }))
        }
    }

    #[async_trait]
    impl RunningStage for RunningSource {
        fn name(&self) -> &str {
            "memory-source"
        }

        fn take_input(&mut self) -> Option<StageInput> {
            None
        }

        fn take_output(&mut self) -> Option<StageOutput> {
            self.output.take()
        }

        async fn wait(&mut self) -> Result<StageExit> {
            Ok(StageExit::success())
        }

        async fn terminate(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// In-process last stage collecting everything it receives
    pub(crate) struct MemorySink {
        pub(crate) collected: Arc<Mutex<Vec<u8>>>,
    }

    struct RunningSink {
        input: Option<StageInput>,
        task: Option<JoinHandle<std::io::Result<()>>>,
    }

    impl StageLauncher for MemorySink {
        fn name(&self) -> &str {
            "memory-sink"
        }

        fn launch(&self, _wiring: StageWiring) -> Result<Box<dyn RunningStage>> {
            let (writer, mut reader) = tokio::io::duplex(16 * 1024);
            let collected = self.collected.clone();
            let task = tokio::spawn(async move {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                collected.lock().unwrap().extend(buf);
                Ok(())
            });

            Ok(Box::new(RunningSink {
                input: Some(Box::new(writer)),
                task: Some(task),
            }))
        }
    }

    #[async_trait]
    impl RunningStage for RunningSink {
        fn name(&self) -> &str {
            "memory-sink"
        }

        fn take_input(&mut self) -> Option<StageInput> {
            self.input.take()
        }

        fn take_output(&mut self) -> Option<StageOutput> {
            None
        }

        async fn wait(&mut self) -> Result<StageExit> {
            if let Some(task) = self.task.take() {
                task.await
                    .map_err(|e| Error::invalid_operation(e.to_string()))??;
            }
            Ok(StageExit::success())
        }

        async fn terminate(&mut self) -> Result<()> {
            if let Some(task) = &self.task {
                task.abort();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chain_requires_two_stages() {
        let result = ChainBuilder::new().process(StageSpec::new("cat")).build().await;
        assert!(matches!(result, Err(Error::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_chain_rejects_zero_buffer() {
        let result = ChainBuilder::new()
            .process(StageSpec::new("true"))
            .process(StageSpec::new("true"))
            .buffer_size(0)
            .build()
            .await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_chain_links_adjacent_stages() {
        let builder = ChainBuilder::new()
            .stage(MemorySource { data: b"abc".to_vec() })
            .process(StageSpec::new("cat"))
            .stage(MemorySink { collected: Arc::default() });
        assert_eq!(builder.stage_names(), vec!["memory-source", "cat", "memory-sink"]);

        let chain = builder.build().await.unwrap();
        let links: Vec<_> = chain.links().cloned().collect();

        assert_eq!(chain.len(), 3);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].from, "memory-source");
        assert_eq!(links[0].to, "cat");
        assert_eq!(links[1].index, 1);
        assert_eq!(links[1].to, "memory-sink");
    }

    #[tokio::test]
    async fn test_launch_failure_stops_started_stages() {
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            ChainBuilder::new()
                .process(StageSpec::new("sleep").arg("30"))
                .process(StageSpec::new("cat"))
                .process(StageSpec::new("splitvault-no-such-tool"))
                .build(),
        )
        .await
        .expect("build hung on launch failure");

        match result {
            Err(Error::ProcessLaunch { stage, .. }) => assert_eq!(stage, "splitvault-no-such-tool"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("build should fail"),
        }
    }
}
