//! External process stages

use async_trait::async_trait;
use splitvault_core::{
    Error, Result, RunningStage, StageExit, StageInput, StageLauncher, StageOutput, StageSpec,
    StageWiring,
};
use std::process::Stdio;
use tokio::process::{Child, Command};

/// A chain stage backed by an external tool
#[derive(Debug, Clone)]
pub struct ProcessStage {
    spec: StageSpec,
    name: String,
}

impl ProcessStage {
    /// Create a stage from a process specification
    pub fn new(spec: StageSpec) -> Self {
        let name = spec.name();
        Self { spec, name }
    }

    /// Get the process specification
    pub fn spec(&self) -> &StageSpec {
        &self.spec
    }
}

impl StageLauncher for ProcessStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, wiring: StageWiring) -> Result<Box<dyn RunningStage>> {
        let mut command = Command::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .stdin(if wiring.piped_input {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            .stdout(if wiring.piped_output {
                Stdio::piped()
            } else {
                Stdio::inherit()
            })
            // never piped: an unread stderr pipe could stall the stage
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| Error::ProcessLaunch {
            stage: self.name.clone(),
            source,
        })?;

        tracing::debug!(
            "Launched stage {} (pid {:?}): {}",
            self.name,
            child.id(),
            self.spec.command_line()
        );

        let input = child.stdin.take().map(|s| Box::new(s) as StageInput);
        let output = child.stdout.take().map(|s| Box::new(s) as StageOutput);

        Ok(Box::new(RunningProcess {
            name: self.name.clone(),
            child,
            input,
            output,
        }))
    }
}

struct RunningProcess {
    name: String,
    child: Child,
    input: Option<StageInput>,
    output: Option<StageOutput>,
}

#[async_trait]
impl RunningStage for RunningProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn take_input(&mut self) -> Option<StageInput> {
        self.input.take()
    }

    fn take_output(&mut self) -> Option<StageOutput> {
        self.output.take()
    }

    async fn wait(&mut self) -> Result<StageExit> {
        let status = self.child.wait().await?;
        let exit = StageExit::from(status);
        tracing::debug!("Stage {} exited with {}", self.name, exit);
        Ok(exit)
    }

    async fn terminate(&mut self) -> Result<()> {
        if let Ok(Some(_)) = self.child.try_wait() {
            return Ok(());
        }

        tracing::debug!("Killing stage {}", self.name);
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn middle() -> StageWiring {
        StageWiring {
            piped_input: true,
            piped_output: true,
        }
    }

    #[tokio::test]
    async fn test_launch_exposes_piped_handles() {
        let stage = ProcessStage::new(StageSpec::new("cat"));
        assert_eq!(stage.name(), "cat");

        let mut running = stage.launch(middle()).unwrap();
        let mut input = running.take_input().unwrap();
        let mut output = running.take_output().unwrap();
        assert!(running.take_input().is_none());

        input.write_all(b"through cat").await.unwrap();
        drop(input);

        let mut echoed = Vec::new();
        output.read_to_end(&mut echoed).await.unwrap();
        assert_eq!(echoed, b"through cat");
        assert!(running.wait().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_first_stage_has_no_input() {
        let stage = ProcessStage::new(StageSpec::new("true"));
        let mut running = stage.launch(StageWiring::for_position(0, 2)).unwrap();

        assert!(running.take_input().is_none());
        assert!(running.take_output().is_some());
        assert!(running.wait().await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_exit_code_reported() {
        let stage = ProcessStage::new(StageSpec::new("sh").args(["-c", "exit 7"]));
        let mut running = stage.launch(StageWiring::for_position(1, 2)).unwrap();
        drop(running.take_input());

        assert_eq!(running.wait().await.unwrap(), StageExit::code(7));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let stage = ProcessStage::new(StageSpec::new("splitvault-no-such-tool"));

        match stage.launch(middle()) {
            Err(Error::ProcessLaunch { stage, source }) => {
                assert_eq!(stage, "splitvault-no-such-tool");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("launch should fail"),
        }
    }

    #[tokio::test]
    async fn test_terminate_kills_running_stage() {
        let stage = ProcessStage::new(StageSpec::new("sleep").arg("30"));
        let mut running = stage.launch(StageWiring::for_position(1, 2)).unwrap();

        running.terminate().await.unwrap();
        let exit = running.wait().await.unwrap();
        assert!(!exit.is_success());
        assert!(exit.code.is_none());

        // terminating an already reaped stage is a no-op
        running.terminate().await.unwrap();
    }

    #[tokio::test]
    async fn test_current_dir_applied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), b"here").unwrap();

        let stage = ProcessStage::new(
            StageSpec::new("cat")
                .arg("marker.txt")
                .current_dir(dir.path()),
        );
        let mut running = stage.launch(StageWiring::for_position(0, 2)).unwrap();

        let mut content = Vec::new();
        running.take_output().unwrap().read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"here");
        assert!(running.wait().await.unwrap().is_success());
    }
}
