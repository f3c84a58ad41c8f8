//! Core types for SplitVault

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// One external process specification in a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    /// Executable name or path
    pub program: PathBuf,

    /// Ordered argument list
    pub args: Vec<OsString>,

    /// Working directory (inherited when unset)
    pub current_dir: Option<PathBuf>,
}

impl StageSpec {
    /// Create a stage running `program` with no arguments
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Short display name: the executable's file name
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Full command line, for logs
    pub fn command_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// How a stage's standard streams are connected
///
/// The first stage of a chain has no piped input and the last has no piped
/// output; both fall back to the controlling process's own streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageWiring {
    /// Stdin is fed by the upstream link
    pub piped_input: bool,
    /// Stdout is drained by the downstream link
    pub piped_output: bool,
}

impl StageWiring {
    /// Wiring for position `index` in a chain of `len` stages
    pub fn for_position(index: usize, len: usize) -> Self {
        Self {
            piped_input: index > 0,
            piped_output: index + 1 < len,
        }
    }
}

/// How a stage terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageExit {
    /// Exit code, when the stage exited normally
    pub code: Option<i32>,
    /// Terminating signal, when the stage was killed
    pub signal: Option<i32>,
}

impl StageExit {
    /// Exit with the given code
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Killed by the given signal
    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Exit status 0
    pub fn success() -> Self {
        Self::code(0)
    }

    /// True when the stage exited with status 0
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for StageExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wiring_positions() {
        assert_eq!(
            StageWiring::for_position(0, 3),
            StageWiring {
                piped_input: false,
                piped_output: true,
            }
        );
        assert_eq!(
            StageWiring::for_position(1, 3),
            StageWiring {
                piped_input: true,
                piped_output: true,
            }
        );
        assert_eq!(
            StageWiring::for_position(2, 3),
            StageWiring {
                piped_input: true,
                piped_output: false,
            }
        );
    }

    #[test]
    fn test_stage_spec_builder() {
        let spec = StageSpec::new("/usr/bin/tar").args(["-czf", "-"]).arg(".");
        assert_eq!(spec.name(), "tar");
        assert_eq!(spec.command_line(), "/usr/bin/tar -czf - .");
    }

    #[test]
    fn test_stage_exit_display() {
        assert_eq!(StageExit::code(0).to_string(), "exit code 0");
        assert_eq!(StageExit::signal(13).to_string(), "signal 13");
        assert!(StageExit::success().is_success());
        assert!(!StageExit::signal(9).is_success());
    }
}
