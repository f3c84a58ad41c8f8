//! Transfer reports for links and whole pipelines

use splitvault_core::StageExit;
use std::time::Duration;

/// Bytes moved by one link
#[derive(Debug, Clone)]
pub struct LinkReport {
    /// Position of the link (link `i` joins stage `i` to stage `i + 1`)
    pub index: usize,
    /// Upstream stage name
    pub from: String,
    /// Downstream stage name
    pub to: String,
    /// Bytes forwarded
    pub bytes: u64,
    /// Time from link start to end-of-stream
    pub elapsed: Duration,
}

impl LinkReport {
    /// Average transfer rate in bytes/second
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Format as human-readable string
    pub fn format(&self) -> String {
        format!(
            "link {} ({} -> {}): {} in {} @ {}/s",
            self.index,
            self.from,
            self.to,
            format_bytes(self.bytes),
            format_duration(self.elapsed),
            format_bytes(self.bytes_per_second() as u64)
        )
    }
}

/// Exit of one stage
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Position in the chain
    pub index: usize,
    /// Stage name
    pub name: String,
    /// How the stage terminated
    pub exit: StageExit,
}

/// Result of a pipeline that ran to completion
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Every stage, in chain order
    pub stages: Vec<StageOutcome>,
    /// Every link, in chain order
    pub links: Vec<LinkReport>,
    /// Wall time of the whole run
    pub elapsed: Duration,
}

impl PipelineReport {
    /// Bytes handed to the last stage
    pub fn bytes_delivered(&self) -> u64 {
        self.links.last().map(|l| l.bytes).unwrap_or(0)
    }

    /// Bytes produced by the first stage
    pub fn bytes_produced(&self) -> u64 {
        self.links.first().map(|l| l.bytes).unwrap_or(0)
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs >= 3600 {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}s", total_secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
