//! Pipe connector - forwards one stage's output into the next stage's input
//!
//! Every link runs on its own task. The task owns both handles and releases
//! them on every exit path, downstream first, so the next stage always sees
//! end-of-input once the link is done.

use crate::report::LinkReport;
use splitvault_core::{Error, Result};
use std::io;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default transfer block size (64KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Identity of a link: its position and the stages it joins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEnds {
    /// Link index (joins stage `index` to stage `index + 1`)
    pub index: usize,
    /// Upstream stage name
    pub from: String,
    /// Downstream stage name
    pub to: String,
}

/// A running link
pub struct Link {
    ends: LinkEnds,
    task: JoinHandle<Result<LinkReport>>,
}

impl Link {
    /// Get the link identity
    pub fn ends(&self) -> &LinkEnds {
        &self.ends
    }

    /// Check whether the copier task has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the copier task; its handles are dropped with it
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the copier task and return its outcome
    pub async fn join(self) -> Result<LinkReport> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled),
            Err(e) => Err(Error::invalid_operation(format!(
                "link {} task failed: {}",
                self.ends.index, e
            ))),
        }
    }
}

/// Start a copier task moving every byte from `from` into `to`
///
/// Must be called from within a tokio runtime.
pub fn connect<R, W>(
    ends: LinkEnds,
    from: R,
    to: W,
    buffer_size: usize,
    cancel: CancellationToken,
) -> Link
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let task_ends = ends.clone();
    let task = tokio::spawn(async move {
        let start = Instant::now();
        match pump(from, to, buffer_size, &cancel).await {
            Ok(bytes) => {
                let report = LinkReport {
                    index: task_ends.index,
                    from: task_ends.from,
                    to: task_ends.to,
                    bytes,
                    elapsed: start.elapsed(),
                };
                tracing::debug!("Link finished: {}", report.format());
                Ok(report)
            }
            Err(_) if cancel.is_cancelled() => Err(Error::Cancelled),
            Err(source) => {
                tracing::warn!(
                    "Link {} ({} -> {}) failed: {}",
                    task_ends.index,
                    task_ends.from,
                    task_ends.to,
                    source
                );
                Err(Error::PipeIo {
                    link: task_ends.index,
                    from: task_ends.from,
                    to: task_ends.to,
                    source,
                })
            }
        }
    });

    Link { ends, task }
}

/// Copy `from` into `to` until end-of-stream, then close both
///
/// Returns the number of bytes forwarded. On error or cancellation the
/// remaining bytes are not forwarded, and both handles are still released.
pub async fn pump<R, W>(
    mut from: R,
    mut to: W,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let outcome = forward(&mut from, &mut to, buffer_size, cancel).await;

    // downstream first: the next stage must observe end-of-input
    drop(to);
    drop(from);

    outcome
}

async fn forward<R, W>(
    from: &mut R,
    to: &mut W,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut forwarded: u64 = 0;

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            read = from.read(&mut buffer) => read?,
        };

        if read == 0 {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            written = to.write_all(&buffer[..read]) => written?,
        }

        forwarded += read as u64;
    }

    to.shutdown().await?;
    Ok(forwarded)
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "link cancelled")
}
