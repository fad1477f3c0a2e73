//! Line-oriented forwarding of the compiler's stdout/stderr.

use std::time::Duration;

use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use super::Supervisor;
use crate::log;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Stream {
    Stdout,
    Stderr,
}

/// Reader tasks for one process. Both finish at EOF.
pub struct OutputTasks {
    pub stdout: JoinHandle<()>,
    pub stderr: JoinHandle<()>,
}

impl OutputTasks {
    /// Wait until both streams are drained.
    pub async fn join(self) {
        let _ = self.stdout.await;
        let _ = self.stderr.await;
    }

    /// Like [`join`](Self::join), but cancel readers still blocked after
    /// `grace` (a surviving descendant can hold the pipe open).
    ///
    /// No line is recorded once this returns.
    pub async fn drain(mut self, grace: Duration) {
        let drained = tokio::time::timeout(grace, async {
            let _ = (&mut self.stdout).await;
            let _ = (&mut self.stderr).await;
        })
        .await;
        if drained.is_ok() {
            return;
        }
        for task in [self.stdout, self.stderr] {
            if !task.is_finished() {
                task.abort();
                let _ = task.await;
            }
        }
    }
}

pub(super) fn spawn_reader<R>(
    supervisor: Supervisor,
    name: String,
    reader: R,
    stream: Stream,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    forward_line(&name, stream, line);
                    supervisor.record_line(line);
                }
                Err(e) => {
                    crate::debug!(&name; "output stream closed: {}", e);
                    break;
                }
            }
        }
    })
}

fn forward_line(name: &str, stream: Stream, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    match stream {
        Stream::Stdout => log!(name; "{}", line),
        Stream::Stderr => log!(name; "{}", line.red()),
    }
}
