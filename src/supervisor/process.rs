//! Handle to the running compiler process.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Lifecycle of a spawned process as seen by the reaper task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exit code, `None` when killed by a signal
    Exited(Option<i32>),
}

impl ProcessStatus {
    pub fn is_exited(&self) -> bool {
        matches!(self, Self::Exited(_))
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Running => None,
            Self::Exited(code) => *code,
        }
    }
}

/// Cheap, cloneable reference to one spawned compiler process.
///
/// Identity is the allocation: two handles are the same process iff
/// [`ProcessHandle::ptr_eq`] holds.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    pid: u32,
    name: String,
    status: watch::Receiver<ProcessStatus>,
    kill: Mutex<Option<oneshot::Sender<()>>>,
}

impl ProcessHandle {
    pub(super) fn new(
        pid: u32,
        name: String,
        status: watch::Receiver<ProcessStatus>,
        kill: oneshot::Sender<()>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                pid,
                name,
                status,
                kill: Mutex::new(Some(kill)),
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// Display name used as log prefix.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> ProcessStatus {
        *self.inner.status.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.status().is_exited()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Ask the reaper to terminate the process tree. Repeated calls are no-ops.
    pub(super) fn terminate(&self) -> bool {
        match self.inner.kill.lock().take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Wait until the process has exited, returning its exit code.
    pub async fn wait(&self) -> Option<i32> {
        let mut rx = self.inner.status.clone();
        let code = match rx.wait_for(ProcessStatus::is_exited).await {
            Ok(status) => status.exit_code(),
            // Reaper gone without reporting; treat as killed
            Err(_) => None,
        };
        code
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.inner.pid)
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}
