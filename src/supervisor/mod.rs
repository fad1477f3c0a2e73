//! Compiler process supervisor.
//!
//! Owns the single external compiler process for the whole host process,
//! parses its output for build completion markers and fans those out to
//! listeners and waiters.
//!
//! # Module Structure
//!
//! ```text
//! supervisor/
//! ├── kill.rs       # process-tree termination (process group / taskkill)
//! ├── marker.rs     # `[:<id>] build completed` parsing
//! ├── output.rs     # stdout/stderr line forwarding
//! ├── process.rs    # ProcessHandle, ProcessStatus
//! ├── subscribe.rs  # Subscription token
//! └── mod.rs        # Supervisor (this file)
//! ```
//!
//! # Sharing
//!
//! Resolvers, the dispatcher and the CLI all go through
//! [`Supervisor::global`], so recreating any of them never spawns a second
//! compiler. [`Supervisor::new`] builds an isolated instance for tests.

mod kill;
mod marker;
mod output;
mod process;
mod subscribe;


pub use marker::parse_completion_marker;
pub use output::OutputTasks;
pub use process::{ProcessHandle, ProcessStatus};
pub use subscribe::Subscription;

use kill::Signal;
use output::Stream;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use subscribe::Listener;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, oneshot, watch};

use crate::error::{BridgeError, Result, SpawnError};
use crate::{debug, log};

/// Time the process tree gets to exit after SIGTERM before SIGKILL.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// Time output readers get to reach EOF after the process exits.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Poll interval while waiting for the process group to disappear.
const TREE_POLL: Duration = Duration::from_millis(20);

/// Buffered completion events per waiter before it observes `Lagged`.
const COMPLETION_CAPACITY: usize = 64;

static GLOBAL: LazyLock<Supervisor> = LazyLock::new(Supervisor::new);

/// Process-wide compiler supervisor. Clones share state.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    /// Every marker match, repeats included
    completions: broadcast::Sender<String>,
    /// Serializes `start` so concurrent callers reuse one spawn
    start_lock: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct State {
    handle: Option<ProcessHandle>,
    completed: FxHashSet<String>,
    listeners: BTreeMap<u64, Listener>,
    next_token: u64,
    last_exit: Option<i32>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    /// Isolated supervisor with its own state.
    pub fn new() -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                completions,
                start_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The supervisor shared by everything in this host process.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start `command` in `cwd`, or return the live process if there is one.
    ///
    /// Returns once the OS has created the process. Output handling is
    /// attached before returning, so no marker line can be missed.
    pub async fn start(
        &self,
        name: &str,
        command: &[String],
        cwd: &Path,
    ) -> std::result::Result<ProcessHandle, SpawnError> {
        let _guard = self.shared.start_lock.lock().await;

        if let Some(handle) = self.existing() {
            log!("bridge"; "using existing {} process (pid {})", handle.name(), handle.pid());
            return Ok(handle);
        }

        let Some((program, args)) = command.split_first() else {
            return Err(SpawnError::NotFound {
                program: String::new(),
            });
        };

        let resolved = which::which_in(program, std::env::var_os("PATH"), cwd).map_err(|_| {
            SpawnError::NotFound {
                program: program.clone(),
            }
        })?;
        debug!("bridge"; "resolved {} to {}", program, resolved.display());

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        // Own process group: detached from our terminal's Ctrl+C and
        // killable as a whole tree.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SpawnError::NotFound {
                    program: program.clone(),
                }
            } else {
                SpawnError::Os {
                    program: program.clone(),
                    source,
                }
            }
        })?;

        let pid = child.id().unwrap_or_default();
        let (status_tx, status_rx) = watch::channel(ProcessStatus::Running);
        let (kill_tx, kill_rx) = oneshot::channel();
        let handle = ProcessHandle::new(pid, name.to_string(), status_rx, kill_tx);

        {
            let mut state = self.shared.state.lock();
            state.handle = Some(handle.clone());
            state.completed.clear();
            state.last_exit = None;
        }

        let output = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => {
                Some(self.attach_output_handling(&handle, stdout, stderr))
            }
            _ => None,
        };

        tokio::spawn(reap(
            self.clone(),
            child,
            handle.clone(),
            output,
            status_tx,
            kill_rx,
        ));

        log!("bridge"; "started {} (pid {}): {}", name, pid, command.join(" "));
        Ok(handle)
    }

    /// The current process, if it is still running.
    pub fn existing(&self) -> Option<ProcessHandle> {
        self.shared
            .state
            .lock()
            .handle
            .as_ref()
            .filter(|h| h.is_running())
            .cloned()
    }

    pub fn has_live_process(&self) -> bool {
        self.existing().is_some()
    }

    /// Terminate the process tree, wait for it to exit, then clear state.
    ///
    /// Calling this with nothing running only resets the completion set.
    pub async fn stop(&self) {
        let handle = self.shared.state.lock().handle.clone();

        if let Some(handle) = handle {
            if handle.terminate() {
                log!("bridge"; "stopping {} (pid {})", handle.name(), handle.pid());
            }
            handle.wait().await;
        }

        let mut state = self.shared.state.lock();
        state.handle = None;
        state.completed.clear();
    }

    fn on_exit(&self, handle: &ProcessHandle, code: Option<i32>, requested: bool) {
        {
            let mut state = self.shared.state.lock();
            if state.handle.as_ref().is_some_and(|h| h.ptr_eq(handle)) {
                state.handle = None;
                state.completed.clear();
            }
            state.last_exit = code;
        }

        match (requested, code) {
            (true, _) => debug!("bridge"; "{} stopped", handle.name()),
            (false, Some(0)) => log!("bridge"; "{} exited", handle.name()),
            (false, _) => {
                let banner = format!(" {} crashed! ", handle.name());
                log!("error"; "{}", banner.white().on_red().bold());
            }
        }
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Forward both streams line by line and scan each line for markers.
    pub fn attach_output_handling<O, E>(
        &self,
        handle: &ProcessHandle,
        stdout: O,
        stderr: E,
    ) -> OutputTasks
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let name = handle.name().to_string();
        OutputTasks {
            stdout: output::spawn_reader(self.clone(), name.clone(), stdout, Stream::Stdout),
            stderr: output::spawn_reader(self.clone(), name, stderr, Stream::Stderr),
        }
    }

    /// Feed one output line through marker detection.
    ///
    /// Listeners run synchronously, in subscription order, only the first
    /// time an id completes. Waiters see every completion. Returns the
    /// matched build id.
    pub fn record_line(&self, line: &str) -> Option<String> {
        let id = parse_completion_marker(line)?;

        // No receivers is fine
        let _ = self.shared.completions.send(id.clone());

        let listeners: Vec<Listener> = {
            let mut state = self.shared.state.lock();
            if !state.completed.insert(id.clone()) {
                return Some(id);
            }
            state.listeners.values().cloned().collect()
        };

        debug!("bridge"; "build {} completed, notifying {} listener(s)", id, listeners.len());
        for listener in listeners {
            listener(&id);
        }
        Some(id)
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Register a listener for first completions of any build id.
    pub fn subscribe_on_completion<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut state = self.shared.state.lock();
        let token = state.next_token;
        state.next_token += 1;
        state.listeners.insert(token, Arc::new(listener));
        Subscription::new(&self.shared, token)
    }

    /// Stream of every completion marker observed from now on.
    pub fn completions(&self) -> broadcast::Receiver<String> {
        self.shared.completions.subscribe()
    }

    pub fn has_completed(&self, build_id: &str) -> bool {
        self.shared.state.lock().completed.contains(build_id)
    }

    /// Exit code of the most recent process, if one has exited.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.shared.state.lock().last_exit
    }

    /// Wait until `build_id` has completed at least once.
    ///
    /// Fails with [`BridgeError::ProcessCrash`] when there is no live process
    /// or the process exits first.
    pub async fn wait_for_completion(&self, build_id: &str) -> Result<()> {
        // Subscribe before checking, so a completion in between is not lost.
        let mut completions = self.completions();

        loop {
            if self.has_completed(build_id) {
                return Ok(());
            }
            let Some(handle) = self.existing() else {
                return Err(self.crash_error(build_id));
            };

            tokio::select! {
                biased;
                msg = completions.recv() => match msg {
                    Ok(id) if id == build_id => return Ok(()),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(self.crash_error(build_id));
                    }
                },
                code = handle.wait() => {
                    return Err(BridgeError::ProcessCrash {
                        build: build_id.to_string(),
                        code,
                    });
                }
            }
        }
    }

    pub(crate) fn crash_error(&self, build_id: &str) -> BridgeError {
        BridgeError::ProcessCrash {
            build: build_id.to_string(),
            code: self.last_exit_code(),
        }
    }
}

/// Own the child until it exits, then publish the status.
///
/// Output is drained before state is reset, so a marker printed right
/// before exit can not outlive the process in the completion set.
async fn reap(
    supervisor: Supervisor,
    mut child: Child,
    handle: ProcessHandle,
    output: Option<OutputTasks>,
    status_tx: watch::Sender<ProcessStatus>,
    kill_rx: oneshot::Receiver<()>,
) {
    let pid = handle.pid();
    let mut requested = false;

    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            requested = true;
            kill::signal_tree(pid, Signal::Terminate);
            let status = match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
                Ok(status) => status,
                Err(_) => {
                    debug!("bridge"; "{} ignored SIGTERM, killing", handle.name());
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            // The leader may be gone while descendants ignoring SIGTERM are not
            kill::signal_tree(pid, Signal::Kill);
            wait_tree_gone(pid).await;
            status
        }
    };

    if let Some(output) = output {
        output.drain(DRAIN_GRACE).await;
    }

    let code = status.ok().and_then(|s| s.code());
    // State first: a waiter woken by the status must find `last_exit` set.
    supervisor.on_exit(&handle, code, requested);
    status_tx.send_replace(ProcessStatus::Exited(code));
}

/// Poll until the process group is empty, giving up after [`TERMINATE_GRACE`].
async fn wait_tree_gone(pid: u32) {
    let deadline = tokio::time::Instant::now() + TERMINATE_GRACE;
    while kill::tree_alive(pid) {
        if tokio::time::Instant::now() >= deadline {
            debug!("bridge"; "process group {} still present after SIGKILL", pid);
            return;
        }
        tokio::time::sleep(TREE_POLL).await;
    }
}
