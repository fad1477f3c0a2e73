//! Process-tree termination.
//!
//! On unix the compiler is spawned as the leader of its own process group,
//! so signalling the negated pid reaches every worker it forked. Windows has
//! no process groups in that sense and goes through `taskkill /T`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Signal {
    /// Ask the tree to exit
    Terminate,
    /// Force the tree down
    Kill,
}

#[cfg(unix)]
pub(super) fn signal_tree(pid: u32, signal: Signal) {
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    if pid <= 0 {
        return;
    }
    let sig = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) with a negative pid only signals the process group
    // we created at spawn; failure (ESRCH) is harmless.
    let rc = unsafe { libc::kill(-pid, sig) };
    if rc != 0 {
        crate::debug!("bridge"; "signal {:?} to process group {} failed", signal, pid);
    }
}

/// Whether any member of the process group led by `pid` still exists.
#[cfg(unix)]
pub(super) fn tree_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    // SAFETY: signal 0 only checks for existence of the group.
    pid > 0 && unsafe { libc::kill(-pid, 0) } == 0
}

/// `taskkill /T /F` returns after the tree is gone.
#[cfg(windows)]
pub(super) fn tree_alive(_pid: u32) -> bool {
    false
}

#[cfg(windows)]
pub(super) fn signal_tree(pid: u32, _signal: Signal) {
    use crate::utils::exec::{Cmd, SILENT_FILTER};

    let pid = pid.to_string();
    if let Err(e) = Cmd::new("taskkill")
        .args(["/pid", pid.as_str(), "/T", "/F"])
        .filter(&SILENT_FILTER)
        .run()
    {
        crate::debug!("bridge"; "taskkill {} failed: {}", pid, e);
    }
}
