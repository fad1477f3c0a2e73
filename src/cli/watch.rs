//! `watch` command: long-running compiler with hot-update forwarding.
//!
//! Runs until Ctrl+C or until the compiler exits, then stops the whole
//! compiler process tree.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::broadcast;

use super::host::LogServer;
use crate::bridge::Bridge;
use crate::core::{request_shutdown, wait_for_shutdown};
use crate::hmr::HostServer;
use crate::logger::{status_error, status_success};
use crate::supervisor::ProcessHandle;
use crate::watch::OutputWatcher;
use crate::{debug, log};

pub async fn run(bridge: &Bridge) -> Result<()> {
    let session = bridge.session();
    let server: Arc<dyn HostServer> = Arc::new(LogServer::new());

    // Created first so outputs written during startup are not missed
    let watcher = OutputWatcher::new(session).context("failed to watch build output directories")?;
    let completions = bridge.supervisor().completions();

    let handle = bridge.configure_server(Arc::clone(&server)).await?;
    log!("watch"; "watching {}", session.build_ids().join(", "));

    let status = tokio::spawn(report_completions(completions));
    let watch = tokio::spawn(watcher.run(Arc::clone(bridge.resolver()), server));

    let exit = wait_for_exit(&handle).await;

    bridge.shutdown().await;
    status.abort();
    if let Err(e) = watch.await {
        debug!("watch"; "watcher task failed: {}", e);
    }

    match exit {
        None | Some(Some(0)) => Ok(()),
        Some(code) => bail!(
            "{} exited unexpectedly ({})",
            handle.name(),
            code.map_or_else(|| "killed".to_string(), |c| format!("exit code {c}"))
        ),
    }
}

/// Block until Ctrl+C (`None`) or compiler exit (`Some(code)`).
///
/// Requests shutdown either way so the watcher loop stops too.
async fn wait_for_exit(handle: &ProcessHandle) -> Option<Option<i32>> {
    let exit = tokio::select! {
        () = wait_for_shutdown() => None,
        code = handle.wait() => Some(code),
    };
    request_shutdown();
    exit
}

async fn report_completions(mut completions: broadcast::Receiver<String>) {
    loop {
        match completions.recv().await {
            Ok(id) => status_success(&format!("build {id} completed")),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                status_error(&format!("missed {n} completion(s)"), "");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
