//! Shutdown state for long-running commands.
//!
//! `SHUTDOWN` is set once (Ctrl+C or an explicit request) and never cleared.
//! Async waiters park on `SHUTDOWN_NOTIFY` so the watch loop can stop the
//! compiler tree before the host process exits.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

static SHUTDOWN_NOTIFY: LazyLock<Notify> = LazyLock::new(Notify::new);

/// Setup the global Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        if is_shutdown() {
            // Second Ctrl+C: stop waiting for a graceful teardown
            std::process::exit(130);
        }
        crate::log!("bridge"; "shutting down...");
        request_shutdown();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Mark shutdown and wake every waiter.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::SeqCst);
    SHUTDOWN_NOTIFY.notify_waiters();
    // Stores a permit for a waiter that registers after this call
    SHUTDOWN_NOTIFY.notify_one();
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Resolve once shutdown has been requested.
pub async fn wait_for_shutdown() {
    loop {
        let notified = SHUTDOWN_NOTIFY.notified();
        if is_shutdown() {
            return;
        }
        notified.await;
        if is_shutdown() {
            return;
        }
    }
}
