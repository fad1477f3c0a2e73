//! Debounced, batched hot-update dispatch.
//!
//! Calls inside one window collapse into a single dispatch that uses the
//! last `(session, server)` pair and the union of all build ids. Every
//! caller of the window receives the same [`DispatchSummary`].

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::host::HostServer;
use super::message::{UpdateRecord, now_millis};
use crate::config::{BuildTarget, Session};
use crate::virtual_module::VirtualModuleId;
use crate::{debug, log};

/// Default debounce window.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Sequence number of the cycle, starting at 1
    pub cycle: u64,
    /// Every build id batched into this cycle
    pub build_ids: Vec<String>,
    /// Update records sent across all environments
    pub sent: usize,
    /// Browser builds left to the compiler's own client
    pub skipped: Vec<String>,
}

pub struct HotUpdateDispatcher {
    delay: Duration,
    pending: Arc<Mutex<Option<Batch>>>,
    cycles: Arc<AtomicU64>,
}

struct Batch {
    build_ids: BTreeSet<String>,
    session: Arc<Session>,
    server: Arc<dyn HostServer>,
    deadline: Instant,
    waiters: Vec<oneshot::Sender<DispatchSummary>>,
}

/// Resolves with the summary of the cycle the call was batched into.
pub struct PendingDispatch {
    rx: oneshot::Receiver<DispatchSummary>,
}

impl PendingDispatch {
    pub async fn wait(self) -> DispatchSummary {
        // Sender dropped only if the runtime shut down mid-window
        self.rx.await.unwrap_or_default()
    }
}

impl Default for HotUpdateDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

impl HotUpdateDispatcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            cycles: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Completed dispatch cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Queue `build_id` and wait for the dispatch it ends up in.
    pub async fn notify(
        &self,
        session: Arc<Session>,
        server: Arc<dyn HostServer>,
        build_id: &str,
    ) -> DispatchSummary {
        self.schedule(session, server, build_id).wait().await
    }

    /// Queue `build_id` without waiting. Must be called inside a tokio runtime.
    ///
    /// Each call pushes the window's deadline back by the full delay.
    pub fn schedule(
        &self,
        session: Arc<Session>,
        server: Arc<dyn HostServer>,
        build_id: &str,
    ) -> PendingDispatch {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + self.delay;

        let mut guard = self.pending.lock();
        match guard.as_mut() {
            Some(batch) => {
                batch.build_ids.insert(build_id.to_string());
                batch.session = session;
                batch.server = server;
                batch.deadline = deadline;
                batch.waiters.push(tx);
            }
            None => {
                *guard = Some(Batch {
                    build_ids: BTreeSet::from([build_id.to_string()]),
                    session,
                    server,
                    deadline,
                    waiters: vec![tx],
                });
                tokio::spawn(run_timer(Arc::clone(&self.pending), Arc::clone(&self.cycles)));
            }
        }
        debug!("hmr"; "queued update for {}", build_id);

        PendingDispatch { rx }
    }
}

/// Single timer per window: sleeps until the (possibly moved) deadline.
async fn run_timer(pending: Arc<Mutex<Option<Batch>>>, cycles: Arc<AtomicU64>) {
    loop {
        let deadline = match pending.lock().as_ref() {
            Some(batch) => batch.deadline,
            None => return,
        };
        tokio::time::sleep_until(deadline).await;

        let batch = {
            let mut guard = pending.lock();
            let due = match guard.as_ref() {
                Some(batch) => batch.deadline <= Instant::now(),
                None => return,
            };
            if due { guard.take() } else { None }
        };

        if let Some(batch) = batch {
            let cycle = cycles.fetch_add(1, Ordering::SeqCst) + 1;
            let summary = dispatch(&batch, cycle);
            for waiter in batch.waiters {
                let _ = waiter.send(summary.clone());
            }
            return;
        }
    }
}

fn dispatch(batch: &Batch, cycle: u64) -> DispatchSummary {
    let timestamp = now_millis();
    let environments = batch.server.environments();
    let mut summary = DispatchSummary {
        cycle,
        build_ids: batch.build_ids.iter().cloned().collect(),
        ..Default::default()
    };

    for build_id in &batch.build_ids {
        let Some(target) = batch.session.target(build_id) else {
            debug!("hmr"; "build {} not in session, dropping update", build_id);
            continue;
        };
        if target.is_browser() {
            summary.skipped.push(build_id.clone());
            continue;
        }

        let mut sent = 0;
        for resolved in module_ids(target) {
            for env in &environments {
                if let Some(url) = env.loaded_module_url(&resolved) {
                    env.send(&UpdateRecord::module_updated(url, timestamp));
                    sent += 1;
                }
            }
        }

        if sent > 0 {
            log!("hmr"; "updated {} ({} module(s))", build_id, sent);
        } else {
            debug!("hmr"; "{} not loaded anywhere, nothing to update", build_id);
        }
        summary.sent += sent;
    }

    summary
}

/// Resolved virtual ids a target can be loaded under.
fn module_ids(target: &BuildTarget) -> Vec<String> {
    std::iter::once(VirtualModuleId::new(&target.id).resolved())
        .chain(
            target
                .modules
                .iter()
                .map(|m| VirtualModuleId::new(&target.id).with_module(m).resolved()),
        )
        .collect()
}
