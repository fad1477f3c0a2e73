//! Output directory watcher.
//!
//! Feeds every changed build output file to
//! [`VirtualModuleResolver::hot_update`], standing in for the host's own
//! file watcher when the bridge runs standalone.
//!
//! ```text
//! notify → Debouncer (quiet period, temp-file filter) → hot_update → dispatcher
//! ```

mod debouncer;
mod roots;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;

use crate::config::Session;
use crate::hmr::HostServer;
use crate::virtual_module::{HotUpdateDecision, VirtualModuleResolver};
use debouncer::Debouncer;
use roots::WatchRoots;

/// Poll interval for output directories that do not exist yet.
const ROOT_RETRY: Duration = Duration::from_millis(500);

pub struct OutputWatcher {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    roots: WatchRoots,
    debouncer: Debouncer,
}

impl OutputWatcher {
    /// Start watching every build's output directory in `session`.
    ///
    /// Events buffer from this point on, before [`OutputWatcher::run`].
    pub fn new(session: &Session) -> notify::Result<Self> {
        let paths: Vec<PathBuf> = session
            .targets()
            .map(|target| target.output_dir_in(session.root()))
            .collect();
        Self::with_paths(paths)
    }

    pub(crate) fn with_paths(paths: Vec<PathBuf>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        let mut roots = WatchRoots::new(paths);
        roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            roots,
            debouncer: Debouncer::new(),
        })
    }

    /// Run until shutdown is requested.
    pub async fn run(self, resolver: Arc<VirtualModuleResolver>, server: Arc<dyn HostServer>) {
        self.run_until(crate::core::wait_for_shutdown(), move |path| {
            let decision = resolver.hot_update(&path, &server);
            if decision == HotUpdateDecision::Default {
                crate::debug!("watch"; "not a build output: {}", path.display());
            }
        })
        .await;
    }

    /// Event loop feeding debounced paths to `on_change` until `stop` resolves.
    pub(crate) async fn run_until<S, F>(self, stop: S, mut on_change: F)
    where
        S: Future<Output = ()>,
        F: FnMut(PathBuf),
    {
        tokio::pin!(stop);
        let notify_rx = self.notify_rx;
        let mut watcher = self.watcher;
        let mut roots = self.roots;
        let mut debouncer = self.debouncer;

        let (async_tx, mut async_rx) = tokio::sync::mpsc::channel::<notify::Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            let sleep = if roots.has_pending() {
                debouncer.sleep_duration().min(ROOT_RETRY)
            } else {
                debouncer.sleep_duration()
            };

            tokio::select! {
                biased;
                _ = &mut stop => break,
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(sleep) => {
                    roots.maintain(&mut watcher);
                    if let Some(paths) = debouncer.take_if_ready() {
                        for path in paths {
                            on_change(path);
                        }
                    }
                }
            }
        }
    }
}
