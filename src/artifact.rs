//! Waiting for build artifacts to appear on disk.

use std::path::{Path, PathBuf};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::debug;
use crate::error::{BridgeError, Result};
use crate::supervisor::Supervisor;

/// Suspends a load until its artifact exists.
///
/// The wait is re-armed by completion markers, never by elapsed time:
/// each completion of the build triggers one re-check of the file.
pub struct ArtifactWaiter {
    supervisor: Supervisor,
}

impl ArtifactWaiter {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    /// Return once `path` exists.
    ///
    /// Fails with [`BridgeError::ArtifactMissing`] when the file is absent
    /// and nothing is running that could produce it, or with
    /// [`BridgeError::ProcessCrash`] when the process dies mid-wait.
    pub async fn wait(&self, build_id: &str, path: &Path) -> Result<PathBuf> {
        // Subscribe first so a completion racing the existence check is kept.
        let mut completions = self.supervisor.completions();

        loop {
            if exists(path).await {
                return Ok(path.to_path_buf());
            }

            let Some(handle) = self.supervisor.existing() else {
                return Err(BridgeError::ArtifactMissing {
                    build: build_id.to_string(),
                    path: path.to_path_buf(),
                });
            };

            debug!("load"; "waiting for {} ({})", build_id, path.display());

            tokio::select! {
                biased;
                open = next_completion(&mut completions, build_id) => {
                    if !open {
                        return Err(self.supervisor.crash_error(build_id));
                    }
                }
                code = handle.wait() => {
                    if exists(path).await {
                        return Ok(path.to_path_buf());
                    }
                    return Err(BridgeError::ProcessCrash {
                        build: build_id.to_string(),
                        code,
                    });
                }
            }
        }
    }
}

/// Next completion of `build_id`. `false` once the stream is closed.
async fn next_completion(rx: &mut broadcast::Receiver<String>, build_id: &str) -> bool {
    loop {
        match rx.recv().await {
            Ok(id) if id == build_id => return true,
            Ok(_) => {}
            // Missed events: re-check the file anyway
            Err(RecvError::Lagged(_)) => return true,
            Err(RecvError::Closed) => return false,
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
