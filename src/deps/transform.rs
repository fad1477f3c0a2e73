//! Transform hook for files under `<output-dir>/cljs-runtime/`.

use std::path::Path;
use std::sync::Arc;

use super::patch::{RUNTIME_ENV_FILE, apply_idempotent_patch};
use super::rewrite::rewrite;
use super::scan::DependencyScanner;
use crate::config::{RUNTIME_DIR, Session};

/// Patches the runtime bootstrap and injects load-order imports into every
/// other runtime file of a configured build.
pub struct RuntimeTransform {
    session: Arc<Session>,
    scanner: DependencyScanner,
}

impl RuntimeTransform {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            scanner: DependencyScanner::new(),
        }
    }

    /// Transformed text for module `id`, or `None` to leave it untouched.
    pub fn transform(&self, code: &str, id: &str) -> Option<String> {
        let normalized = id.replace('\\', "/");
        if !normalized.contains(&format!("{RUNTIME_DIR}/")) {
            return None;
        }

        let path = Path::new(id);
        if path.file_name().is_some_and(|name| name == RUNTIME_ENV_FILE) {
            return Some(apply_idempotent_patch(code));
        }

        let target = self.session.target_for_path(path)?;
        let deps = self.scanner.scan(&target.runtime_dir_in(self.session.root()));
        Some(rewrite(code, path, &deps))
    }

    /// Forget the scanned map of `build_id` so new namespaces are picked up.
    pub fn invalidate_build(&self, build_id: &str) -> bool {
        self.session
            .target(build_id)
            .is_some_and(|target| {
                self.scanner
                    .invalidate(&target.runtime_dir_in(self.session.root()))
            })
    }
}
