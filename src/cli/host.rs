//! Stand-in host for running the bridge without a dev server.
//!
//! Every virtual module counts as loaded, update records are printed as
//! JSON and invalidations are logged.

use std::sync::Arc;

use crate::hmr::{HostEnvironment, HostServer, UpdateRecord};
use crate::virtual_module::RESOLVED_MARKER;
use crate::{debug, log};

pub struct LogServer {
    env: Arc<LogEnvironment>,
}

impl LogServer {
    pub fn new() -> Self {
        Self {
            env: Arc::new(LogEnvironment),
        }
    }
}

impl Default for LogServer {
    fn default() -> Self {
        Self::new()
    }
}

impl HostServer for LogServer {
    fn environments(&self) -> Vec<Arc<dyn HostEnvironment>> {
        vec![Arc::clone(&self.env) as Arc<dyn HostEnvironment>]
    }

    fn invalidate_module(&self, resolved_id: &str) {
        debug!("hmr"; "invalidated {}", resolved_id.trim_start_matches(RESOLVED_MARKER));
    }
}

struct LogEnvironment;

impl HostEnvironment for LogEnvironment {
    fn name(&self) -> &str {
        "standalone"
    }

    fn loaded_module_url(&self, resolved_id: &str) -> Option<String> {
        Some(resolved_id.trim_start_matches(RESOLVED_MARKER).to_string())
    }

    fn send(&self, record: &UpdateRecord) {
        log!("hmr"; "{}", record.to_json());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_module_is_loaded() {
        let server = LogServer::new();
        let envs = server.environments();
        assert_eq!(envs.len(), 1);
        assert_eq!(envs[0].name(), "standalone");
        assert_eq!(
            envs[0].loaded_module_url("\0virtual:shadow-cljs/worker").as_deref(),
            Some("virtual:shadow-cljs/worker")
        );
    }
}
