//! Seams to the host tool's module graph and live-update channel.

use super::UpdateRecord;

/// The host's dev server.
pub trait HostServer: Send + Sync {
    /// Active execution contexts (client, SSR, workers, ...).
    fn environments(&self) -> Vec<std::sync::Arc<dyn HostEnvironment>>;

    /// Drop the cached transform result of a module so the next request
    /// reloads it.
    fn invalidate_module(&self, _resolved_id: &str) {}
}

/// One execution context with its own module graph.
pub trait HostEnvironment: Send + Sync {
    fn name(&self) -> &str;

    /// URL of the module if this context has loaded it.
    fn loaded_module_url(&self, resolved_id: &str) -> Option<String>;

    /// Push one record through this context's live-update channel.
    fn send(&self, record: &UpdateRecord);
}
