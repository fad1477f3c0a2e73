//! `resolveId` / `load` / `hotUpdate` hooks for virtual modules.

use std::path::Path;
use std::sync::Arc;

use super::id::{VirtualModuleId, is_resolved_virtual_module, is_virtual_module};
use super::wrapper::build_wrapper;
use crate::artifact::ArtifactWaiter;
use crate::config::Session;
use crate::error::{BridgeError, Result};
use crate::hmr::{HostServer, HotUpdateDispatcher};
use crate::supervisor::Supervisor;
use crate::{debug, log};

/// What the host should do with a file change after [`VirtualModuleResolver::hot_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotUpdateDecision {
    /// Not a build output; the host's default handling applies
    Default,
    /// Build output; the host must not run its default (full) reload
    Suppress,
}

pub struct VirtualModuleResolver {
    session: Arc<Session>,
    waiter: ArtifactWaiter,
    dispatcher: Arc<HotUpdateDispatcher>,
}

impl VirtualModuleResolver {
    pub fn new(
        session: Arc<Session>,
        supervisor: Supervisor,
        dispatcher: Arc<HotUpdateDispatcher>,
    ) -> Self {
        Self {
            session,
            waiter: ArtifactWaiter::new(supervisor),
            dispatcher,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolved id for a virtual module, `None` for anything else.
    pub fn resolve_id(&self, id: &str) -> Option<String> {
        is_virtual_module(id).then(|| format!("\0{id}"))
    }

    /// Module text for a resolved virtual id, `None` for anything else.
    ///
    /// Suspends until the artifact exists when a compiler process is live.
    pub async fn load(&self, resolved: &str) -> Result<Option<String>> {
        if !is_resolved_virtual_module(resolved) {
            return Ok(None);
        }
        let Some(id) = VirtualModuleId::parse_resolved(resolved) else {
            let raw = resolved.trim_start_matches('\0');
            return Err(BridgeError::UnknownBuild(raw.to_string()));
        };

        // e.g. the unsupported `<build>:<module>` alias
        if !id.has_valid_build_id() {
            return Err(BridgeError::UnknownBuild(id.build_id));
        }

        let target = self
            .session
            .target(&id.build_id)
            .ok_or_else(|| BridgeError::UnknownBuild(id.build_id.clone()))?;

        if let Some(module) = &id.module
            && !target.declares_module(module)
        {
            return Err(BridgeError::UnknownModule {
                build: id.build_id.clone(),
                module: module.clone(),
            });
        }

        let path = target.artifact_path(self.session.root(), id.module.as_deref());
        debug!("load"; "{} -> {}", id, path.display());

        let path = self.waiter.wait(&id.build_id, &path).await?;
        let artifact = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| BridgeError::Io(path.clone(), e))?;

        Ok(Some(build_wrapper(&path, &artifact, target.is_browser())))
    }

    /// Decide how the host handles a change to `path`.
    ///
    /// Non-browser outputs are queued on the dispatcher; must be called
    /// inside a tokio runtime.
    pub fn hot_update(&self, path: &Path, server: &Arc<dyn HostServer>) -> HotUpdateDecision {
        let Some(target) = self.session.target_for_path(path) else {
            return HotUpdateDecision::Default;
        };

        if target.is_browser() {
            debug!("hmr"; "{} belongs to browser build {}", path.display(), target.id);
        } else {
            // Fire and forget; the dispatcher logs the outcome.
            let _ = self
                .dispatcher
                .schedule(Arc::clone(&self.session), Arc::clone(server), &target.id);
        }
        HotUpdateDecision::Suppress
    }

    /// Tell the host that `build_id`'s virtual modules are stale.
    pub fn invalidate(&self, server: &dyn HostServer, build_id: &str) {
        let Some(target) = self.session.target(build_id) else {
            return;
        };
        let base = VirtualModuleId::new(&target.id);
        server.invalidate_module(&base.resolved());
        for module in &target.modules {
            server.invalidate_module(&base.clone().with_module(module).resolved());
        }
        log!("bridge"; "build {} completed, invalidated virtual module", build_id);
    }
}
