//! Composition root: one bridge per host session.
//!
//! Wires the process supervisor, virtual module resolver, runtime transform
//! and hot-update dispatcher together for the two host lifecycles:
//!
//! - **serve** ([`Bridge::configure_server`]): long-lived `watch` process,
//!   virtual modules invalidated as builds complete
//! - **build** ([`Bridge::build_start`]): one-shot `release` compile
//!
//! All bridges in a process share [`Supervisor::global`] unless built with
//! [`Bridge::with_supervisor`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Session;
use crate::deps::RuntimeTransform;
use crate::error::{BridgeError, Result, SpawnError};
use crate::hmr::{HostServer, HotUpdateDispatcher};
use crate::supervisor::{ProcessHandle, Subscription, Supervisor};
use crate::utils::exec::Cmd;
use crate::virtual_module::VirtualModuleResolver;
use crate::{debug, log};

pub struct Bridge {
    session: Arc<Session>,
    supervisor: Supervisor,
    resolver: Arc<VirtualModuleResolver>,
    transform: Arc<RuntimeTransform>,
    subscription: Mutex<Option<Subscription>>,
}

impl Bridge {
    pub fn new(session: Session) -> Self {
        Self::with_supervisor(session, Supervisor::global())
    }

    pub fn with_supervisor(session: Session, supervisor: Supervisor) -> Self {
        let session = Arc::new(session);
        let dispatcher = Arc::new(HotUpdateDispatcher::new(session.compiler().debounce()));
        let resolver = Arc::new(VirtualModuleResolver::new(
            Arc::clone(&session),
            supervisor.clone(),
            dispatcher,
        ));
        let transform = Arc::new(RuntimeTransform::new(Arc::clone(&session)));

        Self {
            session,
            supervisor,
            resolver,
            transform,
            subscription: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn resolver(&self) -> &Arc<VirtualModuleResolver> {
        &self.resolver
    }

    pub fn transform(&self) -> &Arc<RuntimeTransform> {
        &self.transform
    }

    /// Serve mode: make sure a `watch` process runs and keep `server`'s
    /// module graph in sync with completed builds.
    ///
    /// A live process is reused. Calling this again replaces the previous
    /// server's listener.
    pub async fn configure_server(&self, server: Arc<dyn HostServer>) -> Result<ProcessHandle> {
        let compiler = self.session.compiler();
        let command = compiler.invocation("watch", &self.session.build_ids());

        let handle = self
            .supervisor
            .start(compiler.display_name(), &command, self.session.root())
            .await?;

        let resolver = Arc::clone(&self.resolver);
        let transform = Arc::clone(&self.transform);
        let subscription = self.supervisor.subscribe_on_completion(move |build_id| {
            if transform.invalidate_build(build_id) {
                debug!("deps"; "dropped dependency map of {}", build_id);
            }
            resolver.invalidate(server.as_ref(), build_id);
        });

        // The replaced subscription unsubscribes on drop
        drop(self.subscription.lock().replace(subscription));
        Ok(handle)
    }

    /// Build mode: run `release` once, then check every primary artifact.
    pub async fn build_start(&self) -> Result<()> {
        let compiler = self.session.compiler();
        let ids = self.session.build_ids();
        let command = compiler.invocation("release", &ids);
        let root = self.session.root().to_path_buf();

        log!(compiler.display_name(); "release {}", ids.join(", "));

        let program = command.first().cloned().unwrap_or_default();
        tokio::task::spawn_blocking(move || Cmd::from_slice(&command).cwd(&root).pty(true).run())
            .await
            .map_err(|e| SpawnError::Os {
                program,
                source: std::io::Error::other(e),
            })??;

        for target in self.session.targets() {
            let path = target.artifact_path(self.session.root(), None);
            if !path.exists() {
                return Err(BridgeError::ArtifactMissing {
                    build: target.id.clone(),
                    path,
                });
            }
        }

        log!("bridge"; "release finished: {}", ids.join(", "));
        Ok(())
    }

    /// Drop the completion listener and stop the compiler process tree.
    ///
    /// Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.unsubscribe();
        }
        self.supervisor.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildTarget, CompilerConfig, RuntimeKind};
    use crate::hmr::HostEnvironment;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct InvalidationLog(Mutex<Vec<String>>);

    impl HostServer for InvalidationLog {
        fn environments(&self) -> Vec<Arc<dyn HostEnvironment>> {
            Vec::new()
        }

        fn invalidate_module(&self, resolved_id: &str) {
            self.0.lock().push(resolved_id.to_string());
        }
    }

    fn session(root: &Path, script: &str) -> Session {
        session_with(root, vec!["sh".into(), "-c".into(), script.into()])
    }

    fn session_with(root: &Path, command: Vec<String>) -> Session {
        let compiler = CompilerConfig {
            name: Some("shadow-cljs".into()),
            command,
            ..Default::default()
        };
        Session::new(
            root,
            compiler,
            vec![
                BuildTarget::new("worker", "out/worker", &["main"])
                    .with_runtime(RuntimeKind::NonBrowser("node".into())),
            ],
        )
    }

    #[tokio::test]
    async fn test_build_start_missing_compiler() {
        let dir = TempDir::new().unwrap();
        let session = session_with(dir.path(), vec!["shadow-bridge-missing-compiler".into()]);
        let bridge = Bridge::with_supervisor(session, Supervisor::new());

        let err = bridge.build_start().await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Spawn(SpawnError::NotFound { ref program })
                if program == "shadow-bridge-missing-compiler"
        ));
    }

    #[tokio::test]
    async fn test_shutdown_without_process() {
        let dir = TempDir::new().unwrap();
        let bridge = Bridge::with_supervisor(session(dir.path(), "true"), Supervisor::new());
        bridge.shutdown().await;
        bridge.shutdown().await;
        assert!(!bridge.supervisor().has_live_process());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_start_verifies_artifacts() {
        let dir = TempDir::new().unwrap();
        let bridge = Bridge::with_supervisor(session(dir.path(), "true"), Supervisor::new());
        let err = bridge.build_start().await.unwrap_err();
        assert!(matches!(err, BridgeError::ArtifactMissing { ref build, .. } if build == "worker"));

        let script = "mkdir -p out/worker && echo 'export default 1;' > out/worker/main.js";
        let bridge = Bridge::with_supervisor(session(dir.path(), script), Supervisor::new());
        bridge.build_start().await.unwrap();
        assert!(dir.path().join("out/worker/main.js").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_configure_server_invalidates_on_completion() {
        let dir = TempDir::new().unwrap();
        let script = "sleep 0.2; echo '[:worker] build completed'; sleep 30";
        let bridge = Bridge::with_supervisor(session(dir.path(), script), Supervisor::new());
        let server = Arc::new(InvalidationLog::default());

        let first = bridge
            .configure_server(Arc::clone(&server) as Arc<dyn HostServer>)
            .await
            .unwrap();
        let second = bridge
            .configure_server(Arc::clone(&server) as Arc<dyn HostServer>)
            .await
            .unwrap();
        assert!(first.ptr_eq(&second));

        // Waiters can wake before listeners finish, so poll the log
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while server.0.lock().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Only the latest listener is registered
        assert_eq!(
            *server.0.lock(),
            vec![
                "\0virtual:shadow-cljs/worker".to_string(),
                "\0virtual:shadow-cljs/worker/main".to_string(),
            ]
        );

        bridge.shutdown().await;
        assert!(!bridge.supervisor().has_live_process());
    }
}
