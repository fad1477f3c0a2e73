use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use super::*;
use crate::config::{BuildTarget, CompilerConfig, RuntimeKind, Session};
use crate::error::BridgeError;
use crate::hmr::{HostEnvironment, HostServer, HotUpdateDispatcher, UpdateRecord};
use crate::supervisor::Supervisor;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingServer {
    loaded: Vec<String>,
    sent: Mutex<Vec<UpdateRecord>>,
    invalidated: Mutex<Vec<String>>,
}

struct Env(Arc<RecordingServer>);

impl HostEnvironment for Env {
    fn name(&self) -> &str {
        "ssr"
    }

    fn loaded_module_url(&self, resolved_id: &str) -> Option<String> {
        self.0
            .loaded
            .iter()
            .any(|id| id == resolved_id)
            .then(|| resolved_id.trim_start_matches('\0').to_string())
    }

    fn send(&self, record: &UpdateRecord) {
        self.0.sent.lock().push(record.clone());
    }
}

struct Server(Arc<RecordingServer>);

impl HostServer for Server {
    fn environments(&self) -> Vec<Arc<dyn HostEnvironment>> {
        vec![Arc::new(Env(Arc::clone(&self.0))) as Arc<dyn HostEnvironment>]
    }

    fn invalidate_module(&self, resolved_id: &str) {
        self.0.invalidated.lock().push(resolved_id.to_string());
    }
}

fn session(root: &Path) -> Arc<Session> {
    Arc::new(Session::new(
        root,
        CompilerConfig::default(),
        vec![
            BuildTarget::new("worker", "out/worker", &["main", "extra"])
                .with_runtime(RuntimeKind::NonBrowser("node".into())),
            BuildTarget::new("app", "public/js", &["main"]),
        ],
    ))
}

fn resolver(root: &Path, supervisor: Supervisor) -> VirtualModuleResolver {
    VirtualModuleResolver::new(
        session(root),
        supervisor,
        Arc::new(HotUpdateDispatcher::new(Duration::from_millis(10))),
    )
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

// ============================================================================
// resolve_id / load
// ============================================================================

#[test]
fn test_resolve_id() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());

    assert_eq!(
        resolver.resolve_id("virtual:shadow-cljs/worker").as_deref(),
        Some("\0virtual:shadow-cljs/worker")
    );
    assert!(resolver.resolve_id("./src/main.js").is_none());
    assert!(resolver.resolve_id("virtual:other/worker").is_none());
}

#[tokio::test]
async fn test_load_ignores_other_ids() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());
    assert!(resolver.load("/src/main.js").await.unwrap().is_none());
    assert!(resolver.load("virtual:shadow-cljs/worker").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_build_fails_without_spawning() {
    let dir = TempDir::new().unwrap();
    let supervisor = Supervisor::new();
    let resolver = resolver(dir.path(), supervisor.clone());

    let err = resolver
        .load(&VirtualModuleId::new("admin").resolved())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownBuild(ref id) if id == "admin"));
    assert!(err.to_string().contains("admin"));
    assert!(!supervisor.has_live_process());
}

#[tokio::test]
async fn test_colon_alias_is_unknown_build() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());

    let err = resolver
        .load("\0virtual:shadow-cljs/worker:main")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownBuild(ref id) if id == "worker:main"));
}

#[tokio::test]
async fn test_undeclared_module() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());

    let err = resolver
        .load(&VirtualModuleId::new("worker").with_module("nope").resolved())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownModule { ref module, .. } if module == "nope"));
}

#[tokio::test]
async fn test_missing_artifact_without_process() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());

    let err = resolver
        .load(&VirtualModuleId::new("worker").resolved())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ArtifactMissing { ref build, .. } if build == "worker"));
}

#[tokio::test]
async fn test_load_existing_artifacts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "out/worker/main.js", "export default {fetch() {}};\n");
    write(dir.path(), "out/worker/extra.js", "export const x = 1;\n");
    write(dir.path(), "public/js/main.js", "export const init = () => {};\n");
    let resolver = resolver(dir.path(), Supervisor::new());

    let main = resolver
        .load(&VirtualModuleId::new("worker").resolved())
        .await
        .unwrap()
        .unwrap();
    assert!(main.contains("out/worker/main.js\";"));
    assert!(main.contains("export { default } from"));
    assert!(!main.contains("import.meta.hot"));

    let extra = resolver
        .load(&VirtualModuleId::new("worker").with_module("extra").resolved())
        .await
        .unwrap()
        .unwrap();
    assert!(extra.contains("out/worker/extra.js\";"));
    assert!(!extra.contains("export { default }"));

    let app = resolver
        .load(&VirtualModuleId::new("app").resolved())
        .await
        .unwrap()
        .unwrap();
    assert!(app.contains("import.meta.hot.accept"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_load_suspends_until_build_completes() {
    let dir = TempDir::new().unwrap();
    let supervisor = Supervisor::new();
    let resolver = Arc::new(resolver(dir.path(), supervisor.clone()));

    let script = "sleep 0.5; mkdir -p out/worker; echo 'export default 1;' > out/worker/main.js; \
                  echo '[:worker] build completed'; sleep 30";
    supervisor
        .start(
            "shadow-cljs",
            &["sh".into(), "-c".into(), script.into()],
            dir.path(),
        )
        .await
        .unwrap();

    let task = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move {
            resolver
                .load(&VirtualModuleId::new("worker").resolved())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished(), "load must wait for the artifact");

    let text = tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("load resolves after completion")
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(text.contains("export * from \""));
    assert!(text.contains("out/worker/main.js\";"));

    supervisor.stop().await;
}

// ============================================================================
// hot_update / invalidate
// ============================================================================

#[tokio::test]
async fn test_hot_update_decisions() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());
    let recording = Arc::new(RecordingServer {
        loaded: vec![VirtualModuleId::new("worker").resolved()],
        ..Default::default()
    });
    let server: Arc<dyn HostServer> = Arc::new(Server(Arc::clone(&recording)));

    assert_eq!(
        resolver.hot_update(&dir.path().join("src/core.cljs"), &server),
        HotUpdateDecision::Default
    );
    assert_eq!(
        resolver.hot_update(&dir.path().join("public/js/main.js"), &server),
        HotUpdateDecision::Suppress
    );
    for _ in 0..3 {
        assert_eq!(
            resolver.hot_update(&dir.path().join("out/worker/cljs-runtime/a.js"), &server),
            HotUpdateDecision::Suppress
        );
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let sent = recording.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path, "virtual:shadow-cljs/worker");
}

#[test]
fn test_invalidate_marks_all_module_ids() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver(dir.path(), Supervisor::new());
    let recording = Arc::new(RecordingServer::default());

    resolver.invalidate(&Server(Arc::clone(&recording)), "worker");
    assert_eq!(
        *recording.invalidated.lock(),
        vec![
            "\0virtual:shadow-cljs/worker".to_string(),
            "\0virtual:shadow-cljs/worker/main".to_string(),
            "\0virtual:shadow-cljs/worker/extra".to_string(),
        ]
    );
}
