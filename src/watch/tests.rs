use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use super::OutputWatcher;
use super::debouncer::{DEBOUNCE_MS, Debouncer, is_temp_file};

fn make_event(paths: Vec<&str>, kind: notify::EventKind) -> notify::Event {
    notify::Event {
        kind,
        paths: paths.into_iter().map(PathBuf::from).collect(),
        attrs: Default::default(),
    }
}

fn modify_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Data(
        notify::event::DataChange::Any,
    ))
}

fn metadata_kind() -> notify::EventKind {
    notify::EventKind::Modify(notify::event::ModifyKind::Metadata(
        notify::event::MetadataKind::WriteTime,
    ))
}

fn create_kind() -> notify::EventKind {
    notify::EventKind::Create(notify::event::CreateKind::File)
}

fn remove_kind() -> notify::EventKind {
    notify::EventKind::Remove(notify::event::RemoveKind::File)
}

// ============================================================================
// Debouncer
// ============================================================================

#[test]
fn test_debouncer_empty() {
    let debouncer = Debouncer::new();
    assert!(!debouncer.is_ready());
    assert_eq!(debouncer.sleep_duration(), Duration::from_secs(86400));
}

#[test]
fn test_debouncer_dedups_paths() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/out/worker/main.js"], create_kind()));
    debouncer.add_event(&make_event(vec!["/out/worker/main.js"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/out/worker/cljs-runtime/a.js"], modify_kind()));
    assert_eq!(debouncer.changes.len(), 2);
}

#[test]
fn test_debouncer_ignores_noise() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/out/worker/main.js"], metadata_kind()));
    debouncer.add_event(&make_event(vec!["/out/worker/main.js"], remove_kind()));
    debouncer.add_event(&make_event(vec!["/out/worker/.main.js.swp"], modify_kind()));
    debouncer.add_event(&make_event(vec!["/out/worker/main.js~"], modify_kind()));
    assert!(debouncer.changes.is_empty());
    assert!(debouncer.last_event.is_none());
}

#[test]
fn test_debouncer_ready_after_quiet_period() {
    let mut debouncer = Debouncer::new();
    debouncer.add_event(&make_event(vec!["/out/worker/main.js"], modify_kind()));
    assert!(debouncer.take_if_ready().is_none());

    std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
    let paths = debouncer.take_if_ready().unwrap();
    assert_eq!(paths, vec![PathBuf::from("/out/worker/main.js")]);
    assert!(debouncer.take_if_ready().is_none());
}

#[test]
fn test_temp_files() {
    assert!(is_temp_file(Path::new("/out/main.js.tmp")));
    assert!(is_temp_file(Path::new("/out/.main.js")));
    assert!(is_temp_file(Path::new("/out/main.js~")));
    assert!(!is_temp_file(Path::new("/out/main.js")));
}

// ============================================================================
// Watcher
// ============================================================================

async fn first_change(watcher: OutputWatcher, write: impl Future<Output = ()>) -> Option<PathBuf> {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let watch = watcher.run_until(
        async {
            let _ = stop_rx.await;
        },
        move |path| {
            let _ = tx.send(path);
        },
    );
    let driver = async {
        write.await;
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .ok()
            .flatten();
        let _ = stop_tx.send(());
        got
    };

    let ((), got) = tokio::join!(watch, driver);
    got
}

#[tokio::test]
async fn test_watcher_reports_written_file() {
    let dir = TempDir::new().unwrap();
    let out = crate::utils::path::normalize_path(dir.path()).join("out/worker");
    std::fs::create_dir_all(&out).unwrap();

    let watcher = OutputWatcher::with_paths(vec![out.clone()]).unwrap();
    let file = out.join("main.js");
    let got = first_change(watcher, async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(&file, "export default 1;").unwrap();
    })
    .await;

    assert_eq!(got, Some(file));
}

#[tokio::test]
async fn test_watcher_attaches_late_root() {
    let dir = TempDir::new().unwrap();
    let out = crate::utils::path::normalize_path(dir.path()).join("out/worker");

    let watcher = OutputWatcher::with_paths(vec![out.clone()]).unwrap();
    let file = out.join("main.js");
    let got = first_change(watcher, async {
        std::fs::create_dir_all(&out).unwrap();
        // Longer than the root retry interval
        tokio::time::sleep(Duration::from_millis(900)).await;
        std::fs::write(&file, "export default 1;").unwrap();
    })
    .await;

    assert_eq!(got, Some(file));
}
