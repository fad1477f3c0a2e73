//! Namespace → file scanning of a `cljs-runtime/` directory.

use parking_lot::Mutex;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::debug;

/// Namespace → file name (relative to the scanned directory).
pub type DependencyMap = FxHashMap<String, String>;

static DECLARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"goog\.(?:provide|module)\s*\(\s*['"]([^'"]+)['"]"#)
        .expect("valid namespace declaration regex")
});

/// Scans directories once and keeps the result until invalidated.
#[derive(Default)]
pub struct DependencyScanner {
    cache: Mutex<FxHashMap<PathBuf, Arc<DependencyMap>>>,
}

impl DependencyScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached map for `dir`, scanning it on first use.
    pub fn scan(&self, dir: &Path) -> Arc<DependencyMap> {
        if let Some(map) = self.cache.lock().get(dir) {
            return Arc::clone(map);
        }

        let map = Arc::new(scan_directory(dir));
        debug!("deps"; "scanned {} namespaces in {}", map.len(), dir.display());

        // A concurrent scan of the same dir may have landed first; keep it.
        Arc::clone(
            self.cache
                .lock()
                .entry(dir.to_path_buf())
                .or_insert(map),
        )
    }

    /// Drop the cached map for `dir`. Returns whether one was cached.
    pub fn invalidate(&self, dir: &Path) -> bool {
        self.cache.lock().remove(dir).is_some()
    }
}

/// Uncached scan of the `.js` files directly inside `dir`.
///
/// Unreadable files and files without a declaration are skipped. If two
/// files declare the same namespace, the lexicographically first wins.
pub fn scan_directory(dir: &Path) -> DependencyMap {
    let mut files: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "js") && path.is_file())
            .collect(),
        Err(e) => {
            debug!("deps"; "cannot read {}: {}", dir.display(), e);
            return DependencyMap::default();
        }
    };
    files.sort();

    let found: Vec<Option<(String, String)>> = files
        .par_iter()
        .map(|path| {
            let content = fs::read_to_string(path).ok()?;
            let namespace = DECLARE_RE.captures(&content)?.get(1)?.as_str().to_string();
            let file = path.file_name()?.to_str()?.to_string();
            Some((namespace, file))
        })
        .collect();

    let mut map = DependencyMap::default();
    for (namespace, file) in found.into_iter().flatten() {
        map.entry(namespace).or_insert(file);
    }
    map
}
