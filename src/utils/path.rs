//! Path normalization utilities.

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// Render a path for an ESM import specifier (forward slashes only).
pub fn to_import_specifier(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push_str(&prefix.as_os_str().to_string_lossy()),
            Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_absolute_missing() {
        let path = Path::new("/definitely/not/here.js");
        assert_eq!(normalize_path(path), PathBuf::from("/definitely/not/here.js"));
    }

    #[test]
    fn test_normalize_relative_is_absolute() {
        assert!(normalize_path(Path::new("out/main.js")).is_absolute());
    }

    #[cfg(unix)]
    #[test]
    fn test_import_specifier() {
        assert_eq!(
            to_import_specifier(Path::new("/project/out/worker/main.js")),
            "/project/out/worker/main.js"
        );
        assert_eq!(to_import_specifier(Path::new("out/main.js")), "out/main.js");
    }
}
