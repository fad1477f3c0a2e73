//! Load-order import injection for generated runtime files.
//!
//! Some module loaders start executing a file before the files it
//! `goog.require`s have finished registering their namespaces. Turning each
//! require into an explicit `import` lets the host's module graph enforce
//! the order instead.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::Path;
use std::sync::LazyLock;

use super::DependencyMap;
use super::patch::RUNTIME_ENV_FILE;

/// Bootstrap declaration, always first in a rewritten file.
pub const BOOTSTRAP_IMPORT: &str = "import \"./cljs_env.js\";";

/// Presence check for the bootstrap, tolerant of a missing semicolon.
const BOOTSTRAP_MARKER: &str = "import \"./cljs_env.js\"";

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"goog\.require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid require regex")
});

/// Prepend the bootstrap import and one import per required namespace.
///
/// Requires that the map cannot resolve are left alone. The file never
/// imports itself. The input text follows the header unchanged.
pub fn rewrite(code: &str, self_path: &Path, deps: &DependencyMap) -> String {
    let self_name = self_path.file_name().and_then(|n| n.to_str());
    let mut header = Vec::new();

    if !code.contains(BOOTSTRAP_MARKER) && self_name != Some(RUNTIME_ENV_FILE) {
        header.push(BOOTSTRAP_IMPORT.to_string());
    }

    let mut seen = FxHashSet::default();
    for caps in REQUIRE_RE.captures_iter(code) {
        let Some(file) = caps.get(1).and_then(|ns| deps.get(ns.as_str())) else {
            continue;
        };
        if self_name == Some(file.as_str()) {
            continue;
        }
        if seen.insert(file.as_str()) {
            header.push(format!("import \"./{file}\";"));
        }
    }

    if header.is_empty() {
        return code.to_string();
    }

    // Keep an existing leading bootstrap ahead of the new imports.
    let (lead, body) = match split_leading_bootstrap(code) {
        Some(rest) => (Some(BOOTSTRAP_IMPORT), rest),
        None => (None, code),
    };

    let mut out = String::with_capacity(code.len() + 64 * header.len());
    for line in lead.into_iter().chain(header.iter().map(String::as_str)) {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(body);
    out
}

/// Text after the first line when that line is the bootstrap import,
/// in any line ending and with or without the semicolon.
fn split_leading_bootstrap(code: &str) -> Option<&str> {
    let (first, rest) = code.split_once('\n').unwrap_or((code, ""));
    let first = first.trim();
    let first = first.strip_suffix(';').unwrap_or(first).trim_end();
    (first == BOOTSTRAP_MARKER).then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> DependencyMap {
        [
            ("goog.debug.Error", "goog.debug.error.js"),
            ("cljs.core", "cljs.core.js"),
            ("my.app", "my.app.js"),
        ]
        .into_iter()
        .map(|(ns, file)| (ns.to_string(), file.to_string()))
        .collect()
    }

    #[test]
    fn test_prepends_bootstrap_and_requires() {
        let code = "goog.provide('my.app');\ngoog.require('cljs.core');\ngoog.require(\"goog.debug.Error\");\n";
        let out = rewrite(code, Path::new("/out/cljs-runtime/my.app.js"), &deps());

        let lines: Vec<_> = out.lines().take(3).collect();
        assert_eq!(
            lines,
            vec![
                "import \"./cljs_env.js\";",
                "import \"./cljs.core.js\";",
                "import \"./goog.debug.error.js\";",
            ]
        );
        assert!(out.ends_with(code));
    }

    #[test]
    fn test_duplicate_requires_yield_one_import() {
        let code = "goog.require('cljs.core');\ngoog.require('cljs.core');\n";
        let out = rewrite(code, Path::new("my.app.js"), &deps());
        assert_eq!(out.matches("import \"./cljs.core.js\";").count(), 1);
    }

    #[test]
    fn test_never_imports_itself() {
        let code = "goog.provide('my.app');\ngoog.require('my.app');\ngoog.require('cljs.core');\n";
        let out = rewrite(code, Path::new("/out/cljs-runtime/my.app.js"), &deps());
        assert!(!out.contains("import \"./my.app.js\";"));
        assert!(out.contains("import \"./cljs.core.js\";"));
    }

    #[test]
    fn test_unknown_namespace_is_skipped() {
        let code = "goog.require('not.scanned');\n";
        let out = rewrite(code, Path::new("x.js"), &deps());
        assert_eq!(out, format!("{BOOTSTRAP_IMPORT}\n{code}"));
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let code = "goog.require('cljs.core');\n";
        let once = rewrite(code, Path::new("x.js"), &deps());
        let twice = rewrite(&once, Path::new("x.js"), &deps());

        assert_eq!(twice.matches(BOOTSTRAP_MARKER).count(), 1);
        assert!(twice.starts_with(BOOTSTRAP_IMPORT));
        // Namespace imports are re-derived from the unchanged requires.
        assert_eq!(twice.matches("import \"./cljs.core.js\";").count(), 2);
    }

    #[test]
    fn test_runtime_env_file_gets_no_bootstrap() {
        let out = rewrite("var goog = {};\n", Path::new("cljs_env.js"), &deps());
        assert_eq!(out, "var goog = {};\n");
    }

    #[test]
    fn test_leading_bootstrap_variants_stay_first() {
        for code in [
            "import \"./cljs_env.js\";\r\ngoog.require('cljs.core');\r\n",
            "import \"./cljs_env.js\"\ngoog.require('cljs.core');\n",
            "  import \"./cljs_env.js\" ;\ngoog.require('cljs.core');\n",
        ] {
            let out = rewrite(code, Path::new("x.js"), &deps());
            let lines: Vec<_> = out.lines().take(2).collect();
            assert_eq!(lines, vec![BOOTSTRAP_IMPORT, "import \"./cljs.core.js\";"], "{code:?}");
            assert_eq!(out.matches(BOOTSTRAP_MARKER).count(), 1, "{code:?}");
        }
    }
}
