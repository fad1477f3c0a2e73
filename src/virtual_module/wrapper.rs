//! Re-export wrapper synthesized for a loaded artifact.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::utils::path::to_import_specifier;

static DEFAULT_EXPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\bexport default ").expect("valid default export regex"));

/// Self-accepting hook so the host does not full-reload browser builds;
/// the compiler's own client applies the update.
pub const SELF_ACCEPT_HOOK: &str = r#"
;(function() {
  if (import.meta.hot) {
    import.meta.hot.accept(function() {});
  }
})();
"#;

/// Whether the artifact text declares a default export.
pub fn has_default_export(code: &str) -> bool {
    DEFAULT_EXPORT_RE.is_match(code)
}

/// Module text re-exporting the artifact at `path`.
pub fn build_wrapper(path: &Path, artifact: &str, browser: bool) -> String {
    let spec = to_import_specifier(path);
    let mut out = format!("export * from \"{spec}\";\n");
    if has_default_export(artifact) {
        out.push_str(&format!("export {{ default }} from \"{spec}\";\n"));
    }
    if browser {
        out.push_str(SELF_ACCEPT_HOOK);
    }
    out
}
