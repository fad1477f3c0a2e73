//! Idempotency patch for the Closure namespace runtime.
//!
//! `cljs_env.js` bootstraps the global `goog` object. During live reload the
//! generated files are evaluated again while `goog` keeps its registrations,
//! so a second `goog.provide("x")` would throw "Namespace already declared".
//! The patch turns provide/module declarations into no-ops for namespaces
//! that already exist and routes `goog.require` through `goog.module.get`.

/// The runtime bootstrap file inside `cljs-runtime/`.
pub const RUNTIME_ENV_FILE: &str = "cljs_env.js";

/// Flag on `goog` marking the patch as applied.
pub const PATCH_FLAG: &str = "__shadowCljsIdempotentPatched__";

/// Appended verbatim to `cljs_env.js`.
pub const IDEMPOTENT_PATCH: &str = r#"
;(function() {
  if (goog.__shadowCljsIdempotentPatched__) return;
  goog.__shadowCljsIdempotentPatched__ = true;

  goog.provide = function(name) {
    if (goog.isProvided_(name)) return;
    return goog.constructNamespace_.call(this, name);
  };

  var declareModule = goog.module;
  var guardedModule = function(name) {
    if (goog.isProvided_(name)) return;
    return declareModule.call(this, name);
  };
  for (var key in declareModule) {
    if (Object.prototype.hasOwnProperty.call(declareModule, key)) {
      guardedModule[key] = declareModule[key];
    }
  }
  goog.module = guardedModule;

  goog.require = declareModule.get;
})();
"#;

/// Append the patch unless this text already carries it.
pub fn apply_idempotent_patch(code: &str) -> String {
    if code.contains(PATCH_FLAG) {
        return code.to_string();
    }
    let mut out = String::with_capacity(code.len() + IDEMPOTENT_PATCH.len());
    out.push_str(code);
    out.push_str(IDEMPOTENT_PATCH);
    out
}
