//! Load-order support for Closure-style generated output.
//!
//! ```text
//! deps/
//! ├── patch.rs      # cljs_env.js idempotency patch
//! ├── rewrite.rs    # goog.require → import injection (pure)
//! ├── scan.rs       # namespace → file map per directory, cached
//! └── transform.rs  # per-file hook combining the three
//! ```

mod patch;
mod rewrite;
mod scan;
mod transform;

pub use patch::{IDEMPOTENT_PATCH, PATCH_FLAG, RUNTIME_ENV_FILE, apply_idempotent_patch};
pub use rewrite::{BOOTSTRAP_IMPORT, rewrite};
pub use scan::{DependencyMap, DependencyScanner, scan_directory};
pub use transform::RuntimeTransform;
