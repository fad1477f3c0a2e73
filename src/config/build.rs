//! Build target configuration.
//!
//! # Example
//!
//! ```toml
//! [builds.app]
//! output-dir = "public/js"
//! modules = ["main"]
//! init-fn = "my.app/init"
//!
//! [builds.worker]
//! output-dir = "out/worker"
//! modules = ["main", "extra"]
//! runtime = "node"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::ConfigDiagnostics;

/// Subdirectory holding one compiled file per namespace.
pub const RUNTIME_DIR: &str = "cljs-runtime";

/// Raw `[builds.<id>]` section as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildSection {
    pub output_dir: Option<PathBuf>,
    pub modules: Vec<String>,
    pub runtime: Option<RuntimeKind>,
    pub init_fn: Option<String>,
}

impl BuildSection {
    /// Validate this section, reporting every problem against `builds.<id>`.
    pub fn validate(&self, id: &str, diag: &mut ConfigDiagnostics) {
        if !is_valid_build_id(id) {
            diag.error_with_hint(
                format!("builds.{id}"),
                format!("build id \"{id}\" contains unsupported characters"),
                "use letters, digits, `-` and `_` only, so completion markers can be matched",
            );
        }
        if self.output_dir.is_none() {
            diag.error(
                format!("builds.{id}.output-dir"),
                format!("no output-dir found for build \"{id}\""),
            );
        }
        if self.modules.is_empty() {
            diag.error_with_hint(
                format!("builds.{id}.modules"),
                format!("no modules found for build \"{id}\""),
                "declare at least one module, e.g. `modules = [\"main\"]`",
            );
        }
        if self.modules.iter().any(|m| m.is_empty() || m.contains('/')) {
            diag.error(
                format!("builds.{id}.modules"),
                "module names must be non-empty and must not contain `/`",
            );
        }
    }

    /// Freeze into an immutable target. Call only after `validate` passed.
    pub(super) fn into_target(self, id: String) -> BuildTarget {
        BuildTarget {
            id,
            output_dir: self.output_dir.unwrap_or_default(),
            modules: self.modules,
            runtime: self.runtime.unwrap_or_default(),
            init_fn: self.init_fn,
        }
    }
}

/// Build ids must survive the `[:<id>] build completed` marker round trip.
pub fn is_valid_build_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// RuntimeKind
// ============================================================================

/// Where the compiled output runs.
///
/// Browser builds ship their own hot-reload channel, so the bridge never
/// pushes updates for them. Any runtime name other than `browser` counts as
/// non-browser.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeKind {
    #[default]
    Browser,
    NonBrowser(String),
}

impl RuntimeKind {
    pub fn is_browser(&self) -> bool {
        matches!(self, Self::Browser)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Browser => "browser",
            Self::NonBrowser(name) => name,
        }
    }
}

impl From<String> for RuntimeKind {
    fn from(value: String) -> Self {
        if value == "browser" {
            Self::Browser
        } else {
            Self::NonBrowser(value)
        }
    }
}

impl From<RuntimeKind> for String {
    fn from(value: RuntimeKind) -> Self {
        value.name().to_string()
    }
}

// ============================================================================
// BuildTarget
// ============================================================================

/// One logical compilation unit. Immutable once the session is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub id: String,
    /// Output directory, relative to the project root unless absolute
    pub output_dir: PathBuf,
    /// Module names; the first one is the primary entry
    pub modules: Vec<String>,
    pub runtime: RuntimeKind,
    /// Qualified symbol invoked after load
    pub init_fn: Option<String>,
}

impl BuildTarget {
    pub fn new(id: impl Into<String>, output_dir: impl Into<PathBuf>, modules: &[&str]) -> Self {
        Self {
            id: id.into(),
            output_dir: output_dir.into(),
            modules: modules.iter().map(|m| (*m).to_string()).collect(),
            runtime: RuntimeKind::Browser,
            init_fn: None,
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeKind) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn is_browser(&self) -> bool {
        self.runtime.is_browser()
    }

    /// Primary entry module name.
    pub fn primary_module(&self) -> &str {
        self.modules.first().map(String::as_str).unwrap_or("main")
    }

    pub fn declares_module(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    pub fn output_dir_in(&self, root: &Path) -> PathBuf {
        root.join(&self.output_dir)
    }

    pub fn runtime_dir_in(&self, root: &Path) -> PathBuf {
        self.output_dir_in(root).join(RUNTIME_DIR)
    }

    /// Expected artifact path for `module` (primary entry when `None`).
    pub fn artifact_path(&self, root: &Path, module: Option<&str>) -> PathBuf {
        let module = module.unwrap_or_else(|| self.primary_module());
        self.output_dir_in(root).join(format!("{module}.js"))
    }
}
