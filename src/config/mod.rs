//! Bridge configuration management for `bridge.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── build.rs   # [builds.<id>] sections, BuildTarget, RuntimeKind
//! ├── error.rs   # ConfigError, ConfigDiagnostics
//! └── mod.rs     # BridgeConfig, CompilerConfig, Session (this file)
//! ```
//!
//! # Sections
//!
//! | Section         | Purpose                                           |
//! |-----------------|---------------------------------------------------|
//! | `[compiler]`    | External compiler command, config merge, debounce |
//! | `[builds.<id>]` | Output directory, modules and runtime per build   |

mod build;
mod error;

pub use build::{BuildSection, BuildTarget, RUNTIME_DIR, RuntimeKind, is_valid_build_id};
pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};

use crate::log;
use crate::utils::path::normalize_path;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Default config file name
pub const DEFAULT_CONFIG_FILE: &str = "bridge.toml";

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing bridge.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Build sections keyed by build id
    #[serde(default)]
    pub builds: BTreeMap<String, BuildSection>,
}

/// `[compiler]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// Display name for logging (defaults to the last command element)
    pub name: Option<String>,
    /// Program and leading arguments, e.g. `["npx", "shadow-cljs"]`
    pub command: Vec<String>,
    /// Configuration override passed as `--config-merge <value>`
    pub config_merge: Option<String>,
    /// Hot-update debounce window in milliseconds
    pub debounce_ms: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            name: None,
            command: vec!["shadow-cljs".to_string()],
            config_merge: None,
            debounce_ms: 50,
        }
    }
}

impl CompilerConfig {
    /// Name used as log prefix.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| {
            self.command
                .last()
                .map(String::as_str)
                .unwrap_or("shadow-cljs")
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Full argument vector for `<command> <action> <ids..> [--config-merge X]`.
    pub fn invocation(&self, action: &str, build_ids: &[String]) -> Vec<String> {
        let mut args: Vec<String> = self.command.clone();
        args.push(action.to_string());
        args.extend(build_ids.iter().cloned());
        if let Some(merge) = &self.config_merge {
            args.push("--config-merge".to_string());
            args.push(merge.clone());
        }
        args
    }
}

impl BridgeConfig {
    /// Load configuration, searching upward from cwd for `config_name`.
    ///
    /// The project root is the config file's parent directory.
    pub fn load(config_name: &Path) -> Result<Self, ConfigError> {
        let path = find_config_file(config_name)
            .ok_or_else(|| ConfigError::NotFound(config_name.to_path_buf()))?;
        Self::from_path(&path)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path with unknown field detection.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
        config.root = path.parent().map(normalize_path).unwrap_or_default();
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Validate every section, collecting all problems before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        if self.compiler.command.is_empty() {
            diag.error_with_hint(
                "compiler.command",
                "compiler command is empty",
                "e.g. `command = [\"npx\", \"shadow-cljs\"]`",
            );
        }
        if self.builds.is_empty() {
            diag.error_with_hint(
                "builds",
                "no builds found",
                "add a `[builds.<id>]` section with `output-dir` and `modules`",
            );
        }
        for (id, section) in &self.builds {
            section.validate(id, &mut diag);
        }

        diag.into_result()
    }

    /// Validate and freeze into a session containing the selected builds.
    ///
    /// An empty selection keeps every configured build.
    pub fn into_session(self, selected: &[String]) -> Result<Session, ConfigError> {
        self.validate()?;

        let available = self.builds.keys().cloned().collect::<Vec<_>>().join(", ");
        for id in selected {
            if !self.builds.contains_key(id) {
                return Err(ConfigError::UnknownBuild {
                    id: id.clone(),
                    path: self.config_path.clone(),
                    available,
                });
            }
        }

        let targets = self
            .builds
            .into_iter()
            .filter(|(id, _)| selected.is_empty() || selected.contains(id))
            .map(|(id, section)| section.into_target(id))
            .collect();

        Ok(Session::new(self.root, self.compiler, targets))
    }
}

/// Search upward from cwd for the config file.
fn find_config_file(name: &Path) -> Option<PathBuf> {
    if name.is_absolute() {
        return name.exists().then(|| name.to_path_buf());
    }
    let cwd = std::env::current_dir().ok()?;
    cwd.ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

// ============================================================================
// Session
// ============================================================================

/// Immutable view of the configured builds for one host session.
///
/// Every other component looks targets up here by id; nothing mutates it
/// after creation.
#[derive(Debug, Clone)]
pub struct Session {
    root: PathBuf,
    compiler: CompilerConfig,
    targets: BTreeMap<String, BuildTarget>,
}

impl Session {
    pub fn new(root: impl Into<PathBuf>, compiler: CompilerConfig, targets: Vec<BuildTarget>) -> Self {
        Self {
            root: root.into(),
            compiler,
            targets: targets.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compiler(&self) -> &CompilerConfig {
        &self.compiler
    }

    pub fn target(&self, id: &str) -> Option<&BuildTarget> {
        self.targets.get(id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &BuildTarget> {
        self.targets.values()
    }

    pub fn build_ids(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Target whose output directory contains `path`, deepest first for
    /// nested output directories.
    pub fn target_for_path(&self, path: &Path) -> Option<&BuildTarget> {
        self.targets
            .values()
            .map(|target| (target, target.output_dir_in(&self.root)))
            .filter(|(_, dir)| path.starts_with(dir))
            .max_by_key(|(_, dir)| dir.components().count())
            .map(|(target, _)| target)
    }
}
