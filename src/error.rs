//! Error taxonomy for the bridge.
//!
//! Lifecycle and resolution failures surface as [`BridgeError`] and fail the
//! single operation that hit them. Scanning and rewriting never produce
//! errors; they degrade to partial results instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The compiler executable could not be started.
    #[error("{0}")]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("build `{0}` not found in config")]
    UnknownBuild(String),

    #[error("module `{module}` is not declared by build `{build}`")]
    UnknownModule { build: String, module: String },

    /// Artifact absent and no live compiler process to wait on.
    #[error("build output file not found: {}\nensure `release {build}` succeeded or start the watch process", path.display())]
    ArtifactMissing { build: String, path: PathBuf },

    /// The compiler exited while a load was waiting on it.
    #[error("compiler exited ({}) while build `{build}` was pending", describe_code(*code))]
    ProcessCrash { build: String, code: Option<i32> },

    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("`{program}` not found. Install shadow-cljs as a project dependency and run through npx/pnpm, or set `compiler.command`")]
    NotFound { program: String },

    #[error("failed to start `{program}`")]
    Os {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}{}", format_detail(detail))]
    Failed {
        program: String,
        status: String,
        detail: String,
    },
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!("\n{detail}")
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code, killed or never started".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_build_names_id() {
        let err = BridgeError::UnknownBuild("worker".into());
        assert_eq!(err.to_string(), "build `worker` not found in config");
    }

    #[test]
    fn test_process_crash_display() {
        let err = BridgeError::ProcessCrash {
            build: "app".into(),
            code: Some(1),
        };
        assert!(err.to_string().contains("exit code 1"));

        let err = BridgeError::ProcessCrash {
            build: "app".into(),
            code: None,
        };
        assert!(err.to_string().contains("no exit code"));
    }

    #[test]
    fn test_spawn_not_found_has_hint() {
        let err: BridgeError = SpawnError::NotFound {
            program: "shadow-cljs".into(),
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("`shadow-cljs` not found"));
        assert!(msg.contains("compiler.command"));
    }

    #[test]
    fn test_artifact_missing_display() {
        let err = BridgeError::ArtifactMissing {
            build: "app".into(),
            path: PathBuf::from("out/app/main.js"),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/app/main.js"));
        assert!(msg.contains("release app"));
    }
}
