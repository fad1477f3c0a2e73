//! `load` and `transform` commands: print what the host would receive.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};

use super::host::LogServer;
use crate::bridge::Bridge;
use crate::core::wait_for_shutdown;
use crate::log;
use crate::utils::path::normalize_path;
use crate::virtual_module::is_resolved_virtual_module;

/// Print the wrapper generated for `id`.
///
/// Accepts both the public and the resolved form of the id.
pub async fn load(bridge: &Bridge, id: &str, watch: bool) -> Result<()> {
    let resolved = if is_resolved_virtual_module(id) {
        id.to_string()
    } else {
        bridge
            .resolver()
            .resolve_id(id)
            .ok_or_else(|| anyhow!("`{id}` is not a virtual module id"))?
    };

    if watch {
        bridge.configure_server(Arc::new(LogServer::new())).await?;
    }

    let result = tokio::select! {
        result = bridge.resolver().load(&resolved) => Some(result),
        () = wait_for_shutdown() => None,
    };
    if watch {
        bridge.shutdown().await;
    }

    let Some(result) = result else {
        return Ok(());
    };
    let text = result?.ok_or_else(|| anyhow!("`{id}` is not a virtual module id"))?;
    print_stdout(&text)
}

/// Print `file` after the runtime transform, or report that it is untouched.
pub fn transform(bridge: &Bridge, file: &Path) -> Result<()> {
    let path = normalize_path(file);
    let code = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    match bridge.transform().transform(&code, &path.to_string_lossy()) {
        Some(output) => print_stdout(&output),
        None => {
            log!("deps"; "{} is not a cljs-runtime file of a configured build", path.display());
            Ok(())
        }
    }
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        writeln!(stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
