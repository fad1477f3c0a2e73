//! `release` command.

use anyhow::Result;

use crate::bridge::Bridge;
use crate::logger::status_success;

pub async fn run(bridge: &Bridge) -> Result<()> {
    bridge.build_start().await?;

    let outputs: Vec<String> = bridge
        .session()
        .targets()
        .map(|target| {
            target
                .artifact_path(bridge.session().root(), None)
                .display()
                .to_string()
        })
        .collect();
    status_success(&format!("release ready: {}", outputs.join(", ")));
    Ok(())
}
