//! Update records pushed through the host's live-update channel.
//!
//! ```json
//! {"type":"module-updated","path":"/@id/__x00__virtual:shadow-cljs/worker",
//!  "acceptedPath":"/@id/__x00__virtual:shadow-cljs/worker","timestamp":1718000000000}
//! ```

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateKind {
    ModuleUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    /// URL of the updated module
    pub path: String,
    /// URL of the module accepting the update (same module: self-accepting)
    pub accepted_path: String,
    /// Dispatch time, milliseconds since the epoch
    pub timestamp: u64,
}

impl UpdateRecord {
    pub fn module_updated(url: impl Into<String>, timestamp: u64) -> Self {
        let url = url.into();
        Self {
            kind: UpdateKind::ModuleUpdated,
            accepted_path: url.clone(),
            path: url,
            timestamp,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
