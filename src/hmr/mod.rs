//! Hot-update plumbing for non-browser builds.
//!
//! Browser builds are reloaded by the compiler's own client; everything else
//! is pushed through the host's live-update channel by
//! [`HotUpdateDispatcher`].

mod dispatcher;
mod host;
mod message;

pub use dispatcher::{DEFAULT_DELAY, DispatchSummary, HotUpdateDispatcher, PendingDispatch};
pub use host::{HostEnvironment, HostServer};
pub use message::{UpdateKind, UpdateRecord, now_millis};
