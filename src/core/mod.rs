//! Process-wide state shared by the CLI and the bridge.

mod state;

pub use state::{is_shutdown, request_shutdown, setup_shutdown_handler, wait_for_shutdown};
