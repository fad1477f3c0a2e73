//! Command-line interface module.

mod args;
mod host;
pub mod inspect;
pub mod release;
pub mod watch;

pub use args::{Cli, Commands};
pub use host::LogServer;
