//! shadow-bridge: a long-running shadow-cljs process inside a dev server's
//! module graph.
//!
//! One supervised `shadow-cljs watch` process per host process. Its build
//! outputs are exposed as `virtual:shadow-cljs/<build>` modules, and its
//! rebuilds become targeted hot updates instead of full reloads.

pub mod artifact;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod core;
pub mod deps;
pub mod error;
pub mod hmr;
pub mod logger;
pub mod supervisor;
pub mod utils;
pub mod virtual_module;
pub mod watch;

pub use bridge::Bridge;
pub use error::{BridgeError, Result, SpawnError};
