//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Bridge a shadow-cljs process into a dev server's module graph
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: bridge.toml, searched upward)
    #[arg(short = 'C', long, global = true, default_value = "bridge.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the compiler in watch mode and forward hot updates
    #[command(visible_alias = "w")]
    Watch {
        /// Builds to watch (default: every configured build)
        #[arg(value_name = "BUILD")]
        builds: Vec<String>,
    },

    /// Compile builds once for production
    #[command(visible_alias = "r")]
    Release {
        /// Builds to release (default: every configured build)
        #[arg(value_name = "BUILD")]
        builds: Vec<String>,
    },

    /// Print the module text generated for a virtual module id
    Load {
        /// e.g. `virtual:shadow-cljs/app` or `virtual:shadow-cljs/app/extra`
        #[arg(value_name = "ID")]
        id: String,

        /// Start the watch process and wait for the build if needed
        #[arg(short, long)]
        watch: bool,
    },

    /// Print a cljs-runtime file with load-order imports injected
    Transform {
        /// File under `<output-dir>/cljs-runtime/`
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,
    },
}

impl Commands {
    /// Build ids selected on the command line; empty means all.
    pub fn builds(&self) -> &[String] {
        match self {
            Self::Watch { builds } | Self::Release { builds } => builds,
            Self::Load { .. } | Self::Transform { .. } => &[],
        }
    }
}
