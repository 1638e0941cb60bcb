//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// loadr template server CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: loadr.toml)
    #[arg(short = 'C', long, default_value = loadr::config::CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve page templates over HTTP
    #[command(visible_alias = "s")]
    Serve {
        /// Template directory (relative to the config file)
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        templates: Option<PathBuf>,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Reload browsers when templates change
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        live: Option<bool>,
    },

    /// Load and validate every page template, then exit
    #[command(visible_alias = "c")]
    Check {
        /// Template directory (relative to the config file)
        #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
        templates: Option<PathBuf>,
    },
}
