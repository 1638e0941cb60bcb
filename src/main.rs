//! loadr - serve typed templates with live reload.

mod cli;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use loadr::config::{Config, init_config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    loadr::logger::set_verbose(cli.verbose);

    let mut config = Config::load(&cli.config)?;
    apply_overrides(&mut config, &cli.command);
    config.validate()?;
    init_config(config);

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(&cli.config),
        Commands::Check { .. } => cli::serve::check(),
    }
}

/// CLI flags take precedence over `loadr.toml`.
fn apply_overrides(config: &mut Config, command: &Commands) {
    match command {
        Commands::Serve {
            templates,
            interface,
            port,
            live,
        } => {
            if let Some(dir) = templates {
                config.templates.dir = dir.clone();
            }
            if let Some(interface) = interface {
                config.serve.interface = *interface;
            }
            if let Some(port) = port {
                config.serve.port = *port;
            }
            if let Some(live) = live {
                config.live_reload.enable = *live;
            }
        }
        Commands::Check { templates } => {
            if let Some(dir) = templates {
                config.templates.dir = dir.clone();
            }
        }
    }
}
