//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;

use crate::commands;
use kopier::output::OutputConfig;

/// kopier - Keep a fleet of repositories in sync with shared templates
#[derive(Parser, Debug)]
#[command(name = "kopier")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Update every repository listed in config.yml and open pull requests
    Sync(commands::sync::SyncArgs),

    /// Overlay the templates onto a local checkout without git or network access
    Apply(commands::apply::ApplyArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        env_logger::Builder::from_env(Env::default().default_filter_or(&self.log_level))
            .format_timestamp(None)
            .init();

        let output = OutputConfig::from_env_and_flag(&self.color);
        console::set_colors_enabled(output.use_color);
        console::set_colors_enabled_stderr(output.use_color);

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &output),
            Commands::Apply(args) => commands::apply::execute(args, &output),
        }
    }
}
