//! # kopier CLI
//!
//! This is the binary entry point for the `kopier` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and color output.
//! - Executing the selected command and turning failures into a non-zero
//!   exit status.
//!
//! The template overlay engine, version control client and fleet runner live
//! in the `kopier` library crate; the binary is a thin wrapper around them.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
