//! Apply command implementation
//!
//! Runs the overlay engine against a local checkout, without git or network
//! access:
//! 1. Load the checkout's `service-config.yaml`
//! 2. Snapshot the checkout paths the template set can write
//! 3. Resolve, render and overlay its template set
//! 4. Report what the overlay added or modified

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use kopier::config::RepoConfig;
use kopier::filesystem::MemoryFS;
use kopier::output::{self, OutputConfig};
use kopier::phases::{apply_templates, detect, template_paths};

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Templates root holding one template set per repository type
    #[arg(short, long, value_name = "DIR", default_value = "templates", env = "KOPIER_TEMPLATES")]
    pub templates: PathBuf,

    /// Checkout to update (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub target: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the apply command
pub fn execute(args: ApplyArgs, out: &OutputConfig) -> Result<()> {
    let start_time = Instant::now();
    let target = match args.target {
        Some(target) => target,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };

    let config = RepoConfig::load_from_checkout(&target)?;
    // The overlay never deletes, so only the template set's paths can change.
    let paths = template_paths(&config, &args.templates)?;
    let baseline = MemoryFS::load_paths(&target, &paths)?;
    let report = apply_templates(&config, &args.templates, &target)?;
    let changes = detect::snapshot_diff_paths(&baseline, &target, &paths)?;

    if args.quiet {
        return Ok(());
    }

    println!(
        "{} Applied {} from {}",
        output::emoji(out, "📋", "[APPLY]"),
        if config.title.is_empty() {
            config.kind.as_str()
        } else {
            config.title.as_str()
        },
        report.template_set.display()
    );
    for path in &report.render.untemplated {
        println!("   {} was not templated", path.display());
    }
    if !report.overlay.ignored.is_empty() {
        println!("   {} paths ignored", report.overlay.ignored.len());
    }

    if changes.is_empty() {
        println!(
            "{} Nothing to update ({:.2}s)",
            output::emoji(out, "✅", "[OK]"),
            start_time.elapsed().as_secs_f64()
        );
    } else {
        println!(
            "{} {} files changed ({:.2}s)",
            output::emoji(out, "✏️", "[CHANGED]"),
            changes.len(),
            start_time.elapsed().as_secs_f64()
        );
        for change in changes.iter() {
            println!("{}", output::change_line(out, change));
        }
    }

    Ok(())
}
