//! topograph CLI - infrastructure plan to topology conversion
//!
//! This binary provides the command-line interface for the topograph engine.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use topograph::{
    bindings, check_strict, convert, format_binding, format_edge, load_config, load_plan,
    references,
};
use topograph_core::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "topograph")]
#[command(about = "Convert infrastructure plans into topology models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit with an error when any resource failed to map
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a plan into a topology (JSON)
    Convert {
        /// Plan document (`terraform show -json` output)
        plan: PathBuf,

        /// Write the topology here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Print the classified reference edges of a plan
    References {
        /// Plan document
        plan: PathBuf,
    },
    /// Print the variable bindings of a plan
    Bindings {
        /// Plan document
        plan: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Convert { plan, output } => {
            run_convert(&plan, output.as_deref(), &config, cli.strict)
        }
        Commands::References { plan } => {
            let plan = load_plan(&plan)?;
            for edge in references(&plan, &config)? {
                println!("{}", format_edge(&edge));
            }
            Ok(())
        }
        Commands::Bindings { plan } => {
            let plan = load_plan(&plan)?;
            let (found, diagnostics) = bindings(&plan)?;
            for binding in &found {
                println!("{}", format_binding(binding));
            }
            if !diagnostics.is_empty() {
                warn!("{} binding diagnostics", diagnostics.len());
            }
            Ok(())
        }
    }
}

/// Initialize logging system
///
/// Logs go to stderr so topology JSON on stdout stays clean. `RUST_LOG`
/// overrides the default filter.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "topograph={level},topograph_core={level},topograph_engine={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

fn run_convert(plan_path: &Path, output: Option<&Path>, config: &Config, strict: bool) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let (json, outcome) = convert(&plan, config)?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write topology to {}", path.display()))?;
            info!("Wrote topology to {}", path.display());
        }
        None => println!("{json}"),
    }

    if outcome.has_failures() {
        warn!(
            "{} resource(s) failed to map",
            outcome.failed_resources.len()
        );
    }
    if strict {
        check_strict(&outcome)?;
    }
    Ok(())
}
