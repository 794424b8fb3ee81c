//! Prospector command-line entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use prospector_app::{
    build_orchestrator, build_registry, init_tracing, load_config, load_definitions,
    load_request, summarize,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "PROSPECTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an enrichment request and print the scored envelope
    Run {
        /// Request JSON file
        request: PathBuf,
        /// Directory for the JSON report (overrides the configured one)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Do not write a report
        #[arg(long)]
        no_store: bool,
    },
    /// Show the execution plan for a request without running it
    Plan {
        /// Request JSON file
        request: PathBuf,
    },
    /// List the registered collectors
    Collectors,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    info!("Starting Prospector v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let registry = build_registry(load_definitions(&config)?)?;

    match cli.command {
        Commands::Run {
            request,
            output,
            no_store,
        } => {
            let request = load_request(&request)?;
            let orchestrator = build_orchestrator(&config, registry, output, !no_store)?;
            let outcome = orchestrator.run(request).await?;
            print_json(&outcome)?;
        }
        Commands::Plan { request } => {
            let request = load_request(&request)?;
            let orchestrator = build_orchestrator(&config, registry, None, false)?;
            print_json(&orchestrator.plan(&request)?)?;
        }
        Commands::Collectors => {
            print_json(&summarize(&registry))?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
