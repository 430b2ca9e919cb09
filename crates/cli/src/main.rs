//! CiteForge command line
//!
//! - `search`: retrieve every work matching a query and write its citation graph
//! - `bfs`: walk citations outward from seed works and write the graph
//! - `inspect`: summarize a graph file

mod commands;

use citeforge_common::{config::AppConfig, metrics, telemetry};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "citeforge",
    about = "Crawl OpenAlex works into citation graphs",
    version
)]
pub struct Cli {
    /// Configuration file (defaults to config/default, config/<APP_ENV>, config/local)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve all works matching a query
    Search(SearchArgs),
    /// Breadth-first crawl of citations from seed works
    Bfs(BfsArgs),
    /// Print a summary of a graph CSV file
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Filter predicate (repeatable)
    #[arg(short = 'f', long = "filter", value_name = "FIELD:VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Free-text search
    #[arg(short = 's', long)]
    search: Option<String>,

    /// Sort keys, comma separated
    #[arg(long, value_delimiter = ',')]
    sort: Vec<String>,

    /// Cap on works retrieved (overrides crawl.max_entities)
    #[arg(long)]
    max_entities: Option<usize>,

    /// Retrieve every matching work, ignoring crawl.max_entities
    #[arg(long, conflicts_with = "max_entities")]
    all: bool,

    /// Seconds to sleep before each API call (overrides retry.rate_interval_secs)
    #[arg(long, value_name = "SECS")]
    rate_interval: Option<f64>,

    /// Output CSV file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args, Debug)]
pub struct BfsArgs {
    /// Seed work identifiers (W123... or OpenAlex URLs)
    #[arg(required = true, num_args = 1..)]
    seeds: Vec<String>,

    /// Depth limit; seeds are depth 0 (overrides crawl.max_depth)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Processed-work budget (overrides crawl.max_nodes)
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Output CSV file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: PathBuf,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Graph CSV file
    path: PathBuf,

    /// Number of most cited works to list
    #[arg(long, default_value_t = 5)]
    top: usize,
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((field, value)) if !field.trim().is_empty() && !value.trim().is_empty() => {
            Ok((field.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected FIELD:VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };

    telemetry::init_tracing(&config.observability)?;
    metrics::register_metrics();

    info!(
        service = %config.observability.service_name,
        "Starting CiteForge v{}",
        citeforge_common::VERSION
    );

    let result = match cli.command {
        Command::Search(args) => commands::search(&config, args).await,
        Command::Bfs(args) => commands::bfs(&config, args).await,
        Command::Inspect(args) => commands::inspect(&config, args),
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}
