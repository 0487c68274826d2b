//! Clipburn CLI: render short captioned clips from a request file.
//!
//! Usage:
//!   clipburn render <REQUEST>      Render a clip and print the response
//!   clipburn graph <REQUEST>       Print the filter graph without rendering
//!   clipburn normalize <REQUEST>   Print the resolved layout and captions
//!   clipburn check                 Check engine and font availability
//!   clipburn config                Show (or write) the effective config

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clipburn_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "clipburn",
    about = "Burn titles, credits, and captions into short video clips",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the standard location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a clip from a JSON request
    Render {
        /// Path to the request file
        request: PathBuf,

        /// Output file path (overrides the request)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write `<output>.graph.txt` next to the clip
        #[arg(long)]
        debug_report: bool,

        /// Emit progress as JSON lines on stderr
        #[arg(long)]
        json_progress: bool,
    },

    /// Build the filter graph for a request and print it
    Graph {
        /// Path to the request file
        request: PathBuf,
    },

    /// Print the layout and normalized captions for a request
    Normalize {
        /// Path to the request file
        request: PathBuf,
    },

    /// Check engine and font availability
    Check,

    /// Show the effective configuration
    Config {
        /// Write it to the standard config location
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    clipburn_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Render {
            request,
            output,
            debug_report,
            json_progress,
        } => commands::render::run(config, request, output, debug_report, json_progress).await,
        Commands::Graph { request } => commands::graph::run(config, request),
        Commands::Normalize { request } => commands::normalize::run(config, request),
        Commands::Check => commands::check::run(&config),
        Commands::Config { write } => commands::config::run(&config, write),
    }
}
