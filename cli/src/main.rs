//! Command-line driver: runs an experiment from a JSON file (or defaults) and
//! prints the traffic summary.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::{Cli, Commands};

fn init_logging() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init()
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run_experiment(args),
        Commands::Means(args) => commands::print_means(args),
    }
}
