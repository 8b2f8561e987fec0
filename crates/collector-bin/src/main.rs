//! Pageview collector - buffers request events locally and ships them in batches.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use collector_config_and_utils::{init_logging, Config, Paths};

/// Pageview collector command-line interface.
#[derive(Parser)]
#[command(name = "collector")]
#[command(about = "Buffer request events locally and ship them to the collect endpoint in batches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (config, database, logs). Defaults to ~/.collector
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the pending-event table
    Provision,
    /// Flush pending events once, then drop the pending-event table
    Teardown,
    /// Simulate one completed request through the producer
    Record(app::RecordArgs),
    /// Run one drain cycle
    Drain,
    /// Drain periodically until Ctrl-C, then flush and stop
    Run,
    /// Show store readiness and pending event count
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    match cli.command {
        Commands::Provision => app::provision(&paths)?,
        Commands::Teardown => app::teardown(&config, &paths).await?,
        Commands::Record(args) => app::record(&config, &paths, args)?,
        Commands::Drain => app::drain(&config, &paths).await?,
        Commands::Run => app::run(&config, &paths).await?,
        Commands::Status => app::status(&paths)?,
    }

    Ok(())
}
