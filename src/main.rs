use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ratekeeper::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Serve stored rates immediately and refresh in the background
    #[arg(long, global = true)]
    constrained: bool,

    /// Bypass cache and cooldown
    #[arg(short, long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch all rates once and show cost prices
    Rates,
    /// Refresh rates periodically until interrupted
    Watch,
    /// Price a manually entered base rate
    Price {
        /// Base rate to price
        rate: f64,
    },
    /// Show recently recorded snapshots
    History {
        /// Number of snapshots to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
}

impl From<Commands> for ratekeeper::AppCommand {
    fn from(cmd: Commands) -> ratekeeper::AppCommand {
        match cmd {
            Commands::Rates => ratekeeper::AppCommand::Rates,
            Commands::Watch => ratekeeper::AppCommand::Watch,
            Commands::Price { rate } => ratekeeper::AppCommand::Price { rate },
            Commands::History { limit } => ratekeeper::AppCommand::History { limit },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, matches!(cli.command, Some(Commands::Watch)));

    let options = ratekeeper::RunOptions {
        constrained: cli.constrained,
        force: cli.force,
    };
    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => ratekeeper::cli::setup::setup_at_path(path),
            None => ratekeeper::cli::setup::setup(),
        },
        Some(cmd) => {
            ratekeeper::run_command(cmd.into(), cli.config_path.as_deref(), options).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
