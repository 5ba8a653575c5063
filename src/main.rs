use anyhow::Result;
use carteira::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// User whose holdings are shown (defaults to the first configured user)
    #[arg(short, long, global = true)]
    user: Option<i64>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show equities with valuation indicators
    Equities,
    /// Show real estate funds
    Funds,
    /// Show foreign assets converted to the local currency
    Foreign,
    /// Show every asset class
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let options = carteira::RunOptions {
        config_path: cli.config_path.as_deref(),
        user_id: cli.user,
        json: cli.json,
    };

    let result = match cli.command {
        Some(Commands::Setup) => match &cli.config_path {
            Some(path) => carteira::cli::setup::setup_at_path(path),
            None => carteira::cli::setup::setup(),
        },
        Some(Commands::Equities) => {
            carteira::run_command(carteira::AppCommand::Equities, options).await
        }
        Some(Commands::Funds) => carteira::run_command(carteira::AppCommand::Funds, options).await,
        Some(Commands::Foreign) => {
            carteira::run_command(carteira::AppCommand::Foreign, options).await
        }
        Some(Commands::All) => carteira::run_command(carteira::AppCommand::All, options).await,
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
