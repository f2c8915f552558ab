use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

use commands::{reports, run};

#[derive(Parser)]
#[command(name = "ciglue")]
#[command(about = "CI support tools: cached build execution and test report normalization")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run build commands, restoring from or saving to a shared cache
    Run(run::RunArgs),
    /// Normalize raw test reports into the unified result model
    Reports(reports::ReportsArgs),
}

fn init_tracing() -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .compact()
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to initialize tracing: {e}"))?;

    Ok(())
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Reports(args) => reports::execute(args).await,
    }
}
