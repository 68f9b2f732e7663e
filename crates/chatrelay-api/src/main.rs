//! chatrelay entry point.
//!
//! Binary name: `chatrelay`
//!
//! Parses CLI arguments, initializes tracing and application state, then
//! runs the relay or one of the offline snapshot commands.

mod cli;
mod runner;
mod state;

use clap::Parser;
use clap_complete::generate;

use chatrelay_observe::{init_tracing, shutdown_tracing, TracingOptions};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "chatrelay", &mut std::io::stdout());
        return Ok(());
    }

    let enable_otel = matches!(cli.command, Commands::Run { otel: true, .. });
    let log_control = init_tracing(&TracingOptions {
        default_level: cli.log_level().to_string(),
        json: cli.json,
        enable_otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = dispatch(cli, log_control).await;
    shutdown_tracing();
    result
}

async fn dispatch(cli: Cli, log_control: chatrelay_observe::LogLevelHandle) -> anyhow::Result<()> {
    let app = AppState::init(cli.data_dir).await?;

    match cli.command {
        Commands::Run { user, .. } => runner::run(app, user, log_control).await,
        Commands::History { channel, count } => {
            cli::history::show_history(&app, &channel, count, cli.json).await
        }
        Commands::Reset { channel } => cli::reset::reset_channel(&app, &channel, cli.json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
