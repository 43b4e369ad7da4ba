use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rss_imap::app::AppContext;
use rss_imap::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            commands::sync(&ctx).await?;
        }
        Commands::Feeds => {
            commands::list_feeds(&ctx).await?;
        }
        Commands::Watch {
            interval,
            no_initial_run,
        } => {
            commands::watch(ctx, interval, no_initial_run).await?;
        }
    }

    Ok(())
}
