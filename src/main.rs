mod cli;

use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};

/// How long blocking work left over after a run may delay process exit
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "code_auditor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    cli::run_to_completion(SHUTDOWN_GRACE, run(cli))?
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling analysis");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Analyze { path, args, output, graph } => {
            cli::analyze(&path, &args, output.as_deref(), graph.as_deref(), cancel).await?;
        }
        Commands::Graph { path, args, output } => {
            cli::export_graph(&path, &args, output.as_deref(), cancel).await?;
        }
        Commands::Cycles { path, args, max_depth } => {
            cli::show_cycles(&path, &args, max_depth, cancel).await?;
        }
        Commands::ClearCache { path } => {
            cli::clear_cache(&path).await?;
        }
    }

    Ok(())
}
