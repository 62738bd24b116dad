//! Caracal agent entry point: resolve configuration, initialise the
//! diagnostic log, compute identity once, and hand control to the
//! beacon loop.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use caracal::beacon::Beacon;
use caracal::cli::Cli;
use caracal::config::AgentConfig;
use caracal::executor::ShellExecutor;
use caracal::identity::Identity;
use caracal::transport::HttpTransport;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_file.as_deref())?;

    let identity = Identity::detect().context("computing agent identity")?;
    info!(
        paw = %identity.paw,
        host = %identity.host,
        platform = identity.platform,
        privilege = identity.privilege,
        "agent starting"
    );

    let transport =
        HttpTransport::new(cli.server.clone()).context("building transport")?;
    let config = AgentConfig::new(cli.server, cli.group, cli.sleep);

    Beacon::new(identity, config, transport, ShellExecutor).run().await;
    Ok(())
}

/// Default filter is `info`; `RUST_LOG` overrides. With `--log-file` the
/// log appends to the given file with ANSI colour disabled.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}
