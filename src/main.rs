use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use cephflux_collect::DumpFile;
use cephflux_sdk::{CommandOutput, ConfigKey, Exporter, FileStore};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod settings;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let store = Arc::new(FileStore::new(&cli.store));
    let mut settings = settings::load(cli.config.as_deref(), store.as_ref())?;
    if let Some(hostname) = &cli.hostname {
        settings.set(ConfigKey::Hostname, hostname)?;
    }
    if let Some(interval) = &cli.interval {
        settings.set(ConfigKey::Interval, interval)?;
    }

    let exporter = Exporter::builder(Arc::new(DumpFile::new(&cli.state)))
        .store(store)
        .settings(settings)
        .build()
        .context("invalid settings")?;
    let exporter = Arc::new(exporter);

    match cli.command.clone().into_command() {
        Some(command) => Ok(report(exporter.handle_command(command).await)),
        None => {
            run(&cli, exporter).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid log level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Collect and send until Ctrl-C.
async fn run(cli: &Cli, exporter: Arc<Exporter>) -> Result<()> {
    #[cfg(feature = "status")]
    if let Some(addr) = &cli.status_addr {
        cephflux_sdk::status::StatusServer::new(addr.clone()).start(exporter.clone());
    }

    info!(
        state = %cli.state.display(),
        destinations = exporter.registry().len(),
        interval_secs = exporter.interval().as_secs(),
        "Starting cephflux"
    );
    let handle = exporter.start()?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Stopping cephflux");
    handle.shutdown().await;
    Ok(())
}

/// Print command output and turn its negative errno into an exit status.
fn report(output: CommandOutput) -> ExitCode {
    if !output.stdout.is_empty() {
        println!("{}", output.stdout);
    }
    if !output.stderr.is_empty() {
        eprintln!("{}", output.stderr);
    }
    ExitCode::from(output.code.unsigned_abs().min(255) as u8)
}
