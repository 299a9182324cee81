//! Command-line arguments.

use std::path::PathBuf;

use cephflux_sdk::{Command, DestinationOverride};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cephflux")]
#[command(about = "Ships Ceph cluster metrics to one or more InfluxDB servers")]
pub struct Cli {
    /// Path to the cluster state dump (JSON)
    #[arg(short, long)]
    pub state: PathBuf,

    /// Optional TOML file with exporter settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where configuration changes are persisted
    #[arg(long, default_value = "cephflux.json")]
    pub store: PathBuf,

    /// Log filter, e.g. "info" or "cephflux_sdk=debug". Overrides RUST_LOG
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Default InfluxDB hostname for this run
    #[arg(long)]
    pub hostname: Option<String>,

    /// Seconds between collection cycles for this run
    #[arg(short, long)]
    pub interval: Option<String>,

    /// Serve health over HTTP on this address (host:port), `run` only
    #[cfg(feature = "status")]
    #[arg(long)]
    pub status_addr: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Collect and send on a fixed interval until interrupted
    Run,
    /// Collect and send one snapshot now
    Send,
    /// Collect and encode one snapshot without sending it
    SelfTest,
    /// Print the current configuration
    ConfigShow,
    /// Change one setting and persist it
    ConfigSet { key: String, value: String },
    /// Manage destinations
    #[command(subcommand)]
    Destination(DestinationCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DestinationCommand {
    /// Register a destination. Omitted options inherit the defaults
    Add(DestinationArgs),
    /// Remove a destination by hostname
    Remove { host: String },
    /// List destinations with their effective settings
    List,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct DestinationArgs {
    pub host: String,
    #[arg(long)]
    pub port: Option<String>,
    #[arg(long)]
    pub database: Option<String>,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long)]
    pub ssl: Option<String>,
    #[arg(long)]
    pub verify_ssl: Option<String>,
    #[arg(long)]
    pub precision: Option<String>,
}

impl From<DestinationArgs> for DestinationOverride {
    fn from(args: DestinationArgs) -> Self {
        DestinationOverride {
            hostname: args.host,
            port: args.port,
            database: args.database,
            username: args.username,
            password: args.password,
            ssl: args.ssl,
            verify_ssl: args.verify_ssl,
            precision: args.precision,
        }
    }
}

impl CliCommand {
    /// The exporter command for one-shot invocations. `None` for `run`.
    pub fn into_command(self) -> Option<Command> {
        let command = match self {
            CliCommand::Run => return None,
            CliCommand::Send => Command::Send,
            CliCommand::SelfTest => Command::SelfTest,
            CliCommand::ConfigShow => Command::ConfigShow,
            CliCommand::ConfigSet { key, value } => Command::ConfigSet { key, value },
            CliCommand::Destination(DestinationCommand::Add(args)) => {
                Command::DestinationAdd(args.into())
            }
            CliCommand::Destination(DestinationCommand::Remove { host }) => {
                Command::DestinationRemove(host)
            }
            CliCommand::Destination(DestinationCommand::List) => Command::DestinationList,
        };
        Some(command)
    }
}
