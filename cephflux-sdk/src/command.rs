//! Administrative commands.

use serde::Serialize;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::destination::DestinationOverride;
use crate::error::ConfigError;
use crate::exporter::Exporter;

const ENOENT: i32 = 2;
const EIO: i32 = 5;
const EEXIST: i32 = 17;
const EINVAL: i32 = 22;
const ENODATA: i32 = 61;

/// A command accepted by [`Exporter::handle_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one cycle now.
    Send,
    /// Show the current configuration with passwords masked.
    ConfigShow,
    /// Change one setting.
    ConfigSet { key: String, value: String },
    DestinationAdd(DestinationOverride),
    DestinationRemove(String),
    DestinationList,
    /// Collect and encode one snapshot without sending it.
    SelfTest,
}

/// Result of a command: a status code (0 or a negative errno) plus output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn error(errno: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: -errno,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

impl From<ConfigError> for CommandOutput {
    fn from(error: ConfigError) -> Self {
        let errno = match error {
            ConfigError::Persist(_) => EIO,
            ConfigError::DuplicateHostname(_) => EEXIST,
            _ => EINVAL,
        };
        CommandOutput::error(errno, error.to_string())
    }
}

fn json(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
}

/// Run a configuration change, which saves through a possibly blocking
/// [`ConfigStore`](crate::ConfigStore), without stalling other tasks on a
/// multi-threaded runtime.
fn blocking<T>(change: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(change)
        }
        _ => change(),
    }
}

impl Exporter {
    /// Execute an administrative command.
    pub async fn handle_command(&self, command: Command) -> CommandOutput {
        match command {
            Command::Send => {
                let report = self.run_cycle().await;
                let mut output = CommandOutput::ok(json(&report));
                if !report.health.is_empty() {
                    output.code = -EIO;
                    output.stderr = report
                        .health
                        .values()
                        .flat_map(|check| {
                            std::iter::once(check.summary.clone()).chain(check.detail.iter().cloned())
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                }
                output
            }
            Command::ConfigShow => CommandOutput::ok(json(&self.settings().redacted())),
            Command::ConfigSet { key, value } => match blocking(|| self.set_config(&key, &value)) {
                Ok(()) => CommandOutput::ok(format!("Configuration option {key} updated")),
                Err(e) => e.into(),
            },
            Command::DestinationAdd(entry) => match blocking(|| self.add_destination(entry)) {
                Ok(destination) => CommandOutput::ok(format!("Destination {destination} added")),
                Err(e) => e.into(),
            },
            Command::DestinationRemove(hostname) => match blocking(|| self.remove_destination(&hostname)) {
                Ok(true) => CommandOutput::ok(format!("Destination {hostname} removed")),
                Ok(false) => {
                    CommandOutput::error(ENOENT, format!("Destination {hostname} not found"))
                }
                Err(e) => e.into(),
            },
            Command::DestinationList => CommandOutput::ok(json(&self.registry().list())),
            Command::SelfTest => {
                let report = self.self_test().await;
                if report.passed {
                    CommandOutput::ok(json(&report))
                } else {
                    CommandOutput {
                        code: -ENODATA,
                        stdout: json(&report),
                        stderr: "Self-test failed: no points collected".to_string(),
                    }
                }
            }
        }
    }
}
