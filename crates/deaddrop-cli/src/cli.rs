//! Command-line front end over the RPC stub and liveness monitor.

use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use thiserror::Error;

use deaddrop_config::Config;

use crate::client::{RpcClient, SendError};
use crate::liveness::{LivenessMonitor, Reachability};

/// Deadline used for the responsiveness probe in `deaddrop status`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller CLI for the deaddrop file bridge.
#[derive(Debug, Parser)]
#[command(name = "deaddrop", version, about)]
pub struct Cli {
    /// Directory shared with the listener process.
    #[arg(long, global = true)]
    pub drop_dir: Option<camino::Utf8PathBuf>,
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Issue a command to the listener and print its result.
    Send {
        /// Command name understood by the listener.
        command: String,
        /// Parameter as KEY=VALUE; the value is parsed as JSON when
        /// possible and passed as a string otherwise.
        #[arg(long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
        /// Deadline in milliseconds, defaulting to the configured timeout.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Report whether the listener is reachable and responding.
    Status,
}

/// Errors surfaced to the terminal.
#[derive(Debug, Error)]
pub enum AppError {
    /// The RPC stub failed.
    #[error(transparent)]
    Send(#[from] SendError),
    /// A `--param` argument was not of the form KEY=VALUE.
    #[error("invalid --param '{argument}': expected KEY=VALUE")]
    Param {
        /// The offending argument.
        argument: String,
    },
    /// Writing to the output stream failed.
    #[error("failed to write output: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl Cli {
    /// Resolves the effective configuration for this invocation.
    #[must_use]
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(drop_dir) = &self.drop_dir {
            config.drop_dir = drop_dir.clone();
        }
        config
    }
}

/// Executes a parsed invocation, writing human-readable output.
///
/// # Errors
///
/// Returns [`AppError`] when argument conversion, the RPC round trip, or
/// output writing fails.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<(), AppError> {
    let config = cli.config();
    match &cli.command {
        CliCommand::Send {
            command,
            params,
            timeout_ms,
        } => {
            let params = parse_params(params)?;
            let client = RpcClient::new(&config);
            let value = match timeout_ms {
                Some(ms) => client.send(command, params, Duration::from_millis(*ms))?,
                None => client.send_default(command, params)?,
            };
            let rendered =
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
            writeln!(out, "{rendered}").map_err(|source| AppError::Output { source })
        }
        CliCommand::Status => report_status(&config, out),
    }
}

fn report_status(config: &Config, out: &mut impl Write) -> Result<(), AppError> {
    let assessment = LivenessMonitor::new(config).assess();
    writeln!(out, "{}", describe(&assessment)).map_err(|source| AppError::Output { source })?;
    if !assessment.is_reachable() {
        return Ok(());
    }

    // The status record only proves the heartbeat thread is alive; a short
    // introspection round trip proves commands are actually served.
    match RpcClient::new(config).send("list_tools", Map::new(), PROBE_TIMEOUT) {
        Ok(Value::Array(tools)) => writeln!(out, "listener is responding ({} tools)", tools.len()),
        Ok(_) => writeln!(out, "listener is responding"),
        Err(SendError::TimedOut { .. }) => {
            writeln!(out, "status record is fresh but commands go unanswered")
        }
        Err(error) => writeln!(out, "listener answered with an error: {error}"),
    }
    .map_err(|source| AppError::Output { source })
}

fn describe(assessment: &Reachability) -> String {
    match assessment {
        Reachability::FreshHeartbeat { age } => {
            format!("listener is running (heartbeat {} ms old)", age.as_millis())
        }
        Reachability::FreshStatusFile { age } => format!(
            "listener appears to be running (status file {} ms old, no heartbeat field)",
            age.as_millis()
        ),
        Reachability::LegacySentinel => {
            "listener sentinel file present (legacy liveness, no staleness check)".to_owned()
        }
        Reachability::Stale { age } => format!(
            "listener status is stale ({} s since last heartbeat); it has likely crashed",
            age.as_secs()
        ),
        Reachability::ReportedStopped => "listener reported itself stopped".to_owned(),
        Reachability::NoEvidence => {
            "listener is not running (no status record in the drop directory)".to_owned()
        }
    }
}

/// Converts KEY=VALUE arguments into a parameter mapping, preserving the
/// order they were given in.
fn parse_params(arguments: &[String]) -> Result<Map<String, Value>, AppError> {
    let mut params = Map::new();
    for argument in arguments {
        let (key, raw) = argument.split_once('=').ok_or_else(|| AppError::Param {
            argument: argument.clone(),
        })?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        params.insert(key.to_owned(), value);
    }
    Ok(params)
}
