//! Standalone listener binary.
//!
//! Serves a drop directory with the built-in introspection handlers plus an
//! `echo` probe. Real deployments embed [`deaddropd::Bridge`] in the host
//! process and register their own handlers; this binary exists to run the
//! transport on its own, for development and for the caller's test suites.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Map, Value};

use deaddrop_config::{Config, LogFormat};
use deaddrop_protocol::Capabilities;
use deaddropd::{
    Bridge, Dispatcher, ShutdownSignal, SystemShutdownSignal, initialise_telemetry,
    register_builtins,
};

/// Listener daemon for the deaddrop file bridge.
#[derive(Debug, Parser)]
#[command(name = "deaddropd", version, about)]
struct Cli {
    /// Directory shared with the caller process.
    #[arg(long)]
    drop_dir: Option<camino::Utf8PathBuf>,
    /// Milliseconds between drop-directory scans.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
    /// Milliseconds between status heartbeats.
    #[arg(long)]
    heartbeat_interval_ms: Option<u64>,
    /// Milliseconds between orphan sweeps.
    #[arg(long)]
    reap_interval_ms: Option<u64>,
    /// Age in milliseconds past which orphaned files are deleted.
    #[arg(long)]
    reap_max_age_ms: Option<u64>,
    /// Log filter expression, e.g. `info` or `deaddropd::monitor=debug`.
    #[arg(long)]
    log_filter: Option<String>,
    /// Log output format.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::default();
        if let Some(drop_dir) = self.drop_dir {
            config.drop_dir = drop_dir;
        }
        if let Some(value) = self.poll_interval_ms {
            config.poll_interval_ms = value;
        }
        if let Some(value) = self.heartbeat_interval_ms {
            config.heartbeat_interval_ms = value;
        }
        if let Some(value) = self.reap_interval_ms {
            config.reap_interval_ms = value;
        }
        if let Some(value) = self.reap_max_age_ms {
            config.reap_max_age_ms = value;
        }
        if let Some(value) = self.log_filter {
            config.log_filter = value;
        }
        if let Some(value) = self.log_format {
            config.log_format = value;
        }
        config
    }
}

fn main() -> ExitCode {
    let config = Cli::parse().into_config();
    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "deaddropd: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: Config) -> Result<(), String> {
    config.validate().map_err(|error| error.to_string())?;
    initialise_telemetry(&config).map_err(|error| error.to_string())?;

    let mut dispatcher = Dispatcher::new();
    dispatcher.register("echo", |params: &Map<String, Value>| {
        Ok(params.get("text").cloned().unwrap_or(Value::Null))
    });
    let capabilities = Capabilities {
        resources: Vec::new(),
        tools: builtin_tool_names(&dispatcher),
        prompts: Vec::new(),
    };
    register_builtins(&mut dispatcher, &capabilities);

    let mut bridge = Bridge::new(config, dispatcher, capabilities);
    bridge.start().map_err(|error| error.to_string())?;

    SystemShutdownSignal::new()
        .wait()
        .map_err(|error| error.to_string())?;

    bridge.stop().map_err(|error| error.to_string())
}

/// Tool names advertised by this binary: its own handlers plus the builtins
/// registered afterwards.
fn builtin_tool_names(dispatcher: &Dispatcher) -> Vec<String> {
    let mut names = dispatcher.command_names();
    for builtin in ["list_tools", "list_resources", "list_prompts", "ping"] {
        names.push(builtin.to_owned());
    }
    names.sort();
    names
}
