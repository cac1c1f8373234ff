//! Default values shared by the daemon and the CLI.

use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;

/// Interval between drop-directory scans on the listener, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Interval between status heartbeats on the listener, in milliseconds.
///
/// Kept independent of the discovery interval: liveness must stay observable
/// even when no commands arrive.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1_000;

/// Interval between response-file checks on the caller, in milliseconds.
pub const DEFAULT_RESPONSE_POLL_INTERVAL_MS: u64 = 100;

/// Default caller deadline for a single command, in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 15_000;

/// Maximum heartbeat age still considered alive, in milliseconds.
///
/// Five heartbeat intervals: wide enough to absorb scheduling jitter, tight
/// enough to notice a crashed or hung listener within seconds.
pub const DEFAULT_STALENESS_THRESHOLD_MS: u64 = 5_000;

/// Interval between orphan sweeps on the listener, in milliseconds.
pub const DEFAULT_REAP_INTERVAL_MS: u64 = 60_000;

/// Age beyond which response and marker files are deleted, in milliseconds.
///
/// Twenty times the default command timeout. Orphans only appear when a
/// caller abandons a request the listener later answers, so any cutoff well
/// past the largest plausible timeout is safe.
pub const DEFAULT_REAP_MAX_AGE_MS: u64 = 300_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default drop directory shared by both processes.
pub fn default_drop_dir() -> Utf8PathBuf {
    let mut base = base_directory();
    base.push("deaddrop");
    base.push("drops");
    base
}

#[cfg(unix)]
fn base_directory() -> Utf8PathBuf {
    runtime_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory)
}

#[cfg(not(unix))]
fn base_directory() -> Utf8PathBuf {
    fallback_base_directory()
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
