//! Shared configuration for the deaddrop binaries.
//!
//! Both the listener daemon and the caller CLI must agree on the drop
//! directory and the protocol timing constants, so the typed [`Config`] lives
//! in its own crate the way both sides depend on it. Values start from the
//! defaults in [`defaults`] and are overridden by CLI flags at the binaries.

pub mod defaults;
mod logging;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use logging::{LogFormat, LogFormatParseError};

/// Typed configuration shared by the daemon and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory both processes exchange files through.
    pub drop_dir: Utf8PathBuf,
    /// Listener interval between drop-directory scans, in milliseconds.
    pub poll_interval_ms: u64,
    /// Listener interval between status heartbeats, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Caller interval between response-file checks, in milliseconds.
    pub response_poll_interval_ms: u64,
    /// Default caller deadline for a single command, in milliseconds.
    pub command_timeout_ms: u64,
    /// Maximum heartbeat age still considered alive, in milliseconds.
    pub staleness_threshold_ms: u64,
    /// Listener interval between orphan sweeps, in milliseconds.
    pub reap_interval_ms: u64,
    /// Age beyond which terminal files are reaped, in milliseconds.
    pub reap_max_age_ms: u64,
    /// Log filter expression for the tracing subscriber.
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drop_dir: defaults::default_drop_dir(),
            poll_interval_ms: defaults::DEFAULT_POLL_INTERVAL_MS,
            heartbeat_interval_ms: defaults::DEFAULT_HEARTBEAT_INTERVAL_MS,
            response_poll_interval_ms: defaults::DEFAULT_RESPONSE_POLL_INTERVAL_MS,
            command_timeout_ms: defaults::DEFAULT_COMMAND_TIMEOUT_MS,
            staleness_threshold_ms: defaults::DEFAULT_STALENESS_THRESHOLD_MS,
            reap_interval_ms: defaults::DEFAULT_REAP_INTERVAL_MS,
            reap_max_age_ms: defaults::DEFAULT_REAP_MAX_AGE_MS,
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

/// Errors raised when validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An interval or timeout was configured as zero.
    #[error("{setting} must be greater than zero")]
    ZeroDuration {
        /// Name of the offending setting.
        setting: &'static str,
    },
}

impl Config {
    /// The directory both processes exchange files through.
    #[must_use]
    pub fn drop_dir(&self) -> &Utf8Path {
        self.drop_dir.as_path()
    }

    /// Listener interval between drop-directory scans.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Listener interval between status heartbeats.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Caller interval between response-file checks.
    #[must_use]
    pub fn response_poll_interval(&self) -> Duration {
        Duration::from_millis(self.response_poll_interval_ms)
    }

    /// Default caller deadline for a single command.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Maximum heartbeat age still considered alive.
    #[must_use]
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.staleness_threshold_ms)
    }

    /// Listener interval between orphan sweeps.
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Age beyond which terminal files are reaped.
    #[must_use]
    pub fn reap_max_age(&self) -> Duration {
        Duration::from_millis(self.reap_max_age_ms)
    }

    /// Log filter expression for the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Checks that every interval and timeout is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroDuration`] naming the first setting that is
    /// zero. A zero poll interval would spin the loop; a zero timeout would
    /// make every send fail before the listener can answer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("response_poll_interval_ms", self.response_poll_interval_ms),
            ("command_timeout_ms", self.command_timeout_ms),
            ("staleness_threshold_ms", self.staleness_threshold_ms),
            ("reap_interval_ms", self.reap_interval_ms),
            ("reap_max_age_ms", self.reap_max_age_ms),
        ];
        for (setting, value) in settings {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { setting });
            }
        }
        Ok(())
    }
}
