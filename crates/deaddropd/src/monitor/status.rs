//! Periodic status record publishing.

use std::io;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, warn};

use deaddrop_protocol::{
    Capabilities, DropPaths, EnvelopeError, ListenerStatus, StatusRecord, atomic_write,
    unix_seconds,
};

use super::MONITOR_TARGET;

/// Errors raised while publishing the status record.
#[derive(Debug, Error)]
pub enum StatusWriteError {
    /// The record could not be serialised.
    #[error("failed to encode status record: {source}")]
    Encode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The record could not be written to the drop directory.
    #[error("failed to write status record: {source}")]
    Write {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<EnvelopeError> for StatusWriteError {
    fn from(error: EnvelopeError) -> Self {
        match error {
            EnvelopeError::Malformed { source } | EnvelopeError::Encode { source } => {
                Self::Encode { source }
            }
        }
    }
}

/// Publishes `server_status.json` on a fixed interval.
///
/// The heartbeat runs on its own clock, independent of command discovery, so
/// liveness stays observable even when the listener is idle.
#[derive(Debug)]
pub(crate) struct StatusWriter {
    paths: DropPaths,
    capabilities: Capabilities,
    interval: Duration,
    started_at_unix: f64,
    last_heartbeat: Option<Instant>,
}

impl StatusWriter {
    pub(crate) fn new(paths: DropPaths, capabilities: Capabilities, interval: Duration) -> Self {
        Self {
            paths,
            capabilities,
            interval,
            started_at_unix: unix_seconds(SystemTime::now()),
            last_heartbeat: None,
        }
    }

    /// Overwrites the status record with the given lifecycle state.
    pub(crate) fn write(&mut self, status: ListenerStatus) -> Result<(), StatusWriteError> {
        let record = StatusRecord::now(status, self.started_at_unix, &self.capabilities);
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|source| StatusWriteError::Encode { source })?;
        atomic_write(&self.paths.status(), &bytes)
            .map_err(|source| StatusWriteError::Write { source })?;
        self.last_heartbeat = Some(Instant::now());
        debug!(target: MONITOR_TARGET, %status, "status record published");
        Ok(())
    }

    /// Republishes a running heartbeat when the interval has elapsed.
    ///
    /// Write failures are logged and retried on the next due cycle; a missed
    /// heartbeat only widens the staleness window the caller tolerates.
    pub(crate) fn heartbeat_if_due(&mut self) {
        let due = self
            .last_heartbeat
            .is_none_or(|last| last.elapsed() >= self.interval);
        if !due {
            return;
        }
        if let Err(error) = self.write(ListenerStatus::Running) {
            warn!(target: MONITOR_TARGET, error = %error, "heartbeat write failed");
        }
    }
}
