//! The listener's poll loop.
//!
//! One cycle refreshes the heartbeat when due, sweeps for orphans when due,
//! then claims and executes pending requests in file-name order. Claiming is
//! a rename: `command_<id>.json` becomes `processed_command_<id>.json` once a
//! response has been written, or `bad_command_<id>.json` when the payload
//! cannot be parsed. A cycle that finds an existing marker or response for an
//! id skips it, which is what makes reprocessing after a crash safe.

mod reaper;
mod status;

use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use deaddrop_config::Config;
use deaddrop_protocol::{
    Capabilities, CommandId, CommandRequest, CommandResponse, DropPaths, ListenerStatus,
    atomic_write,
};

use crate::dispatch::Dispatcher;

pub(crate) use status::StatusWriter;

/// Tracing target for poll-loop operations.
pub(crate) const MONITOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::monitor");

/// Drives discovery, execution, heartbeat, and reaping for one listener.
#[derive(Debug)]
pub(crate) struct MonitorLoop {
    paths: DropPaths,
    dispatcher: Arc<Dispatcher>,
    status: StatusWriter,
    reaper: reaper::Reaper,
    poll_interval: Duration,
}

impl MonitorLoop {
    pub(crate) fn new(
        config: &Config,
        dispatcher: Arc<Dispatcher>,
        capabilities: Capabilities,
    ) -> Self {
        let paths = DropPaths::new(config.drop_dir().as_std_path());
        let status = StatusWriter::new(
            paths.clone(),
            capabilities,
            config.heartbeat_interval(),
        );
        let reaper = reaper::Reaper::new(paths.clone(), config.reap_max_age(), config.reap_interval());
        Self {
            paths,
            dispatcher,
            status,
            reaper,
            poll_interval: config.poll_interval(),
        }
    }

    /// Runs cycles until the shutdown flag is raised.
    pub(crate) fn run(mut self, shutdown: &AtomicBool) {
        info!(target: MONITOR_TARGET, dir = %self.paths.dir().display(), "file monitor started");
        while !shutdown.load(Ordering::SeqCst) {
            self.cycle();
            thread::sleep(self.poll_interval);
        }
        if let Err(write_error) = self.status.write(ListenerStatus::Stopped) {
            warn!(target: MONITOR_TARGET, error = %write_error, "failed to publish stopped status");
        }
        info!(target: MONITOR_TARGET, "file monitor stopped");
    }

    /// One discovery pass over the drop directory.
    pub(crate) fn cycle(&mut self) {
        if let Err(io_error) = self.paths.ensure_dir() {
            warn!(target: MONITOR_TARGET, error = %io_error, "drop directory unavailable");
            return;
        }
        self.status.heartbeat_if_due();
        self.reaper.sweep_if_due();

        let ids = match self.paths.pending_request_ids() {
            Ok(ids) => ids,
            Err(io_error) => {
                warn!(target: MONITOR_TARGET, error = %io_error, "failed to list drop directory");
                return;
            }
        };
        for id in &ids {
            self.process(id);
        }
    }

    /// Claims and executes a single pending request.
    fn process(&self, id: &CommandId) {
        let response_path = self.paths.response(id);
        let already_handled = self.paths.processed(id).exists()
            || self.paths.bad(id).exists()
            || response_path.exists();
        if already_handled {
            return;
        }

        let command_path = self.paths.command(id);
        let bytes = match fs::read(&command_path) {
            Ok(bytes) => bytes,
            Err(io_error) if io_error.kind() == io::ErrorKind::NotFound => {
                // Caller abandoned between listing and read.
                debug!(target: MONITOR_TARGET, %id, "request vanished before read");
                return;
            }
            Err(io_error) => {
                // Transient: no marker was made, the next cycle retries.
                warn!(target: MONITOR_TARGET, %id, error = %io_error, "failed to read request");
                return;
            }
        };

        let request = match CommandRequest::decode(&bytes) {
            Ok(request) => request,
            Err(decode_error) => {
                warn!(target: MONITOR_TARGET, %id, error = %decode_error, "unparsable request");
                let response = CommandResponse::Error(decode_error.to_string());
                if !self.write_response(&response_path, &response, id) {
                    return;
                }
                // Terminal: never retried, unlike transient IO failures.
                self.claim(&command_path, &self.paths.bad(id), id);
                return;
            }
        };

        debug!(target: MONITOR_TARGET, %id, command = %request.command, "processing request");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.dispatcher.dispatch(&request.command, &request.params)
        }));
        let response = match outcome {
            Ok(Ok(value)) => CommandResponse::Result(value),
            Ok(Err(handler_error)) => {
                warn!(
                    target: MONITOR_TARGET,
                    %id,
                    command = %request.command,
                    error = %handler_error,
                    "handler reported failure"
                );
                CommandResponse::Error(handler_error.to_string())
            }
            Err(_) => {
                error!(
                    target: MONITOR_TARGET,
                    %id,
                    command = %request.command,
                    "handler panicked"
                );
                CommandResponse::Error(format!("handler for '{}' panicked", request.command))
            }
        };

        if !self.write_response(&response_path, &response, id) {
            // No marker was made; the next cycle re-reads the request.
            return;
        }
        self.claim(&command_path, &self.paths.processed(id), id);
    }

    /// Durably writes a response envelope. Returns whether the file landed.
    fn write_response(&self, path: &Path, response: &CommandResponse, id: &CommandId) -> bool {
        let bytes = match response.encode() {
            Ok(bytes) => bytes,
            Err(encode_error) => {
                error!(target: MONITOR_TARGET, %id, error = %encode_error, "failed to encode response");
                return false;
            }
        };
        if let Err(io_error) = atomic_write(path, &bytes) {
            warn!(target: MONITOR_TARGET, %id, error = %io_error, "failed to write response");
            return false;
        }
        true
    }

    /// Renames the request file into its terminal marker.
    ///
    /// A vanished source means the caller abandoned the request mid-flight;
    /// the rename is treated as already handled. Other failures are logged
    /// only: the response already exists, so the skip guard keeps the next
    /// cycle from re-invoking the handler.
    fn claim(&self, from: &Path, to: &Path, id: &CommandId) {
        match fs::rename(from, to) {
            Ok(()) => {}
            Err(io_error) if io_error.kind() == io::ErrorKind::NotFound => {
                debug!(target: MONITOR_TARGET, %id, "request vanished before claim");
            }
            Err(io_error) => {
                warn!(target: MONITOR_TARGET, %id, error = %io_error, "failed to mark request");
            }
        }
    }
}

#[cfg(test)]
mod tests;
