//! Orphaned terminal-file cleanup.
//!
//! A caller that abandons a request on timeout deletes its own files, but the
//! listener may still be mid-execution and write a response afterwards. That
//! response has no consumer and would sit in the drop directory forever. The
//! transport cannot prevent the race without an abandonment acknowledgement
//! the protocol does not have, so the reaper deletes response and marker
//! files once they are comfortably older than any plausible caller deadline.

use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use deaddrop_protocol::{DropPaths, remove_file_if_exists};

use super::MONITOR_TARGET;

#[derive(Debug)]
pub(crate) struct Reaper {
    paths: DropPaths,
    max_age: Duration,
    interval: Duration,
    last_sweep: Option<Instant>,
}

impl Reaper {
    pub(crate) fn new(paths: DropPaths, max_age: Duration, interval: Duration) -> Self {
        Self {
            paths,
            max_age,
            interval,
            last_sweep: None,
        }
    }

    /// Runs a sweep when the interval has elapsed.
    pub(crate) fn sweep_if_due(&mut self) {
        let due = self
            .last_sweep
            .is_none_or(|last| last.elapsed() >= self.interval);
        if !due {
            return;
        }
        self.last_sweep = Some(Instant::now());
        self.sweep();
    }

    /// Deletes terminal files older than the configured cutoff.
    ///
    /// Every deletion is best-effort: a file that vanished between listing
    /// and removal was consumed by its caller, which is the happy path.
    pub(crate) fn sweep(&self) {
        let files = match self.paths.terminal_files() {
            Ok(files) => files,
            Err(error) => {
                warn!(target: MONITOR_TARGET, error = %error, "reaper could not list drop directory");
                return;
            }
        };
        let now = SystemTime::now();
        let mut reaped = 0_usize;
        for file in files {
            let Ok(metadata) = file.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let expired = now
                .duration_since(modified)
                .map(|age| age > self.max_age)
                .unwrap_or(false);
            if !expired {
                continue;
            }
            match remove_file_if_exists(&file) {
                Ok(true) => {
                    info!(target: MONITOR_TARGET, file = %file.display(), "reaped orphaned file");
                    reaped += 1;
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(
                        target: MONITOR_TARGET,
                        file = %file.display(),
                        error = %error,
                        "failed to reap orphaned file"
                    );
                }
            }
        }
        if reaped > 0 {
            debug!(target: MONITOR_TARGET, reaped, "orphan sweep finished");
        }
    }
}
