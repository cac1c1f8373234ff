//! Listener lifecycle control.
//!
//! The bridge owns the poll loop's worker thread and models its own state as
//! an explicit machine (`Stopped -> Starting -> Running -> Stopping ->
//! Stopped`) so start and stop are guarded transitions rather than ad hoc
//! flags. The host process keeps the [`Bridge`] for as long as it wants the
//! drop directory served; command execution stays cooperative inside the
//! worker, never blocking the host's own threads.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use thiserror::Error;
use tracing::info;

use deaddrop_config::Config;
use deaddrop_protocol::Capabilities;

use crate::dispatch::Dispatcher;
use crate::monitor::MonitorLoop;

/// Tracing target for lifecycle transitions.
pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Lifecycle states of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No worker thread exists.
    Stopped,
    /// The worker is being prepared.
    Starting,
    /// The poll loop is serving the drop directory.
    Running,
    /// The worker has been asked to exit.
    Stopping,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => formatter.write_str("stopped"),
            Self::Starting => formatter.write_str("starting"),
            Self::Running => formatter.write_str("running"),
            Self::Stopping => formatter.write_str("stopping"),
        }
    }
}

/// Errors raised by lifecycle transitions.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start` was called while the bridge was not stopped.
    #[error("bridge is already {state}")]
    AlreadyRunning {
        /// State the bridge was in when `start` was called.
        state: BridgeState,
    },
    /// The drop directory could not be created.
    #[error("failed to prepare drop directory '{path}': {source}")]
    DropDirectory {
        /// The configured drop directory.
        path: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker thread panicked while being joined.
    #[error("monitor worker panicked")]
    WorkerPanic,
}

struct Worker {
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Owns the listener's poll loop and its lifecycle state.
pub struct Bridge {
    config: Config,
    dispatcher: Arc<Dispatcher>,
    capabilities: Capabilities,
    state: BridgeState,
    worker: Option<Worker>,
}

impl Bridge {
    /// Builds a stopped bridge around the host's dispatcher.
    #[must_use]
    pub fn new(config: Config, dispatcher: Dispatcher, capabilities: Capabilities) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            capabilities,
            state: BridgeState::Stopped,
            worker: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Starts the poll loop on a background worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::AlreadyRunning`] when the bridge is not
    /// stopped, or [`BridgeError::DropDirectory`] when the drop directory
    /// cannot be created.
    pub fn start(&mut self) -> Result<(), BridgeError> {
        if self.state != BridgeState::Stopped {
            return Err(BridgeError::AlreadyRunning { state: self.state });
        }
        self.state = BridgeState::Starting;

        if let Err(source) = std::fs::create_dir_all(self.config.drop_dir().as_std_path()) {
            self.state = BridgeState::Stopped;
            return Err(BridgeError::DropDirectory {
                path: self.config.drop_dir().to_string(),
                source,
            });
        }
        let monitor = MonitorLoop::new(
            &self.config,
            Arc::clone(&self.dispatcher),
            self.capabilities.clone(),
        );

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || monitor.run(&shutdown_flag));
        self.worker = Some(Worker { shutdown, handle });
        self.state = BridgeState::Running;
        info!(
            target: LIFECYCLE_TARGET,
            dir = %self.config.drop_dir(),
            "bridge started"
        );
        Ok(())
    }

    /// Stops the poll loop and waits for the worker to exit.
    ///
    /// Stopping an already stopped bridge is a no-op, which keeps teardown
    /// idempotent for hosts that stop explicitly and again on drop.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::WorkerPanic`] when the worker thread cannot be
    /// joined cleanly.
    pub fn stop(&mut self) -> Result<(), BridgeError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        self.state = BridgeState::Stopping;
        worker.shutdown.store(true, Ordering::SeqCst);
        let joined = worker.handle.join();
        self.state = BridgeState::Stopped;
        match joined {
            Ok(()) => {
                info!(target: LIFECYCLE_TARGET, "bridge stopped");
                Ok(())
            }
            Err(_) => Err(BridgeError::WorkerPanic),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Bridge")
            .field("state", &self.state)
            .field("drop_dir", &self.config.drop_dir())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            drop_dir: camino::Utf8PathBuf::from_path_buf(dir.to_path_buf()).expect("utf8 dir"),
            poll_interval_ms: 10,
            heartbeat_interval_ms: 10,
            ..Config::default()
        }
    }

    fn echo_dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register("echo", |params: &Map<String, Value>| {
            Ok(params.get("text").cloned().unwrap_or(Value::Null))
        });
        dispatcher
    }

    #[test]
    fn start_transitions_to_running_and_publishes_status() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut bridge = Bridge::new(
            test_config(dir.path()),
            echo_dispatcher(),
            Capabilities::default(),
        );
        assert_eq!(bridge.state(), BridgeState::Stopped);

        bridge.start().expect("start");
        assert_eq!(bridge.state(), BridgeState::Running);

        let status_path = dir.path().join("server_status.json");
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while !status_path.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(status_path.exists(), "heartbeat should publish a status record");

        bridge.stop().expect("stop");
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[test]
    fn double_start_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut bridge = Bridge::new(
            test_config(dir.path()),
            echo_dispatcher(),
            Capabilities::default(),
        );
        bridge.start().expect("start");
        let error = bridge.start().expect_err("second start should fail");
        assert!(matches!(
            error,
            BridgeError::AlreadyRunning {
                state: BridgeState::Running
            }
        ));
        bridge.stop().expect("stop");
    }

    #[test]
    fn stop_is_idempotent_and_writes_stopped_status() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut bridge = Bridge::new(
            test_config(dir.path()),
            echo_dispatcher(),
            Capabilities::default(),
        );
        bridge.stop().expect("stop while stopped");

        bridge.start().expect("start");
        bridge.stop().expect("stop");
        bridge.stop().expect("second stop");

        let status = std::fs::read_to_string(dir.path().join("server_status.json"))
            .expect("status record");
        assert!(status.contains("\"stopped\""), "status was: {status}");
    }

    #[test]
    fn restart_after_stop_is_allowed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut bridge = Bridge::new(
            test_config(dir.path()),
            echo_dispatcher(),
            Capabilities::default(),
        );
        bridge.start().expect("first start");
        bridge.stop().expect("stop");
        bridge.start().expect("second start");
        bridge.stop().expect("final stop");
    }
}
