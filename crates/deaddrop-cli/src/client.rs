//! The caller-side RPC stub.
//!
//! `send` writes a uniquely named request envelope into the drop directory,
//! polls for the matching response file until its deadline, and cleans up
//! both files whatever the outcome. The deadline is a monotonic clock
//! reading, so wall-clock adjustments mid-call cannot extend or shorten the
//! wait. Cleanup on timeout is deliberate: deleting the request keeps a
//! listener that starts late from replaying a command the caller gave up on.

use std::fs;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use thiserror::Error;

use deaddrop_config::Config;
use deaddrop_protocol::{
    CommandId, CommandRequest, CommandResponse, DropPaths, EnvelopeError, atomic_write,
    remove_file_if_exists,
};

/// Errors surfaced by [`RpcClient::send`].
///
/// The remote/timeout distinction matters to callers: a remote error means
/// the listener saw the command and rejected it (retrying the same input is
/// pointless), a timeout means the listener never answered (check its
/// health, then retry).
#[derive(Debug, Error)]
pub enum SendError {
    /// The listener answered with an error response.
    #[error("listener reported failure for '{command}': {message}")]
    Remote {
        /// The command that failed.
        command: String,
        /// The listener's error message, verbatim.
        message: String,
    },
    /// No response appeared before the deadline.
    #[error(
        "no response to '{command}' within {timeout_ms} ms; make sure the listener is running"
    )]
    TimedOut {
        /// The command that went unanswered.
        command: String,
        /// The deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// The request envelope could not be serialised.
    #[error("failed to encode request for '{command}': {source}")]
    Encode {
        /// The command being issued.
        command: String,
        /// Underlying envelope error.
        #[source]
        source: EnvelopeError,
    },
    /// The request envelope could not be written to the drop directory.
    #[error("failed to write request for '{command}': {source}")]
    Write {
        /// The command being issued.
        command: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Issues commands through the drop directory and awaits their responses.
#[derive(Debug, Clone)]
pub struct RpcClient {
    paths: DropPaths,
    poll_interval: Duration,
    default_timeout: Duration,
}

impl RpcClient {
    /// Builds a client for the configured drop directory.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            paths: DropPaths::new(config.drop_dir().as_std_path()),
            poll_interval: config.response_poll_interval(),
            default_timeout: config.command_timeout(),
        }
    }

    /// Issues a command with the configured default deadline.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::send`].
    pub fn send_default(
        &self,
        command: &str,
        params: Map<String, Value>,
    ) -> Result<Value, SendError> {
        self.send(command, params, self.default_timeout)
    }

    /// Issues a command and waits for its response until the deadline.
    ///
    /// Concurrent sends never interfere: every call mints a fresh id and all
    /// file names are keyed by it. The transport itself never retries; a
    /// caller wanting a retry reissues, which mints a new id.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Remote`] when the listener reports failure,
    /// [`SendError::TimedOut`] when the deadline elapses, and
    /// [`SendError::Encode`]/[`SendError::Write`] when the request cannot be
    /// placed in the drop directory. In every case neither the request nor
    /// the response file remains for this id.
    pub fn send(
        &self,
        command: &str,
        params: Map<String, Value>,
        timeout: Duration,
    ) -> Result<Value, SendError> {
        let id = CommandId::generate();
        let request = CommandRequest::new(command, params);
        let bytes = request.encode().map_err(|source| SendError::Encode {
            command: command.to_owned(),
            source,
        })?;
        self.paths
            .ensure_dir()
            .and_then(|()| atomic_write(&self.paths.command(&id), &bytes))
            .map_err(|source| SendError::Write {
                command: command.to_owned(),
                source,
            })?;

        let deadline = Instant::now() + timeout;
        let response_path = self.paths.response(&id);
        loop {
            match fs::read(&response_path) {
                Ok(bytes) => match CommandResponse::decode(&bytes) {
                    Ok(CommandResponse::Result(value)) => {
                        self.cleanup(&id);
                        return Ok(value);
                    }
                    Ok(CommandResponse::Error(message)) => {
                        self.cleanup(&id);
                        return Err(SendError::Remote {
                            command: command.to_owned(),
                            message,
                        });
                    }
                    // A half-visible response means a listener that skipped
                    // the atomic-rename discipline; keep polling until it
                    // finishes or the deadline passes.
                    Err(_) => {}
                },
                Err(io_error) if io_error.kind() == io::ErrorKind::NotFound => {}
                Err(_) => {}
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(self.poll_interval.min(deadline - now));
        }

        self.cleanup(&id);
        Err(SendError::TimedOut {
            command: command.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Best-effort removal of both files for an id; absence is success.
    fn cleanup(&self, id: &CommandId) {
        let _ = remove_file_if_exists(&self.paths.response(id));
        let _ = remove_file_if_exists(&self.paths.command(id));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
        client: RpcClient,
    }

    #[fixture]
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            drop_dir: camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                .expect("utf8 temp dir"),
            response_poll_interval_ms: 5,
            ..Config::default()
        };
        let client = RpcClient::new(&config);
        Fixture { dir, client }
    }

    fn drop_dir_files(fixture: &Fixture) -> Vec<String> {
        fs::read_dir(fixture.dir.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok()?.file_name().into_string().ok())
            .collect()
    }

    #[rstest]
    fn timeout_fails_and_leaves_no_residual_files(fixture: Fixture) {
        let started = Instant::now();
        let error = fixture
            .client
            .send("echo", Map::new(), Duration::from_millis(60))
            .expect_err("no listener is running");

        assert!(matches!(
            &error,
            SendError::TimedOut {
                command,
                timeout_ms: 60
            } if command == "echo"
        ));
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(
            drop_dir_files(&fixture).is_empty(),
            "leftover files: {:?}",
            drop_dir_files(&fixture)
        );
    }

    #[test]
    fn send_default_uses_the_configured_timeout() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            drop_dir: camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                .expect("utf8 temp dir"),
            response_poll_interval_ms: 5,
            command_timeout_ms: 50,
            ..Config::default()
        };

        let error = RpcClient::new(&config)
            .send_default("echo", Map::new())
            .expect_err("no listener is running");
        assert!(matches!(
            error,
            SendError::TimedOut {
                timeout_ms: 50,
                ..
            }
        ));
    }

    #[rstest]
    fn remote_error_is_surfaced_and_cleaned_up(fixture: Fixture) {
        let paths = DropPaths::new(fixture.dir.path());
        let responder = std::thread::spawn({
            let paths = paths.clone();
            move || {
                let deadline = Instant::now() + Duration::from_secs(2);
                while Instant::now() < deadline {
                    if let Ok(ids) = paths.pending_request_ids() {
                        if let Some(id) = ids.first() {
                            let body = CommandResponse::Error("no active document".to_owned())
                                .encode()
                                .expect("encode");
                            atomic_write(&paths.response(id), &body).expect("write response");
                            return;
                        }
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                panic!("no request appeared");
            }
        });

        let error = fixture
            .client
            .send("create_sketch", Map::new(), Duration::from_secs(2))
            .expect_err("listener reported failure");
        responder.join().expect("responder thread");

        assert!(matches!(
            &error,
            SendError::Remote { command, message }
                if command == "create_sketch" && message == "no active document"
        ));
        assert!(drop_dir_files(&fixture).is_empty());
    }

    #[rstest]
    fn successful_response_returns_the_result_value(fixture: Fixture) {
        let paths = DropPaths::new(fixture.dir.path());
        let responder = std::thread::spawn({
            let paths = paths.clone();
            move || {
                let deadline = Instant::now() + Duration::from_secs(2);
                while Instant::now() < deadline {
                    if let Ok(ids) = paths.pending_request_ids() {
                        if let Some(id) = ids.first() {
                            let request =
                                fs::read(paths.command(id)).expect("read request back");
                            let request =
                                CommandRequest::decode(&request).expect("decode request");
                            let echo = request
                                .params
                                .get("text")
                                .cloned()
                                .unwrap_or(Value::Null);
                            let body = CommandResponse::Result(echo).encode().expect("encode");
                            atomic_write(&paths.response(id), &body).expect("write response");
                            return;
                        }
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                panic!("no request appeared");
            }
        });

        let mut params = Map::new();
        params.insert("text".to_owned(), json!("hi"));
        let value = fixture
            .client
            .send("echo", params, Duration::from_secs(2))
            .expect("send succeeds");
        responder.join().expect("responder thread");

        assert_eq!(value, json!("hi"));
        assert!(drop_dir_files(&fixture).is_empty());
    }
}
