//! Drop-directory layout shared by the caller and the listener.
//!
//! Every durable state a request can be in is expressed purely through file
//! presence and naming: `command_<id>.json` is pending,
//! `processed_command_<id>.json` is the listener's claim,
//! `bad_command_<id>.json` marks an unparsable request, and
//! `response_<id>.json` carries the result back. Both binaries derive their
//! paths from this one module so the naming scheme can never drift.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::id::CommandId;

const COMMAND_PREFIX: &str = "command_";
const RESPONSE_PREFIX: &str = "response_";
const PROCESSED_PREFIX: &str = "processed_command_";
const BAD_PREFIX: &str = "bad_command_";
const JSON_SUFFIX: &str = ".json";
const STATUS_FILE: &str = "server_status.json";
const LEGACY_SENTINEL: &str = "client_ready.txt";

/// Canonical paths inside a drop directory.
#[derive(Debug, Clone)]
pub struct DropPaths {
    dir: PathBuf,
}

impl DropPaths {
    /// Wraps the given drop directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The drop directory itself.
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// Creates the drop directory when it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when directory creation fails.
    pub fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Path of a pending request envelope.
    #[must_use]
    pub fn command(&self, id: &CommandId) -> PathBuf {
        self.dir.join(format!("{COMMAND_PREFIX}{id}{JSON_SUFFIX}"))
    }

    /// Path of a response envelope.
    #[must_use]
    pub fn response(&self, id: &CommandId) -> PathBuf {
        self.dir.join(format!("{RESPONSE_PREFIX}{id}{JSON_SUFFIX}"))
    }

    /// Path of the terminal marker for a claimed request.
    #[must_use]
    pub fn processed(&self, id: &CommandId) -> PathBuf {
        self.dir.join(format!("{PROCESSED_PREFIX}{id}{JSON_SUFFIX}"))
    }

    /// Path of the terminal marker for an unparsable request.
    #[must_use]
    pub fn bad(&self, id: &CommandId) -> PathBuf {
        self.dir.join(format!("{BAD_PREFIX}{id}{JSON_SUFFIX}"))
    }

    /// Path of the listener status record.
    #[must_use]
    pub fn status(&self) -> PathBuf {
        self.dir.join(STATUS_FILE)
    }

    /// Path of the legacy liveness sentinel honoured by older listeners.
    #[must_use]
    pub fn legacy_sentinel(&self) -> PathBuf {
        self.dir.join(LEGACY_SENTINEL)
    }

    /// Lists the ids of all pending request envelopes, sorted by file name.
    ///
    /// Sorting by name sorts by id, which makes the listener process
    /// requests in arrival-as-filed order. File names that do not follow the
    /// request naming scheme are ignored.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the directory cannot be read.
    pub fn pending_request_ids(&self) -> io::Result<Vec<CommandId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(token) = request_id_token(name) {
                if let Ok(id) = CommandId::from_token(token) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Names of response, processed, and bad marker files in the directory.
    ///
    /// Used by the listener's reaper to find terminal files that have lost
    /// their consumer.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error when the directory cannot be read.
    pub fn terminal_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let terminal = name.ends_with(JSON_SUFFIX)
                && (name.starts_with(RESPONSE_PREFIX)
                    || name.starts_with(PROCESSED_PREFIX)
                    || name.starts_with(BAD_PREFIX));
            if terminal {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}

/// Extracts the id token from a `command_<id>.json` file name.
fn request_id_token(name: &str) -> Option<&str> {
    name.strip_prefix(COMMAND_PREFIX)?.strip_suffix(JSON_SUFFIX)
}
