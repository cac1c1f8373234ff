//! Wire protocol for the deaddrop file bridge.
//!
//! Both sides of the bridge speak through files in a shared drop directory:
//! the caller writes `command_<id>.json` envelopes, the listener answers with
//! `response_<id>.json` and leaves `processed_command_<id>.json` markers
//! behind as claims. This crate owns everything both binaries must agree on:
//! command id generation, the file naming scheme, the request/response
//! envelope codec, the listener status record, and the temp-file plus
//! atomic-rename write discipline that keeps partially written payloads from
//! ever being observable.

mod envelope;
mod fs;
mod id;
mod paths;
mod status;

pub use envelope::{CommandRequest, CommandResponse, EnvelopeError};
pub use fs::{atomic_write, remove_file_if_exists};
pub use id::{CommandId, CommandIdError};
pub use paths::DropPaths;
pub use status::{Capabilities, ListenerStatus, StatusRecord, unix_seconds};
