//! The deaddrop listener daemon.
//!
//! `deaddropd` serves the listener half of the file bridge: a poll loop that
//! discovers `command_<id>.json` envelopes in the shared drop directory,
//! claims each one exactly once by renaming it to its processed marker,
//! executes it through the [`Dispatcher`], and writes the response file the
//! caller is waiting on. A status record is republished on an independent
//! heartbeat interval so callers can tell a live listener from a crashed one
//! without issuing a command.
//!
//! Embedding hosts build a [`Dispatcher`] with their domain handlers, wrap it
//! in a [`Bridge`], and drive `start`/`stop` from their own lifecycle. The
//! bundled binary does the same with only the built-in introspection
//! handlers, which is enough to exercise the transport end to end.

mod dispatch;
mod lifecycle;
mod monitor;
mod shutdown;
mod telemetry;

pub use dispatch::{CommandHandler, Dispatcher, HandlerError, register_builtins};
pub use lifecycle::{Bridge, BridgeError, BridgeState};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};
