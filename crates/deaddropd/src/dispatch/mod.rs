//! Command dispatch for the listener.
//!
//! The dispatcher is a pure name-to-handler lookup with no transport
//! concerns: the poll loop hands it `(command, params)` pairs decoded from
//! request envelopes and converts whatever comes back into a response file.
//! Domain operations live behind the [`CommandHandler`] seam and are
//! registered by the embedding host; this crate only ships the introspection
//! handlers every listener advertises.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use deaddrop_protocol::Capabilities;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Errors a handler invocation can surface.
///
/// Handler failures are caught per item by the poll loop and turned into
/// error responses; they never stop the loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No handler is registered under the requested name.
    #[error("unknown command '{command}'")]
    UnknownCommand {
        /// The requested command name.
        command: String,
    },
    /// The handler ran and reported a failure.
    #[error("{message}")]
    Failed {
        /// Message forwarded to the caller in the error response.
        message: String,
    },
}

impl HandlerError {
    /// Builds a handler failure carrying the given message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// A single command implementation owned by the host.
pub trait CommandHandler: Send + Sync {
    /// Executes the command with the caller's parameters.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] when the operation fails; the message is
    /// forwarded verbatim to the caller.
    fn invoke(&self, params: &Map<String, Value>) -> Result<Value, HandlerError>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Map<String, Value>) -> Result<Value, HandlerError> + Send + Sync,
{
    fn invoke(&self, params: &Map<String, Value>) -> Result<Value, HandlerError> {
        self(params)
    }
}

/// Maps command names to their handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<String, Box<dyn CommandHandler>>,
}

impl Dispatcher {
    /// Builds an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, replacing any previous one under the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: impl CommandHandler + 'static) {
        self.handlers.insert(name.into(), Box::new(handler));
    }

    /// Names of all registered commands, sorted.
    #[must_use]
    pub fn command_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Looks up and invokes the handler for the given command.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::UnknownCommand`] when nothing is registered
    /// under the name, or the handler's own error when it fails.
    pub fn dispatch(
        &self,
        command: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, HandlerError> {
        let handler = self
            .handlers
            .get(command)
            .ok_or_else(|| HandlerError::UnknownCommand {
                command: command.to_owned(),
            })?;
        debug!(target: DISPATCH_TARGET, command, "invoking handler");
        handler.invoke(params)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Dispatcher")
            .field("commands", &self.command_names())
            .finish()
    }
}

/// Registers the introspection handlers every listener serves.
///
/// `list_tools`, `list_resources`, and `list_prompts` answer with the
/// advertised capability names so callers can probe the bridge without domain
/// knowledge; `ping` is the cheapest reachability round trip.
pub fn register_builtins(dispatcher: &mut Dispatcher, capabilities: &Capabilities) {
    let tools = capabilities.tools.clone();
    dispatcher.register("list_tools", move |_params: &Map<String, Value>| {
        Ok(Value::from(tools.clone()))
    });
    let resources = capabilities.resources.clone();
    dispatcher.register("list_resources", move |_params: &Map<String, Value>| {
        Ok(Value::from(resources.clone()))
    });
    let prompts = capabilities.prompts.clone();
    dispatcher.register("list_prompts", move |_params: &Map<String, Value>| {
        Ok(Value::from(prompts.clone()))
    });
    dispatcher.register("ping", |_params: &Map<String, Value>| {
        Ok(Value::from("pong"))
    });
}
