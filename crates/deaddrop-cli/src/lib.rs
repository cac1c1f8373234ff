//! Caller-side library for the deaddrop file bridge.
//!
//! Exposes the blocking RPC stub ([`client::RpcClient`]), the listener
//! liveness monitor ([`liveness::LivenessMonitor`]), and the argument
//! handling behind the `deaddrop` binary.

pub mod cli;
pub mod client;
pub mod liveness;

pub use cli::{AppError, Cli, CliCommand, run};
pub use client::{RpcClient, SendError};
pub use liveness::{LivenessMonitor, Reachability};
