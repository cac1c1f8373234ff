//! The listener's status record.
//!
//! `server_status.json` is a single document overwritten in place on every
//! heartbeat. It represents current liveness only, never history: the caller
//! decides reachability from the `status` field plus the age of
//! `heartbeat_unix`. The record also advertises the listener's capability
//! names so callers can discover what the host exposes without a round trip.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Converts a wall-clock reading to seconds since the Unix epoch.
#[must_use]
pub fn unix_seconds(moment: SystemTime) -> f64 {
    moment
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or_default()
}

/// Reported lifecycle state of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerStatus {
    /// The poll loop is active.
    Running,
    /// The listener shut down cleanly.
    Stopped,
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => formatter.write_str("running"),
            Self::Stopped => formatter.write_str("stopped"),
        }
    }
}

/// Capability names the listener advertises in its status record.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Resource identifiers the host can read.
    pub resources: Vec<String>,
    /// Command names the host can execute.
    pub tools: Vec<String>,
    /// Prompt template names the host can render.
    pub prompts: Vec<String>,
}

/// Snapshot of listener liveness, overwritten atomically on each heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    /// Reported lifecycle state.
    pub status: ListenerStatus,
    /// When the listener started, seconds since the Unix epoch.
    #[serde(default)]
    pub started_at_unix: f64,
    /// Human-readable rendering of `started_at_unix`.
    #[serde(default)]
    pub started_at: String,
    /// Last heartbeat, seconds since the Unix epoch. Absent in records
    /// written by older listeners.
    #[serde(default)]
    pub heartbeat_unix: Option<f64>,
    /// Human-readable rendering of `heartbeat_unix`.
    #[serde(default)]
    pub updated_at: String,
    /// Resource identifiers the listener serves.
    #[serde(default)]
    pub available_resources: Vec<String>,
    /// Command names the listener serves.
    #[serde(default)]
    pub available_tools: Vec<String>,
    /// Prompt template names the listener serves.
    #[serde(default)]
    pub available_prompts: Vec<String>,
}

impl StatusRecord {
    /// Builds a record stamped with the current wall clock.
    #[must_use]
    pub fn now(
        status: ListenerStatus,
        started_at_unix: f64,
        capabilities: &Capabilities,
    ) -> Self {
        let heartbeat = unix_seconds(SystemTime::now());
        Self {
            status,
            started_at_unix,
            started_at: format_unix(started_at_unix),
            heartbeat_unix: Some(heartbeat),
            updated_at: format_unix(heartbeat),
            available_resources: capabilities.resources.clone(),
            available_tools: capabilities.tools.clone(),
            available_prompts: capabilities.prompts.clone(),
        }
    }

    /// Age of the last heartbeat in seconds, given the current wall clock.
    ///
    /// Returns `None` when the record carries no heartbeat field.
    #[must_use]
    pub fn heartbeat_age(&self, now_unix: f64) -> Option<f64> {
        self.heartbeat_unix.map(|heartbeat| now_unix - heartbeat)
    }
}

/// Renders a Unix timestamp as RFC 3339, falling back to the raw number for
/// readings outside the representable range.
fn format_unix(seconds: f64) -> String {
    let nanos = (seconds * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|moment| moment.format(&Rfc3339).ok())
        .unwrap_or_else(|| format!("{seconds:.3}"))
}
