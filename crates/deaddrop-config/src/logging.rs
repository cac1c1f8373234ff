//! Logging format selection shared by the binaries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output format for structured telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-oriented text lines.
    Text,
    /// Newline-delimited JSON for log collectors.
    Json,
}

/// Error produced when parsing a [`LogFormat`] value.
#[derive(Debug, Error)]
#[error("unsupported log format '{0}'; expected 'text' or 'json'")]
pub struct LogFormatParseError(String);

impl fmt::Display for LogFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => formatter.write_str("text"),
            Self::Json => formatter.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = LogFormatParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(LogFormatParseError(value.to_owned())),
        }
    }
}
