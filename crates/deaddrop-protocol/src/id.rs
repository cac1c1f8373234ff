//! Command identifiers.
//!
//! An id is minted once per request by the caller and never reused. The
//! filename derived from it is the only correlation between a request and its
//! response, so the id doubles as the join key and must stay filesystem-safe.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

/// Number of hex characters of the random suffix kept in an id.
const SUFFIX_LEN: usize = 8;

/// Unique identifier for a single command round trip.
///
/// Generated ids are `<nanosecond clock reading>_<8 random hex chars>`. The
/// leading clock component makes lexicographic filename order approximate
/// arrival order; the random suffix keeps ids unique under rapid issuance and
/// across caller restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(String);

/// Errors raised when adopting an externally supplied id token.
#[derive(Debug, Error)]
pub enum CommandIdError {
    /// The token was empty.
    #[error("command id token is empty")]
    Empty,
    /// The token contained a character that is unsafe in a file name.
    #[error("command id token '{token}' contains unsupported character '{character}'")]
    UnsupportedCharacter {
        /// The rejected token.
        token: String,
        /// The first offending character.
        character: char,
    },
}

impl CommandId {
    /// Mints a fresh id from the current clock reading and a random suffix.
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        let short = suffix.get(..SUFFIX_LEN).unwrap_or(suffix.as_str());
        Self(format!("{nanos}_{short}"))
    }

    /// Adopts a token recovered from a file name.
    ///
    /// # Errors
    ///
    /// Returns [`CommandIdError`] when the token is empty or contains
    /// characters that cannot appear in a drop-directory file name.
    pub fn from_token(token: impl Into<String>) -> Result<Self, CommandIdError> {
        let token = token.into();
        if token.is_empty() {
            return Err(CommandIdError::Empty);
        }
        if let Some(character) = token
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(CommandIdError::UnsupportedCharacter { token, character });
        }
        Ok(Self(token))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
