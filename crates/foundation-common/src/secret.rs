//! Secret-classified configuration values
//!
//! A [`Secret`] carries credentials such as the DNS provider API token from
//! the configuration surface down to the subsystem that consumes it. Every
//! human-readable or serialized form is redacted; only [`Secret::expose`]
//! yields the value, and the backing memory is zeroized on drop.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

/// Placeholder rendered wherever a secret would otherwise appear
pub const REDACTED: &str = "[REDACTED]";

/// A string value that never renders in plaintext
#[derive(Clone)]
pub struct Secret {
    value: Zeroizing<String>,
}

impl Secret {
    /// Wrap a plaintext value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Zeroizing::new(value.into()),
        }
    }

    /// Access the plaintext value
    ///
    /// Only call this at the boundary where the value is handed to the
    /// reconciliation engine, never for logging.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Whether the wrapped value is empty
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.value.as_str() == other.value.as_str()
    }
}

impl Eq for Secret {}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&REDACTED).finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Secret::new)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
