//! Device identity types.
//!
//! Every session is known by three values captured during the handshake:
//!
//! - [`ID`] – the stable device name (e.g. `mac:112233445566`).  Several
//!   sessions may share an ID briefly while a device reconnects.
//! - [`Key`] – the routing key produced by the configured key function.
//!   At most one active session holds a given key.
//! - [`Convey`] – opaque metadata the device sent in its convey header.

use std::fmt;

/// The stable identifier a device presents in its device-name header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ID(String);

impl ID {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ID {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The routing/sharding key of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Opaque device-supplied metadata.  Absent when the device sent no convey
/// header.  Never parsed by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Convey(Option<String>);

impl Convey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Some(raw.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_matches_input() {
        assert_eq!(ID::from("mac:112233445566").to_string(), "mac:112233445566");
    }

    #[test]
    fn test_key_bytes() {
        assert_eq!(Key::new("shard-7").as_bytes(), b"shard-7");
    }

    #[test]
    fn test_convey_absent_by_default() {
        assert!(Convey::default().is_none());
        assert_eq!(Convey::new("eyJmdyI6IjEuMCJ9").as_str(), Some("eyJmdyI6IjEuMCJ9"));
    }
}
