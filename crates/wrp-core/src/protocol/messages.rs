//! WRP message types and validation rules.
//!
//! A WRP message is a flat, field-tagged record.  The [`MessageType`] decides
//! which of the other fields must be populated; [`Message::valid`] enforces
//! those rules.  Decoding never validates, so a peer can hand us a message
//! with a reserved type and the caller decides what to do with it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Message type codes ────────────────────────────────────────────────────────

/// Display name used for any type code outside the defined set.
pub const INVALID_MESSAGE_TYPE_NAME: &str = "!!INVALID!!";

/// The kind of a WRP message, carried on the wire as the integer `msg_type`.
///
/// Codes 0, 1 and anything from 5 upward are reserved.  They still decode
/// (as [`MessageType::Reserved`]) so that validation can name the bad value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MessageType {
    Auth,
    SimpleRequestResponse,
    SimpleEvent,
    Reserved(i64),
}

impl MessageType {
    /// Returns the wire code for this type.
    pub fn code(self) -> i64 {
        match self {
            MessageType::Auth => 2,
            MessageType::SimpleRequestResponse => 3,
            MessageType::SimpleEvent => 4,
            MessageType::Reserved(code) => code,
        }
    }

    /// Returns the human-readable name, or [`INVALID_MESSAGE_TYPE_NAME`].
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Auth => "Auth",
            MessageType::SimpleRequestResponse => "SimpleRequestResponse",
            MessageType::SimpleEvent => "SimpleEvent",
            MessageType::Reserved(_) => INVALID_MESSAGE_TYPE_NAME,
        }
    }
}

impl From<i64> for MessageType {
    fn from(code: i64) -> Self {
        match code {
            2 => MessageType::Auth,
            3 => MessageType::SimpleRequestResponse,
            4 => MessageType::SimpleEvent,
            other => MessageType::Reserved(other),
        }
    }
}

impl From<MessageType> for i64 {
    fn from(message_type: MessageType) -> Self {
        message_type.code()
    }
}

impl Default for MessageType {
    /// The zero code, which is reserved.  A defaulted message is therefore
    /// never valid until its type is set.
    fn default() -> Self {
        MessageType::Reserved(0)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Reasons a message fails [`Message::valid`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The type code is not one of the defined message types.
    #[error("invalid message type: {0}")]
    InvalidType(i64),

    /// Routed message types must name a destination.
    #[error("missing destination for message type: {0}")]
    MissingDestination(MessageType),
}

// ── Message ───────────────────────────────────────────────────────────────────

/// A single WRP message.
///
/// Field tags on the wire are `msg_type`, `status`, `transaction_uuid`,
/// `source`, `dest` and `payload`.  Absent status, empty strings and an empty
/// payload are left out of the encoding entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "msg_type", default)]
    pub message_type: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_uuid: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(rename = "dest", default, skip_serializing_if = "String::is_empty")]
    pub destination: String,

    /// Opaque application bytes, encoded as MessagePack `bin`.
    #[serde(default, with = "serde_bytes", skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,
}

impl Message {
    /// Creates an empty message of the given type.
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            ..Self::default()
        }
    }

    /// Checks the structural rules for this message's type.
    ///
    /// `Auth` needs nothing else.  `SimpleRequestResponse` and `SimpleEvent`
    /// need a non-empty destination.  No other field is inspected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] describing the first rule broken.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wrp_core::{Message, MessageType};
    ///
    /// let mut event = Message::new(MessageType::SimpleEvent);
    /// assert!(event.valid().is_err());
    ///
    /// event.destination = "event:device-status".to_string();
    /// assert!(event.valid().is_ok());
    /// ```
    pub fn valid(&self) -> Result<(), ValidationError> {
        match self.message_type {
            MessageType::Auth => Ok(()),
            MessageType::SimpleRequestResponse | MessageType::SimpleEvent => {
                if self.destination.is_empty() {
                    Err(ValidationError::MissingDestination(self.message_type))
                } else {
                    Ok(())
                }
            }
            MessageType::Reserved(code) => Err(ValidationError::InvalidType(code)),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Type: {}, Status: ", self.message_type)?;
        match self.status {
            Some(status) => write!(f, "{status}")?,
            None => f.write_str("nil")?,
        }
        write!(
            f,
            ", Source: {}, Destination: {}, Payload: {:?}}}",
            self.source, self.destination, self.payload
        )
    }
}

/// Renders an optional message for diagnostics; a missing message is `nil`.
pub fn describe(message: Option<&Message>) -> String {
    match message {
        Some(message) => message.to_string(),
        None => "nil".to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
