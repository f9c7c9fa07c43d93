//! MessagePack codec for WRP messages.
//!
//! Wire format: one MessagePack map per message, keyed by field tag:
//! ```text
//! { "msg_type": int, "status": int?, "transaction_uuid": str?,
//!   "source": str?, "dest": str?, "payload": bin? }
//! ```
//! Optional fields are omitted when empty.  Each WebSocket binary frame
//! carries exactly one map, so no length prefix is needed.
//!
//! The codec carries its configuration explicitly.  Build one [`Codec`] at
//! startup and share it; there is no process-wide codec state.

use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::Message;

/// Default upper bound on an encoded message, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during message encoding or decoding.
///
/// These are format errors only.  A message that decodes cleanly may still
/// fail [`Message::valid`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialization to MessagePack failed.
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// The bytes are not a well-formed WRP MessagePack map.
    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The frame exceeds the configured size limit.
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },
}

/// Immutable codec settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Largest encoded message accepted in either direction.
    pub max_message_size: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Encodes and decodes [`Message`] values.
///
/// `Codec` is `Copy`, so it can be handed to every session task by value.
///
/// # Examples
///
/// ```rust
/// use wrp_core::{Codec, Message, MessageType};
///
/// let codec = Codec::default();
/// let msg = Message {
///     destination: "mac:112233445566/config".to_string(),
///     payload: vec![0xde, 0xad],
///     ..Message::new(MessageType::SimpleRequestResponse)
/// };
/// let bytes = codec.encode(&msg).unwrap();
/// assert_eq!(codec.decode(&bytes).unwrap(), msg);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    /// Creates a codec with the given settings.
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Returns the settings this codec was built with.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encodes `message` as a MessagePack map with named fields.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails, or
    /// [`CodecError::MessageTooLarge`] if the result exceeds the limit.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        let bytes = rmp_serde::to_vec_named(message)?;
        self.check_size(bytes.len())?;
        Ok(bytes)
    }

    /// Decodes one message from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MessageTooLarge`] before parsing oversized input,
    /// and [`CodecError::Decode`] for any MessagePack format violation.
    pub fn decode(&self, bytes: &[u8]) -> Result<Message, CodecError> {
        self.check_size(bytes.len())?;
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn check_size(&self, size: usize) -> Result<(), CodecError> {
        let limit = self.config.max_message_size;
        if size > limit {
            debug!(size, limit, "rejecting oversized WRP message");
            return Err(CodecError::MessageTooLarge { size, limit });
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
