//! # wrp-core
//!
//! Shared library for the device gateway containing the WRP message model,
//! its validation rules, and the MessagePack codec.
//!
//! This crate has no I/O and no async runtime.  Both the device session layer
//! (`wrp-device`) and anything else that speaks the device protocol build on it.
//!
//! # Architecture overview
//!
//! - **`protocol::messages`** – the [`Message`] record, the [`MessageType`]
//!   codes and [`Message::valid`].
//! - **`protocol::codec`** – [`Codec`], which turns a message into one
//!   MessagePack map and back.  Codec settings are an explicit value, never
//!   global state.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `wrp_core::Message` instead of `wrp_core::protocol::messages::Message`.
pub use protocol::codec::{Codec, CodecConfig, CodecError};
pub use protocol::messages::{describe, Message, MessageType, ValidationError};
