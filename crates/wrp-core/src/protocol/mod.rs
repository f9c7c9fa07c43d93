//! Protocol module containing the WRP message model and the binary codec.

pub mod codec;
pub mod messages;

pub use codec::{Codec, CodecConfig, CodecError, DEFAULT_MAX_MESSAGE_SIZE};
pub use messages::*;
