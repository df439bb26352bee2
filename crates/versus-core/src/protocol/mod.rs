//! Protocol module containing the message envelope and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use messages::*;
