//! Protocol module containing packet types and the binary codec.

pub mod codec;
pub mod packets;

pub use codec::{decode, decode_host_packet, encode, encode_wing_packet, peek_variant, DecodeError};
pub use packets::*;
