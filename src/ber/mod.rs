//! BER (Basic Encoding Rules) codec.
//!
//! Every SNMP message, whichever dialect, is a nest of tag-length-value
//! records. This module provides the encoder ([`EncodeBuf`]) and decoder
//! ([`Decoder`]) shared by the community and USM message formats. Parsing is
//! permissive where net-snmp is permissive (non-minimal integers, oversized
//! length encodings) and strict where it is strict (indefinite lengths,
//! constructed OCTET STRINGs).

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_MESSAGE_LENGTH, decode_length, encode_length, length_encoded_len};
