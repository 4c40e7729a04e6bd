//! Wire message envelopes.
//!
//! [`CommunityMessage`] wraps a PDU in the classic
//! `SEQUENCE { version, community, PDU }` form; [`V3Message`] wraps a scoped
//! PDU in the secured-dialect header with security parameters. Both share the
//! BER substrate in [`crate::ber`].

mod community;
mod v3;

pub use community::CommunityMessage;
pub use v3::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};
