//! Secured-dialect envelope (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData {
//!         INTEGER msgID
//!         INTEGER msgMaxSize
//!         OCTET STRING msgFlags (1 byte: auth, priv, reportable)
//!         INTEGER msgSecurityModel
//!     }
//!     OCTET STRING msgSecurityParameters (model-specific)
//!     msgData: ScopedPDU | encrypted OCTET STRING
//! }
//! ScopedPDU ::= SEQUENCE { contextEngineID, contextName, PDU }
//! ```

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use bytes::Bytes;

/// Security level, ordered so each level implies the guarantees below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Decode from the low two bits of the msgFlags byte.
    ///
    /// Privacy without authentication is not a level (RFC 3412).
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        self >= Self::AuthNoPriv
    }

    pub fn requires_priv(self) -> bool {
        self == Self::AuthPriv
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuthNoPriv => write!(f, "noAuthNoPriv"),
            Self::AuthNoPriv => write!(f, "authNoPriv"),
            Self::AuthPriv => write!(f, "authPriv"),
        }
    }
}

/// The one-byte msgFlags field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    /// Peer may answer failures with a Report PDU.
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        let security_level = SecurityLevel::from_flags(byte)
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::InvalidMsgFlags))?;
        Ok(Self {
            security_level,
            reportable: byte & 0x04 != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        self.security_level.to_flags() | if self.reportable { 0x04 } else { 0x00 }
    }
}

/// msgGlobalData header.
#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
    pub msg_security_model: i32,
}

impl MsgGlobalData {
    /// RFC 3412 lower bound on msgMaxSize.
    pub const MSG_MAX_SIZE_MIN: i32 = 484;

    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags, msg_security_model: i32) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(self.msg_security_model);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    /// Decode and range-check per the RFC 3412 HeaderData definition.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::MsgIdOutOfRange(msg_id),
            ));
        }

        let msg_max_size = seq.read_integer()?;
        if msg_max_size < Self::MSG_MAX_SIZE_MIN {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::MsgMaxSizeOutOfRange(msg_max_size),
            ));
        }

        let flags_octets = seq.read_octet_string()?;
        if flags_octets.len() != 1 {
            return Err(Error::decode(seq.offset(), DecodeErrorKind::InvalidMsgFlags));
        }
        let msg_flags = MsgFlags::from_byte(flags_octets[0])
            .map_err(|_| Error::decode(seq.offset(), DecodeErrorKind::InvalidMsgFlags))?;

        let msg_security_model = seq.read_integer()?;

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags,
            msg_security_model,
        })
    }
}

/// Context wrapper around the inner PDU.
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: impl Into<Bytes>, context_name: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            context_engine_id: context_engine_id.into(),
            context_name: context_name.into(),
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

/// Message body: plaintext until the auth-priv level encrypts it.
#[derive(Debug, Clone)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

/// A secured-dialect message.
#[derive(Debug, Clone)]
pub struct V3Message {
    pub global: MsgGlobalData,
    /// Opaque model-specific security parameters.
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn new(global: MsgGlobalData, security_params: Bytes, scoped_pdu: ScopedPdu) -> Self {
        Self {
            global,
            security_params,
            data: V3MessageData::Plaintext(scoped_pdu),
        }
    }

    pub fn new_encrypted(global: MsgGlobalData, security_params: Bytes, ciphertext: Bytes) -> Self {
        Self {
            global,
            security_params,
            data: V3MessageData::Encrypted(ciphertext),
        }
    }

    pub fn msg_id(&self) -> i32 {
        self.global.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global.msg_flags.security_level
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(s) => Some(s),
            V3MessageData::Encrypted(_) => None,
        }
    }

    /// Encode the whole message.
    ///
    /// For authenticated messages the security parameters must carry a
    /// zeroed digest placeholder; the model patches the real digest into the
    /// encoded bytes afterwards.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ct) => buf.push_octet_string(ct),
            }
            buf.push_octet_string(&self.security_params);
            self.global.encode(buf);
            buf.push_integer(crate::version::Version::V3.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let version = seq.read_integer()?;
        if version != crate::version::Version::V3.as_i32() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version),
            ));
        }
        Self::decode_after_version(&mut seq)
    }

    /// Continue decoding once the outer version integer has been consumed.
    pub(crate) fn decode_after_version(seq: &mut Decoder) -> Result<Self> {
        let global = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global,
            security_params,
            data,
        })
    }
}
