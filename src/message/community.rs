//! Classic-dialect envelope (v1/v2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, PDU }` — the two
//! classic versions differ only in the version integer and the commands they
//! admit.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::version::Version;
use bytes::Bytes;

/// A community-authenticated message.
#[derive(Debug, Clone)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Wrap a PDU. `version` must be a classic dialect.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        debug_assert!(
            !version.is_secured(),
            "community envelope cannot carry the secured dialect"
        );
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    pub fn encode(&self) -> Bytes {
        Self::encode_parts(self.version, &self.community, &self.pdu)
    }

    /// Encode without owning the parts; the session's send path borrows the
    /// PDU it is about to track.
    pub(crate) fn encode_parts(version: Version, community: &Bytes, pdu: &Pdu) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            pdu.encode(buf);
            buf.push_octet_string(community);
            buf.push_integer(version.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let raw_version = seq.read_integer()?;
        let version = Version::from_i32(raw_version).ok_or_else(|| {
            Error::decode(seq.offset(), DecodeErrorKind::UnknownVersion(raw_version))
        })?;
        Self::decode_after_version(&mut seq, version)
    }

    /// Continue decoding once the outer version integer has been consumed.
    pub(crate) fn decode_after_version(seq: &mut Decoder, version: Version) -> Result<Self> {
        if version.is_secured() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::UnknownVersion(version.as_i32()),
            ));
        }
        let community = seq.read_octet_string()?;
        let mut pdu = Pdu::decode(seq)?;
        pdu.version = Some(version);
        pdu.community = community.clone();
        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn v1_roundtrip() {
        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        pdu.request_id = 42;
        let msg = CommunityMessage::new(Version::V1, Bytes::from_static(b"public"), pdu);
        let decoded = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(decoded.version, Version::V1);
        assert_eq!(&decoded.community[..], b"public");
        assert_eq!(decoded.pdu.request_id, 42);
    }

    #[test]
    fn v2c_roundtrip_keeps_version() {
        for version in [Version::V1, Version::V2c] {
            let mut pdu = Pdu::get(&[oid!(1, 3, 6)]);
            pdu.request_id = 1;
            let msg = CommunityMessage::new(version, Bytes::from_static(b"ops"), pdu);
            let decoded = CommunityMessage::decode(msg.encode()).unwrap();
            assert_eq!(decoded.version, version);
            assert_eq!(decoded.pdu.version, Some(version));
        }
    }

    #[test]
    fn unknown_version_rejected() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(b"x");
            buf.push_integer(9);
        });
        assert!(CommunityMessage::decode(buf.finish()).is_err());
    }
}
