//! BER decoding over a shared byte buffer.
//!
//! [`Decoder`] reads from a `Bytes` handle without copying; sub-records are
//! sliced out of the parent buffer. A declared length is never trusted past
//! the bytes actually present, so a hostile header cannot make the decoder
//! read beyond what the transport delivered.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// Cursor over a BER-encoded buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self { data, offset: 0 }
    }

    /// Copying constructor for tests and small inputs.
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Absolute offset of the cursor within the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.offset) else {
            return Err(Error::decode(self.offset, DecodeErrorKind::Truncated));
        };
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Slice `len` bytes out of the buffer without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            tracing::debug!(
                target: "snmp_engine::ber",
                offset = self.offset,
                needed = len,
                available = self.remaining(),
                "declared length exceeds supplied bytes"
            );
            return Err(Error::decode(self.offset, DecodeErrorKind::Truncated));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Consume a specific tag and return its content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let at = self.offset;
        let actual = self.read_tag()?;
        if actual != expected {
            tracing::debug!(
                target: "snmp_engine::ber",
                offset = at,
                expected = format_args!("0x{expected:02X}"),
                actual = format_args!("0x{actual:02X}"),
                "tag mismatch"
            );
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        self.read_length()
    }

    /// Read a signed INTEGER (tag + length + content).
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_content(len)
    }

    /// Read signed integer content of a known length.
    ///
    /// Values longer than four octets are truncated with a warning, matching
    /// net-snmp's overflow handling rather than rejecting the message.
    pub fn read_integer_content(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 4 {
            tracing::warn!(target: "snmp_engine::ber", offset = self.offset, length = len, "integer too long, truncating to 4 bytes");
        }
        let bytes = self.read_bytes(len)?;
        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &b in bytes.iter().take(4) {
            value = (value << 8) | b as i32;
        }
        Ok(value)
    }

    /// Read an unsigned 32-bit value under a specific tag.
    pub fn read_unsigned32(&mut self, expected: u8) -> Result<u32> {
        let len = self.expect_tag(expected)?;
        self.read_unsigned32_content(len)
    }

    pub fn read_unsigned32_content(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 5 {
            tracing::warn!(target: "snmp_engine::ber", offset = self.offset, length = len, "unsigned integer too long, truncating");
        }
        let bytes = self.read_bytes(len)?;
        let mut value: u32 = 0;
        for &b in bytes.iter().take(5) {
            value = (value << 8) | b as u32;
        }
        Ok(value)
    }

    /// Read unsigned 64-bit content of a known length (Counter64).
    pub fn read_unsigned64_content(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::ZeroLengthInteger,
            ));
        }
        if len > 9 {
            // one optional leading zero plus eight value octets
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::IntegerTooLong { length: len },
            ));
        }
        let bytes = self.read_bytes(len)?;
        let mut value: u64 = 0;
        for &b in bytes.iter() {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(Error::decode(self.offset, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_content(len)
    }

    pub fn read_oid_content(&mut self, len: usize) -> Result<Oid> {
        let at = self.offset;
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|e| match e {
            Error::Decode { kind, .. } => Error::decode(at, kind),
            other => other,
        })
    }

    /// Read an IpAddress (exactly 4 octets).
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        if len != 4 {
            return Err(Error::decode(
                self.offset,
                DecodeErrorKind::InvalidIpAddressLength { length: len },
            ));
        }
        let b = self.read_bytes(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    /// Enter a SEQUENCE, returning a sub-decoder scoped to its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Enter any constructed record with the expected tag.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected)?;
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Sub-decoder over the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let content = self.read_bytes(len)?;
        Ok(Decoder::new(content))
    }

    /// Skip one complete TLV.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _ = self.read_tag()?;
        let len = self.read_length()?;
        let next = self.offset.saturating_add(len);
        if next > self.data.len() {
            return Err(Error::decode(self.offset, DecodeErrorKind::Truncated));
        }
        self.offset = next;
        Ok(())
    }
}
