//! BER encoding via a reverse buffer.
//!
//! Content is written back-to-front so each constructed header can be
//! prepended once its body length is known, with a single reversal at the
//! end. This is the "append-from-the-end" strategy net-snmp calls reverse
//! encoding; nothing downstream depends on it, only on the bytes produced.

use super::length::encode_length;
use super::tag;
use bytes::Bytes;

/// Growing reverse buffer for BER output.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend a single byte.
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Prepend a run of bytes, preserving their order on the wire.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Prepend a length field.
    pub fn push_length(&mut self, len: usize) {
        let (octets, n) = encode_length(len);
        // encode_length already returns reversed octets
        self.buf.extend_from_slice(&octets[..n]);
    }

    /// Prepend a tag byte.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Encode a constructed record: run `body`, then prepend length and tag.
    ///
    /// Because the buffer is reversed, `body` must push members in reverse
    /// wire order.
    pub fn push_constructed<F>(&mut self, tag: u8, body: F)
    where
        F: FnOnce(&mut Self),
    {
        let mark = self.len();
        body(self);
        let content_len = self.len() - mark;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, body: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, body);
    }

    /// Encode a signed INTEGER in minimal form.
    pub fn push_integer(&mut self, value: i32) {
        let be = value.to_be_bytes();
        let mut skip = 0;
        if value >= 0 {
            while skip < 3 && be[skip] == 0x00 && be[skip + 1] & 0x80 == 0 {
                skip += 1;
            }
        } else {
            while skip < 3 && be[skip] == 0xFF && be[skip + 1] & 0x80 != 0 {
                skip += 1;
            }
        }
        self.push_bytes(&be[skip..]);
        self.push_length(4 - skip);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode an unsigned 32-bit value under the given tag.
    ///
    /// A leading zero octet is inserted when the top bit is set so the value
    /// stays non-negative under signed interpretation.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let be = value.to_be_bytes();
        let mut skip = 0;
        while skip < 3 && be[skip] == 0 {
            skip += 1;
        }
        let lead_zero = be[skip] & 0x80 != 0;
        self.push_bytes(&be[skip..]);
        if lead_zero {
            self.push_byte(0x00);
        }
        self.push_length(4 - skip + usize::from(lead_zero));
        self.push_tag(tag);
    }

    /// Encode an unsigned 64-bit value under the given tag (Counter64).
    pub fn push_unsigned64(&mut self, tag: u8, value: u64) {
        let be = value.to_be_bytes();
        let mut skip = 0;
        while skip < 7 && be[skip] == 0 {
            skip += 1;
        }
        let lead_zero = be[skip] & 0x80 != 0;
        self.push_bytes(&be[skip..]);
        if lead_zero {
            self.push_byte(0x00);
        }
        self.push_length(8 - skip + usize::from(lead_zero));
        self.push_tag(tag);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &crate::oid::Oid) {
        let packed = oid.to_ber();
        self.push_bytes(&packed);
        self.push_length(packed.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    /// Encode an IpAddress (application tag, 4 octets).
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Reverse into wire order and hand the bytes off.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }

    /// Like [`finish`](Self::finish) but keeps the `Vec` (for in-place
    /// post-processing such as HMAC patching).
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}
