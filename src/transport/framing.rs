//! Frame reassembly for stream transports.
//!
//! A stream delivery may carry a fraction of a message or several messages
//! back to back. The buffer holds partial bytes until the outer SEQUENCE
//! header declares a complete frame, then yields exactly that frame and
//! retains any surplus for the next delivery.

use crate::ber::MAX_MESSAGE_LENGTH;
use crate::error::{DecodeErrorKind, Error, Result};
use bytes::{Bytes, BytesMut};

/// Reassembly buffer for one stream connection.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held (complete or partial).
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one transport delivery.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete message, if one is buffered.
    ///
    /// `Ok(None)` means "keep the bytes, wait for more". A first byte that
    /// is not the outer SEQUENCE tag means the stream is desynchronized and
    /// cannot recover; that is an error, not a wait.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let Some(&first) = self.buf.first() else {
            return Ok(None);
        };
        if first != crate::ber::tag::universal::SEQUENCE {
            return Err(Error::decode(
                0,
                DecodeErrorKind::UnexpectedTag {
                    expected: crate::ber::tag::universal::SEQUENCE,
                    actual: first,
                },
            ));
        }

        let Some((body_len, header_len)) = peek_length(&self.buf[1..])? else {
            return Ok(None);
        };
        if body_len > MAX_MESSAGE_LENGTH {
            return Err(Error::decode(
                1,
                DecodeErrorKind::LengthExceedsMax {
                    length: body_len,
                    max: MAX_MESSAGE_LENGTH,
                },
            ));
        }

        let total = 1 + header_len + body_len;
        if self.buf.len() < total {
            return Ok(None);
        }
        Ok(Some(self.buf.split_to(total).freeze()))
    }
}

/// Like length decoding, but incomplete input is "not yet" rather than an
/// error. Returns `(length, length-field octets)`.
fn peek_length(data: &[u8]) -> Result<Option<(usize, usize)>> {
    let Some(&first) = data.first() else {
        return Ok(None);
    };
    if first == 0x80 {
        return Err(Error::decode(1, DecodeErrorKind::IndefiniteLength));
    }
    if first & 0x80 == 0 {
        return Ok(Some((first as usize, 1)));
    }
    let octets = (first & 0x7F) as usize;
    if octets == 0 {
        return Err(Error::decode(1, DecodeErrorKind::InvalidLength));
    }
    if octets > 4 {
        return Err(Error::decode(
            1,
            DecodeErrorKind::LengthTooLong { octets },
        ));
    }
    if data.len() < 1 + octets {
        return Ok(None);
    }
    let mut len = 0usize;
    for &b in &data[1..=octets] {
        len = (len << 8) | b as usize;
    }
    Ok(Some((len, 1 + octets)))
}
