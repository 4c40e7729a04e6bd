//! Variable bindings: (OID, typed value) pairs.

use crate::ber::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// One variable binding.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Binding with a NULL value, the form every request carries.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let oid = seq.read_oid()?;
        let value = Value::decode(&mut seq)?;
        Ok(Self { oid, value })
    }

    /// Exact encoded size without allocating.
    pub fn encoded_size(&self) -> usize {
        let content = self.oid.ber_encoded_len() + self.value.ber_encoded_len();
        1 + crate::ber::length_encoded_len(content) + content
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encode a binding list as `SEQUENCE OF SEQUENCE { name, value }`.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) {
    buf.push_sequence(|buf| {
        // reverse buffer: last binding first
        for vb in varbinds.iter().rev() {
            vb.encode(buf);
        }
    });
}

/// Decode a binding list.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut seq = decoder.read_sequence()?;
    let mut varbinds = Vec::with_capacity((seq.remaining() / 16).max(1));
    while !seq.is_empty() {
        varbinds.push(VarBind::decode(&mut seq)?);
    }
    Ok(varbinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use bytes::Bytes;

    #[test]
    fn varbind_roundtrip() {
        let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("router1"));
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(VarBind::decode(&mut dec).unwrap(), vb);
    }

    #[test]
    fn list_preserves_order() {
        let list = vec![
            VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)),
            VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(99)),
            VarBind::new(
                oid!(1, 3, 6, 1, 2, 1, 1, 4, 0),
                Value::OctetString(Bytes::from_static(b"ops")),
            ),
        ];
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &list);
        let mut dec = Decoder::new(buf.finish());
        assert_eq!(decode_varbind_list(&mut dec).unwrap(), list);
    }

    #[test]
    fn empty_list() {
        let mut buf = EncodeBuf::new();
        encode_varbind_list(&mut buf, &[]);
        let bytes = buf.finish();
        assert_eq!(&bytes[..], &[0x30, 0x00]);
        let mut dec = Decoder::new(bytes);
        assert!(decode_varbind_list(&mut dec).unwrap().is_empty());
    }

    #[test]
    fn encoded_size_is_exact() {
        let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 6, 1), Value::Counter64(1 << 40));
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        assert_eq!(buf.len(), vb.encoded_size());
    }
}
