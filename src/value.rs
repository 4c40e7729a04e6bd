//! Typed values carried in variable bindings.

use crate::ber::{Decoder, EncodeBuf, length_encoded_len, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use crate::util::hex;
use bytes::Bytes;

/// A typed SNMP value.
///
/// Covers the SMI base types, the legacy BIT STRING, the net-snmp
/// opaque-wrapped float/double specials, and the three v2c/v3 exception
/// markers. Exception markers may appear only in values returned by the
/// remote peer; [`crate::session::Session`] refuses to serialize them
/// outbound.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit).
    Integer(i32),
    /// OCTET STRING.
    OctetString(Bytes),
    /// NULL (the placeholder value of every request binding).
    Null,
    /// OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
    /// IpAddress, four octets big-endian.
    IpAddress([u8; 4]),
    /// Counter32 (wrapping).
    Counter32(u32),
    /// Gauge32 / Unsigned32 (non-wrapping).
    Gauge32(u32),
    /// TimeTicks, hundredths of a second.
    TimeTicks(u32),
    /// Opaque: arbitrary bytes the engine does not interpret.
    Opaque(Bytes),
    /// Counter64 (v2c/v3 only).
    Counter64(u64),
    /// BIT STRING (RFC 1442 legacy). Raw content octets, the first being
    /// the unused-bit count, kept verbatim as net-snmp does.
    BitString(Bytes),
    /// Opaque-wrapped IEEE 754 single (net-snmp special type).
    OpaqueFloat(f32),
    /// Opaque-wrapped IEEE 754 double (net-snmp special type).
    OpaqueDouble(f64),
    /// noSuchObject exception.
    NoSuchObject,
    /// noSuchInstance exception.
    NoSuchInstance,
    /// endOfMibView exception.
    EndOfMibView,
    /// Unrecognized tag, preserved for forward compatibility.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// True for the three exception markers.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            _ => self.as_u32().map(u64::from),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(b) | Value::Opaque(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Encode onto a reverse buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::Counter64(v) => buf.push_unsigned64(tag::application::COUNTER64, *v),
            Value::BitString(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::universal::BIT_STRING);
            }
            Value::OpaqueFloat(v) => {
                encode_opaque_special(buf, tag::opaque_special::FLOAT, &v.to_be_bytes())
            }
            Value::OpaqueDouble(v) => {
                encode_opaque_special(buf, tag::opaque_special::DOUBLE, &v.to_be_bytes())
            }
            Value::NoSuchObject => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_OBJECT);
            }
            Value::NoSuchInstance => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_INSTANCE);
            }
            Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(tag::context::END_OF_MIB_VIEW);
            }
            Value::Unknown { tag: t, data } => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(*t);
            }
        }
    }

    /// Decode one value from the cursor.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag_byte = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match tag_byte {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_content(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(decoder.offset(), DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_content(len)?))
            }
            tag::universal::BIT_STRING => Ok(Value::BitString(decoder.read_bytes(len)?)),
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let b = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([b[0], b[1], b[2], b[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_content(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_content(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_content(len)?))
            }
            tag::application::OPAQUE => decode_opaque(decoder, len),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_unsigned64_content(len)?))
            }
            tag::context::NO_SUCH_OBJECT => {
                let _ = decoder.read_bytes(len)?;
                Ok(Value::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                let _ = decoder.read_bytes(len)?;
                Ok(Value::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                let _ = decoder.read_bytes(len)?;
                Ok(Value::EndOfMibView)
            }
            tag::universal::OCTET_STRING_CONSTRUCTED => Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::ConstructedOctetString,
            )),
            other => Ok(Value::Unknown {
                tag: other,
                data: decoder.read_bytes(len)?,
            }),
        }
    }

    /// Total BER-encoded length (tag + length + content).
    pub(crate) fn ber_encoded_len(&self) -> usize {
        fn tlv(content: usize) -> usize {
            1 + length_encoded_len(content) + content
        }
        match self {
            Value::Integer(v) => tlv(integer_content_len(*v)),
            Value::OctetString(b) | Value::Opaque(b) | Value::BitString(b) => tlv(b.len()),
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => 2,
            Value::ObjectIdentifier(oid) => oid.ber_encoded_len(),
            Value::IpAddress(_) => 6,
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                tlv(unsigned_content_len(u64::from(*v)))
            }
            Value::Counter64(v) => tlv(unsigned_content_len(*v)),
            Value::OpaqueFloat(_) => tlv(3 + 4),
            Value::OpaqueDouble(_) => tlv(3 + 8),
            Value::Unknown { data, .. } => tlv(data.len()),
        }
    }
}

/// Wrap a special payload in the Opaque envelope: `44 len 9F subtag len' payload`.
fn encode_opaque_special(buf: &mut EncodeBuf, subtag: u8, payload: &[u8]) {
    buf.push_constructed(tag::application::OPAQUE, |buf| {
        buf.push_bytes(payload);
        buf.push_length(payload.len());
        buf.push_tag(subtag);
        buf.push_tag(tag::opaque_special::TAG1);
    });
}

/// An Opaque whose content starts with the special marker unwraps to a
/// float/double; anything else stays an uninterpreted Opaque.
fn decode_opaque(decoder: &mut Decoder, len: usize) -> Result<Value> {
    let content = decoder.read_bytes(len)?;
    if content.len() < 3 || content[0] != tag::opaque_special::TAG1 {
        return Ok(Value::Opaque(content));
    }

    let subtag = content[1];
    let mut inner = Decoder::new(content.slice(2..));
    let inner_len = inner.read_length().map_err(|_| {
        Error::decode(decoder.offset(), DecodeErrorKind::InvalidOpaqueSpecial)
    })?;
    match subtag {
        tag::opaque_special::FLOAT if inner_len == 4 => {
            let b = inner.read_bytes(4)?;
            Ok(Value::OpaqueFloat(f32::from_be_bytes([
                b[0], b[1], b[2], b[3],
            ])))
        }
        tag::opaque_special::DOUBLE if inner_len == 8 => {
            let b = inner.read_bytes(8)?;
            Ok(Value::OpaqueDouble(f64::from_be_bytes([
                b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            ])))
        }
        // Unknown special: keep the raw Opaque, as net-snmp does.
        _ => Ok(Value::Opaque(content)),
    }
}

pub(crate) fn integer_content_len(value: i32) -> usize {
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
    4 - skip
}

pub(crate) fn unsigned_content_len(value: u64) -> usize {
    let be = value.to_be_bytes();
    let mut skip = 0;
    while skip < 7 && be[skip] == 0 {
        skip += 1;
    }
    8 - skip + usize::from(be[skip] & 0x80 != 0)
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "0x{}", hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{v}"),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex(data)),
            Value::Counter64(v) => write!(f, "{v}"),
            Value::BitString(data) => write!(f, "BitString(0x{})", hex(data)),
            Value::OpaqueFloat(v) => write!(f, "{v}"),
            Value::OpaqueDouble(v) => write!(f, "{v}"),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{tag:02X}, data=0x{})", hex(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}
