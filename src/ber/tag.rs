//! BER tag bytes used on the SNMP wire.
//!
//! A tag byte packs class (bits 7-6), the constructed flag (bit 5) and the
//! tag number (bits 4-0), per X.690 Section 8.1.2.

/// Tag class bits.
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT: u8 = 0x80;
    pub const PRIVATE: u8 = 0xC0;
}

/// Constructed flag (bit 5).
pub const CONSTRUCTED: u8 = 0x20;

/// Universal-class tags.
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    /// Constructed OCTET STRING; documented but never parsed, same as net-snmp.
    pub const OCTET_STRING_CONSTRUCTED: u8 = 0x24;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
}

/// Application-class tags carrying the SMI types.
pub mod application {
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    /// Also Unsigned32.
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
}

/// Context-class zero-length exception tags (v2c/v3 responses only).
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// Opaque-wrapped special types.
///
/// Net-snmp ships float/double values inside an Opaque octet string whose
/// content starts with `TAG1`, a sub-tag and an inner length. The sub-tag is
/// the application tag of the wrapped type plus 0x30.
pub mod opaque_special {
    /// First content byte of every opaque-wrapped special value (0x9F).
    pub const TAG1: u8 = super::class::CONTEXT | 0x1F;
    pub const FLOAT: u8 = 0x78;
    pub const DOUBLE: u8 = 0x79;
}

/// PDU command tags: context-class, constructed, number = command ordinal.
pub mod pdu {
    use super::CONSTRUCTED;
    use super::class::CONTEXT;

    pub const GET: u8 = CONTEXT | CONSTRUCTED; // 0xA0
    pub const GET_NEXT: u8 = CONTEXT | CONSTRUCTED | 0x01; // 0xA1
    pub const RESPONSE: u8 = CONTEXT | CONSTRUCTED | 0x02; // 0xA2
    pub const SET: u8 = CONTEXT | CONSTRUCTED | 0x03; // 0xA3
    pub const TRAP_V1: u8 = CONTEXT | CONSTRUCTED | 0x04; // 0xA4
    pub const GET_BULK: u8 = CONTEXT | CONSTRUCTED | 0x05; // 0xA5
    pub const INFORM: u8 = CONTEXT | CONSTRUCTED | 0x06; // 0xA6
    pub const TRAP_V2: u8 = CONTEXT | CONSTRUCTED | 0x07; // 0xA7
    pub const REPORT: u8 = CONTEXT | CONSTRUCTED | 0x08; // 0xA8
}

/// True if the tag has the constructed flag set.
#[inline]
pub const fn is_constructed(tag: u8) -> bool {
    tag & CONSTRUCTED != 0
}

/// Class bits of a tag.
#[inline]
pub const fn tag_class(tag: u8) -> u8 {
    tag & 0xC0
}
