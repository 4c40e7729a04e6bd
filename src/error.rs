//! Error types.
//!
//! One [`Error`] enum covers the whole taxonomy: encoding, version, security,
//! transport, protocol. Kinds are nested as plain enums so callers can match
//! on the class first and the detail second. All enums are
//! `#[non_exhaustive]` so variants can be added without a breaking release.
//!
//! Resource exhaustion has no dedicated variant: heap allocation failure
//! aborts the process in Rust, and the bounded-buffer cases surface as
//! [`Error::MessageTooLarge`].

use std::time::Duration;

/// Result alias using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// BER decode failure detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// Wrong tag at this grammar position.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Declared length runs past the bytes actually supplied.
    Truncated,
    /// Malformed length field.
    InvalidLength,
    /// Indefinite-length form is not used by SNMP.
    IndefiniteLength,
    /// Length field wider than four octets.
    LengthTooLong { octets: usize },
    /// Declared length over the decoder's sanity cap.
    LengthExceedsMax { length: usize, max: usize },
    /// INTEGER with no content octets.
    ZeroLengthInteger,
    /// Integer content too long for the target representation.
    IntegerTooLong { length: usize },
    /// OID subidentifier does not fit in 32 bits.
    SubidentifierOverflow,
    /// OID with more arcs than RFC 2578 allows.
    OidTooLong { count: usize, max: usize },
    /// NULL with a non-zero length.
    InvalidNull,
    /// IpAddress whose content is not 4 octets.
    InvalidIpAddressLength { length: usize },
    /// Constructed OCTET STRING (0x24); documented, never parsed.
    ConstructedOctetString,
    /// Opaque special wrapper with a bad inner header.
    InvalidOpaqueSpecial,
    /// Version integer that names no known dialect.
    UnknownVersion(i32),
    /// msgFlags with the privacy bit but not the auth bit.
    InvalidMsgFlags,
    /// msgID outside 0..=2147483647 (RFC 3412).
    MsgIdOutOfRange(i32),
    /// msgMaxSize outside 484..=2147483647 (RFC 3412).
    MsgMaxSizeOutOfRange(i32),
    /// Engine boots/time outside 0..=2147483647 (RFC 3414).
    EngineCounterOutOfRange(i32),
    /// Secured message without a scoped PDU where one was required.
    MissingScopedPdu,
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{expected:02X}, got 0x{actual:02X}")
            }
            Self::Truncated => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length field of {octets} octets not supported")
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "declared length {length} exceeds cap {max}")
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerTooLong { length } => {
                write!(f, "integer content of {length} octets overflows target")
            }
            Self::SubidentifierOverflow => write!(f, "OID subidentifier overflows 32 bits"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID with {count} arcs exceeds maximum {max}")
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IpAddress content must be 4 octets, got {length}")
            }
            Self::ConstructedOctetString => {
                write!(f, "constructed OCTET STRING (0x24) not supported")
            }
            Self::InvalidOpaqueSpecial => write!(f, "malformed opaque special wrapper"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version {v}"),
            Self::InvalidMsgFlags => write!(f, "msgFlags sets privacy without authentication"),
            Self::MsgIdOutOfRange(v) => write!(f, "msgID {v} outside RFC 3412 range"),
            Self::MsgMaxSizeOutOfRange(v) => write!(f, "msgMaxSize {v} outside RFC 3412 range"),
            Self::EngineCounterOutOfRange(v) => {
                write!(f, "engine boots/time {v} outside RFC 3414 range")
            }
            Self::MissingScopedPdu => write!(f, "secured message carries no scoped PDU"),
        }
    }
}

/// Encode failure detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeErrorKind {
    /// Exception values travel only from peer to caller.
    ExceptionValueOutbound,
    /// Secured send attempted before the remote engine identifier is known.
    EngineNotKnown,
    /// Authentication requested but no key material for the user.
    MissingAuthKey,
    /// Privacy requested but no privacy key for the user.
    MissingPrivKey,
    /// Could not locate the auth-parameter field inside the built message.
    AuthParamsNotLocated,
    /// Cipher refused the key or input while encrypting.
    PrivacyFailure,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExceptionValueOutbound => {
                write!(f, "exception values cannot appear in outgoing bindings")
            }
            Self::EngineNotKnown => write!(f, "remote engine identifier not known"),
            Self::MissingAuthKey => write!(f, "no authentication key for user"),
            Self::MissingPrivKey => write!(f, "no privacy key for user"),
            Self::AuthParamsNotLocated => {
                write!(f, "auth parameters not found in built message")
            }
            Self::PrivacyFailure => write!(f, "privacy transform failed"),
        }
    }
}

/// Security-layer failure classes (spec'd by RFC 3414).
///
/// Each class has its own statistics counter and its own usmStats report OID;
/// the mapping lives in [`crate::security::usm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SecurityErrorKind {
    /// Requested security level cannot be provided for this user.
    UnsupportedSecurityLevel,
    /// Digest did not verify.
    AuthenticationFailure,
    /// Authentic message outside the 150-second time window.
    NotInTimeWindow,
    /// Engine identifier not recognized.
    UnknownEngineId,
    /// Security name not in the user table.
    UnknownUserName,
    /// Ciphertext did not decrypt to a well-formed scoped PDU.
    DecryptionError,
}

impl std::fmt::Display for SecurityErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedSecurityLevel => write!(f, "unsupported security level"),
            Self::AuthenticationFailure => write!(f, "authentication failure"),
            Self::NotInTimeWindow => write!(f, "not in time window"),
            Self::UnknownEngineId => write!(f, "unknown engine identifier"),
            Self::UnknownUserName => write!(f, "unknown user name"),
            Self::DecryptionError => write!(f, "decryption error"),
        }
    }
}

/// Protocol-grammar failures raised by PDU build/parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolErrorKind {
    /// Negative non-repeaters on a get-bulk.
    BadRepeaters(i32),
    /// Negative max-repetitions on a get-bulk.
    BadRepetitions(i32),
    /// Command byte outside the known set.
    UnknownPduType(u8),
    /// Inbound version differs from the session's pinned version.
    BadVersion {
        pinned: crate::version::Version,
        actual: crate::version::Version,
    },
    /// Command not expressible in the PDU's dialect (e.g. v1 get-bulk).
    CommandNotInVersion {
        command: u8,
        version: crate::version::Version,
    },
    /// v1-trap fields present on a non-trap command.
    TrapFieldsUnexpected,
    /// TrapV1 without its trap fields.
    TrapFieldsMissing,
    /// PDU and session both lack a version.
    MissingVersion,
    /// Secured PDU with no security name and no session default.
    MissingSecurityName,
    /// Engine discovery re-entered while a probe is outstanding.
    AlreadyProbing,
    /// Operation on a closed session.
    SessionClosed,
    /// A Report PDU with no recognizable classification closed the wait.
    RequestClosedByReport,
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRepeaters(v) => write!(f, "negative non-repeaters {v}"),
            Self::BadRepetitions(v) => write!(f, "negative max-repetitions {v}"),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type 0x{t:02X}"),
            Self::BadVersion { pinned, actual } => {
                write!(f, "version {actual} does not match pinned {pinned}")
            }
            Self::CommandNotInVersion { command, version } => {
                write!(f, "command 0x{command:02X} not valid in {version}")
            }
            Self::TrapFieldsUnexpected => write!(f, "trap fields on non-trap command"),
            Self::TrapFieldsMissing => write!(f, "v1 trap without trap fields"),
            Self::MissingVersion => write!(f, "no protocol version on PDU or session"),
            Self::MissingSecurityName => write!(f, "no security name and no session default"),
            Self::AlreadyProbing => write!(f, "engine discovery already in progress"),
            Self::SessionClosed => write!(f, "session is closed"),
            Self::RequestClosedByReport => write!(f, "peer closed the request with a report"),
        }
    }
}

/// OID construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OidErrorKind {
    /// Empty identifier where one is required.
    Empty,
    /// Arc is not a non-negative integer.
    InvalidArc,
    /// First arc must be 0, 1 or 2.
    InvalidFirstArc(u32),
    /// Second arc over 39 with first arc under 2.
    InvalidSecondArc { first: u32, second: u32 },
    /// Arc count over [`crate::oid::MAX_OID_LEN`].
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1 or 2, got {v}"),
            Self::InvalidSecondArc { first, second } => {
                write!(f, "second arc {second} too large for first arc {first}")
            }
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {count} arcs, maximum is {max}")
            }
        }
    }
}

/// The crate-wide error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed inbound bytes.
    #[error("decode error at offset {offset}: {kind}")]
    Decode { offset: usize, kind: DecodeErrorKind },

    /// Outgoing message could not be built.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// PDU grammar or session-state violation.
    #[error("protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// Security-layer rejection, classified per RFC 3414.
    #[error("security failure: {kind}")]
    Security { kind: SecurityErrorKind },

    /// No plugin registered for the requested model number.
    ///
    /// A processing error, deliberately distinct from the
    /// authentication-class [`Error::Security`] failures.
    #[error("no security model registered for id {model}")]
    UnsupportedSecurityModel { model: i32 },

    /// Failure surfaced by the external transport collaborator.
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: std::io::Error,
    },

    /// Retries exhausted without a matching reply.
    #[error("request {request_id} timed out after {retries} retries ({elapsed:?})")]
    Timeout {
        request_id: i32,
        retries: u32,
        elapsed: Duration,
    },

    /// Engine-ID probe exhausted its retries.
    #[error("engine discovery probe timed out")]
    DiscoveryTimeout,

    /// Built message larger than the negotiated transport limit.
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Invalid object identifier.
    #[error("invalid OID: {kind}")]
    InvalidOid { kind: OidErrorKind },
}

impl Error {
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    pub fn protocol(kind: ProtocolErrorKind) -> Self {
        Self::Protocol { kind }
    }

    pub fn security(kind: SecurityErrorKind) -> Self {
        Self::Security { kind }
    }

    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind }
    }

    /// The security classification of this error, if it has one.
    pub fn security_kind(&self) -> Option<SecurityErrorKind> {
        match self {
            Self::Security { kind } => Some(*kind),
            _ => None,
        }
    }
}

/// SNMP error-status codes carried in response PDUs (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown or future status code.
    Unknown(i32),
}

impl ErrorStatus {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({code})"),
        }
    }
}
