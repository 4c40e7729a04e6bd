//! Protocol data units.
//!
//! One [`Pdu`] struct covers every command. Get-bulk stores its repetition
//! counts where other commands keep error-status/error-index (they share the
//! same two wire integers), the v1 trap carries its extra header fields in
//! [`TrapInfo`], and a secured-dialect PDU carries its security metadata in
//! [`V3Envelope`]. This mirrors the original engine's single-PDU layout
//! rather than one type per command, because the request tracker and the
//! security dispatcher handle all commands uniformly.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{Error, ErrorStatus, ProtocolErrorKind, Result};
use crate::message::SecurityLevel;
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};
use crate::version::Version;
use bytes::Bytes;

/// Command codes, tagged with their protocol-fixed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    Get = 0xA0,
    GetNext = 0xA1,
    Response = 0xA2,
    Set = 0xA3,
    TrapV1 = 0xA4,
    GetBulk = 0xA5,
    Inform = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::Get),
            0xA1 => Some(Self::GetNext),
            0xA2 => Some(Self::Response),
            0xA3 => Some(Self::Set),
            0xA4 => Some(Self::TrapV1),
            0xA5 => Some(Self::GetBulk),
            0xA6 => Some(Self::Inform),
            0xA7 => Some(Self::TrapV2),
            0xA8 => Some(Self::Report),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Commands that expect a reply and therefore enter the request tracker.
    pub fn expects_reply(self) -> bool {
        matches!(
            self,
            Self::Get | Self::GetNext | Self::GetBulk | Self::Set | Self::Inform
        )
    }

    /// Replies that the tracker matches against pending requests.
    pub fn is_reply(self) -> bool {
        matches!(self, Self::Response | Self::Report)
    }

    /// True if the command exists in the given dialect.
    pub fn valid_in(self, version: Version) -> bool {
        match version {
            Version::V1 => matches!(
                self,
                Self::Get | Self::GetNext | Self::Set | Self::Response | Self::TrapV1
            ),
            Version::V2c => !matches!(self, Self::TrapV1 | Self::Report),
            Version::V3 => self != Self::TrapV1,
        }
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "Get",
            Self::GetNext => "GetNext",
            Self::Response => "Response",
            Self::Set => "Set",
            Self::TrapV1 => "TrapV1",
            Self::GetBulk => "GetBulk",
            Self::Inform => "Inform",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        write!(f, "{name}")
    }
}

/// v1-trap header fields, carried ahead of the binding list on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapInfo {
    /// sysObjectID of the entity raising the trap.
    pub enterprise: Oid,
    /// Agent IPv4 address.
    pub agent_addr: [u8; 4],
    /// Generic trap code (coldStart(0) .. enterpriseSpecific(6)).
    pub generic_trap: i32,
    /// Specific trap code, meaningful with enterpriseSpecific.
    pub specific_trap: i32,
    /// sysUpTime at trap generation, hundredths of seconds.
    pub timestamp: u32,
}

/// Security metadata attached to a secured-dialect PDU.
///
/// On outgoing PDUs empty fields are filled from session defaults during
/// build; on inbound PDUs they hold the values the security model resolved,
/// which the tracker compares byte-for-byte against the pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct V3Envelope {
    /// Message identifier; regenerated on every resend, unlike the
    /// request identifier.
    pub msg_id: i32,
    /// Largest message the sender can accept.
    pub msg_max_size: i32,
    /// Whether the peer may answer failures with Report PDUs.
    pub reportable: bool,
    /// Security model number on the wire.
    pub security_model: i32,
    pub security_level: SecurityLevel,
    pub security_engine_id: Bytes,
    pub security_name: Bytes,
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
}

impl V3Envelope {
    /// Envelope with everything defaulted; the session fills the blanks.
    pub fn new(security_level: SecurityLevel) -> Self {
        Self {
            msg_id: 0,
            msg_max_size: 0,
            reportable: true,
            security_model: crate::security::usm::USM_SECURITY_MODEL,
            security_level,
            security_engine_id: Bytes::new(),
            security_name: Bytes::new(),
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
        }
    }
}

/// One protocol operation.
#[derive(Debug, Clone)]
pub struct Pdu {
    pub pdu_type: PduType,
    /// Protocol version; `None` inherits the session default at build time.
    pub version: Option<Version>,
    /// Stable across resends while the request is outstanding.
    pub request_id: i32,
    pub error_status: i32,
    pub error_index: i32,
    /// Get-bulk only.
    pub non_repeaters: i32,
    /// Get-bulk only.
    pub max_repetitions: i32,
    pub varbinds: Vec<VarBind>,
    /// Community string (classic dialect); empty inherits the session's.
    pub community: Bytes,
    /// v1-trap header fields; required iff `pdu_type` is `TrapV1`.
    pub trap: Option<TrapInfo>,
    /// Security envelope; present iff the PDU travels the secured dialect.
    pub v3: Option<V3Envelope>,
    /// Process-unique id stamped on every inbound parse, distinguishing
    /// duplicate deliveries that share a wire request-id. Zero on outgoing
    /// PDUs.
    pub transaction_id: i64,
}

impl Pdu {
    /// A bare PDU of the given command; request-id 0 means "assign at send".
    pub fn new(pdu_type: PduType) -> Self {
        Self {
            pdu_type,
            version: None,
            request_id: 0,
            error_status: 0,
            error_index: 0,
            non_repeaters: 0,
            max_repetitions: 0,
            varbinds: Vec::new(),
            community: Bytes::new(),
            trap: None,
            v3: None,
            transaction_id: 0,
        }
    }

    /// Get request with NULL-valued bindings.
    pub fn get(oids: &[Oid]) -> Self {
        let mut pdu = Self::new(PduType::Get);
        pdu.varbinds = oids.iter().cloned().map(VarBind::null).collect();
        pdu
    }

    pub fn get_next(oids: &[Oid]) -> Self {
        let mut pdu = Self::new(PduType::GetNext);
        pdu.varbinds = oids.iter().cloned().map(VarBind::null).collect();
        pdu
    }

    pub fn get_bulk(non_repeaters: i32, max_repetitions: i32, oids: &[Oid]) -> Self {
        let mut pdu = Self::new(PduType::GetBulk);
        pdu.non_repeaters = non_repeaters;
        pdu.max_repetitions = max_repetitions;
        pdu.varbinds = oids.iter().cloned().map(VarBind::null).collect();
        pdu
    }

    pub fn set(varbinds: Vec<VarBind>) -> Self {
        let mut pdu = Self::new(PduType::Set);
        pdu.varbinds = varbinds;
        pdu
    }

    pub fn inform(varbinds: Vec<VarBind>) -> Self {
        let mut pdu = Self::new(PduType::Inform);
        pdu.varbinds = varbinds;
        pdu
    }

    pub fn trap_v2(varbinds: Vec<VarBind>) -> Self {
        let mut pdu = Self::new(PduType::TrapV2);
        pdu.varbinds = varbinds;
        pdu
    }

    pub fn trap_v1(info: TrapInfo, varbinds: Vec<VarBind>) -> Self {
        let mut pdu = Self::new(PduType::TrapV1);
        pdu.version = Some(Version::V1);
        pdu.trap = Some(info);
        pdu.varbinds = varbinds;
        pdu
    }

    /// Response to this PDU, echoing request-id and bindings.
    pub fn to_response(&self) -> Self {
        let mut response = Self::new(PduType::Response);
        response.version = self.version;
        response.request_id = self.request_id;
        response.varbinds = self.varbinds.clone();
        response.community = self.community.clone();
        response
    }

    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    pub fn expects_reply(&self) -> bool {
        self.pdu_type.expects_reply()
    }

    /// Message identifier, falling back to the request identifier for the
    /// classic dialect.
    pub fn msg_id(&self) -> i32 {
        self.v3.as_ref().map_or(self.request_id, |v3| v3.msg_id)
    }

    /// Command-specific field validation against a concrete version.
    ///
    /// This is the build-time gate: bulk counts non-negative, trap fields
    /// only (and always) on TrapV1, command expressible in the dialect.
    pub fn validate(&self, version: Version) -> Result<()> {
        if !self.pdu_type.valid_in(version) {
            return Err(Error::protocol(ProtocolErrorKind::CommandNotInVersion {
                command: self.pdu_type.tag(),
                version,
            }));
        }
        if self.pdu_type == PduType::GetBulk {
            if self.non_repeaters < 0 {
                return Err(Error::protocol(ProtocolErrorKind::BadRepeaters(
                    self.non_repeaters,
                )));
            }
            if self.max_repetitions < 0 {
                return Err(Error::protocol(ProtocolErrorKind::BadRepetitions(
                    self.max_repetitions,
                )));
            }
        }
        match (self.pdu_type, &self.trap) {
            (PduType::TrapV1, None) => {
                return Err(Error::protocol(ProtocolErrorKind::TrapFieldsMissing));
            }
            (PduType::TrapV1, Some(_)) => {}
            (_, Some(_)) => {
                return Err(Error::protocol(ProtocolErrorKind::TrapFieldsUnexpected));
            }
            _ => {}
        }
        Ok(())
    }

    /// Encode the command-tagged body (everything inside the outer envelope).
    pub fn encode(&self, buf: &mut EncodeBuf) {
        if let (PduType::TrapV1, Some(info)) = (self.pdu_type, &self.trap) {
            buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
                encode_varbind_list(buf, &self.varbinds);
                buf.push_unsigned32(tag::application::TIMETICKS, info.timestamp);
                buf.push_integer(info.specific_trap);
                buf.push_integer(info.generic_trap);
                buf.push_ip_address(info.agent_addr);
                buf.push_oid(&info.enterprise);
            });
            return;
        }

        // get-bulk reuses the error-status/error-index slots
        let (second, third) = if self.pdu_type == PduType::GetBulk {
            (self.non_repeaters, self.max_repetitions)
        } else {
            (self.error_status, self.error_index)
        };

        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(third);
            buf.push_integer(second);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode a command-tagged body.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let tag_byte = decoder.read_tag()?;
        let Some(pdu_type) = PduType::from_tag(tag_byte) else {
            tracing::debug!(target: "snmp_engine::pdu", offset = at, tag = format_args!("0x{tag_byte:02X}"), "unknown command tag");
            return Err(Error::protocol(ProtocolErrorKind::UnknownPduType(tag_byte)));
        };
        let len = decoder.read_length()?;
        let mut body = decoder.sub_decoder(len)?;

        if pdu_type == PduType::TrapV1 {
            let enterprise = body.read_oid()?;
            let agent_addr = body.read_ip_address()?;
            let generic_trap = body.read_integer()?;
            let specific_trap = body.read_integer()?;
            let timestamp = body.read_unsigned32(tag::application::TIMETICKS)?;
            let varbinds = decode_varbind_list(&mut body)?;
            let mut pdu = Self::new(PduType::TrapV1);
            pdu.trap = Some(TrapInfo {
                enterprise,
                agent_addr,
                generic_trap,
                specific_trap,
                timestamp,
            });
            pdu.varbinds = varbinds;
            return Ok(pdu);
        }

        let request_id = body.read_integer()?;
        let second = body.read_integer()?;
        let third = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        let mut pdu = Self::new(pdu_type);
        pdu.request_id = request_id;
        if pdu_type == PduType::GetBulk {
            pdu.non_repeaters = second;
            pdu.max_repetitions = third;
        } else {
            pdu.error_status = second;
            pdu.error_index = third;
        }
        pdu.varbinds = varbinds;
        Ok(pdu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::value::Value;

    fn roundtrip(pdu: &Pdu) -> Pdu {
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let mut dec = Decoder::new(buf.finish());
        Pdu::decode(&mut dec).unwrap()
    }

    #[test]
    fn get_roundtrip() {
        let mut pdu = Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]);
        pdu.request_id = 0x0102_0304;
        let back = roundtrip(&pdu);
        assert_eq!(back.pdu_type, PduType::Get);
        assert_eq!(back.request_id, 0x0102_0304);
        assert_eq!(back.varbinds, pdu.varbinds);
        assert_eq!(back.error_status, 0);
    }

    #[test]
    fn bulk_counts_travel_in_error_slots() {
        let mut pdu = Pdu::get_bulk(1, 25, &[oid!(1, 3, 6, 1, 2, 1, 2, 2)]);
        pdu.request_id = 7;
        let back = roundtrip(&pdu);
        assert_eq!(back.pdu_type, PduType::GetBulk);
        assert_eq!(back.non_repeaters, 1);
        assert_eq!(back.max_repetitions, 25);
        assert_eq!(back.error_status, 0);
        assert_eq!(back.error_index, 0);
    }

    #[test]
    fn trap_v1_roundtrip() {
        let pdu = Pdu::trap_v1(
            TrapInfo {
                enterprise: oid!(1, 3, 6, 1, 4, 1, 2021),
                agent_addr: [10, 0, 0, 1],
                generic_trap: 6,
                specific_trap: 17,
                timestamp: 4321,
            },
            vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), Value::TimeTicks(4321))],
        );
        let back = roundtrip(&pdu);
        assert_eq!(back.trap, pdu.trap);
        assert_eq!(back.varbinds, pdu.varbinds);
    }

    #[test]
    fn unknown_command_rejected() {
        let mut dec = Decoder::from_slice(&[0xA9, 0x00]);
        let err = Pdu::decode(&mut dec).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol {
                kind: ProtocolErrorKind::UnknownPduType(0xA9)
            }
        ));
    }

    #[test]
    fn validate_rejects_negative_bulk_counts() {
        let pdu = Pdu::get_bulk(-1, 10, &[oid!(1, 3, 6)]);
        assert!(matches!(
            pdu.validate(Version::V2c),
            Err(Error::Protocol {
                kind: ProtocolErrorKind::BadRepeaters(-1)
            })
        ));

        let pdu = Pdu::get_bulk(0, -5, &[oid!(1, 3, 6)]);
        assert!(matches!(
            pdu.validate(Version::V2c),
            Err(Error::Protocol {
                kind: ProtocolErrorKind::BadRepetitions(-5)
            })
        ));
    }

    #[test]
    fn validate_crosses_command_and_dialect() {
        // classic dialect refuses secured-only commands
        assert!(Pdu::get_bulk(0, 10, &[oid!(1, 3)]).validate(Version::V1).is_err());
        // and vice versa
        let trap = Pdu::trap_v1(
            TrapInfo {
                enterprise: oid!(1, 3, 6, 1, 4, 1, 9),
                agent_addr: [0, 0, 0, 0],
                generic_trap: 0,
                specific_trap: 0,
                timestamp: 0,
            },
            vec![],
        );
        assert!(trap.validate(Version::V3).is_err());
        assert!(trap.validate(Version::V1).is_ok());
    }

    #[test]
    fn validate_trap_field_placement() {
        let mut get = Pdu::get(&[oid!(1, 3, 6)]);
        get.trap = Some(TrapInfo {
            enterprise: oid!(1, 3),
            agent_addr: [0, 0, 0, 0],
            generic_trap: 0,
            specific_trap: 0,
            timestamp: 0,
        });
        assert!(matches!(
            get.validate(Version::V1),
            Err(Error::Protocol {
                kind: ProtocolErrorKind::TrapFieldsUnexpected
            })
        ));

        let mut bare_trap = Pdu::new(PduType::TrapV1);
        bare_trap.trap = None;
        assert!(matches!(
            bare_trap.validate(Version::V1),
            Err(Error::Protocol {
                kind: ProtocolErrorKind::TrapFieldsMissing
            })
        ));
    }

    #[test]
    fn reply_classification() {
        assert!(PduType::Response.is_reply());
        assert!(PduType::Report.is_reply());
        assert!(!PduType::TrapV2.is_reply());
        assert!(PduType::Inform.expects_reply());
        assert!(!PduType::TrapV2.expects_reply());
    }
}
