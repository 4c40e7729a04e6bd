//! Shared helpers for the session-level tests.

#![allow(dead_code)]

use bytes::Bytes;
use snmp_engine::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message};
use snmp_engine::security::usm::USM_SECURITY_MODEL;
use snmp_engine::session::SessionEvent;
use snmp_engine::{CommunityMessage, Pdu, PduType, Version};
use std::sync::{Arc, Mutex};

/// Collects session events for later assertions.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler closure feeding this log.
    pub fn handler(&self) -> impl FnMut(SessionEvent) + Send + 'static {
        let events = self.events.clone();
        move |event| events.lock().unwrap().push(event)
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

/// Decode a captured classic-dialect request.
pub fn decode_community(wire: &Bytes) -> CommunityMessage {
    CommunityMessage::decode(wire.clone()).expect("sent message must decode")
}

/// Decode a captured secured-dialect request.
pub fn decode_v3(wire: &Bytes) -> V3Message {
    V3Message::decode(wire.clone()).expect("sent message must decode")
}

/// Response message answering a classic request.
pub fn v2c_response(request: &CommunityMessage, varbinds: Vec<snmp_engine::VarBind>) -> Bytes {
    let mut pdu = request.pdu.to_response();
    pdu.varbinds = varbinds;
    CommunityMessage::new(request.version, request.community.clone(), pdu).encode()
}

/// Unauthenticated secured-dialect reply with the given inner PDU.
///
/// `security_params` lets tests choose the engine id and user name the
/// receiver will compare against the pending request.
pub fn v3_plain_reply(
    msg_id: i32,
    security_params: Bytes,
    context_engine_id: Bytes,
    pdu: Pdu,
) -> Bytes {
    let global = MsgGlobalData::new(
        msg_id,
        65507,
        MsgFlags::new(SecurityLevel::NoAuthNoPriv, false),
        USM_SECURITY_MODEL,
    );
    let scoped = ScopedPdu::new(context_engine_id, Bytes::new(), pdu);
    V3Message::new(global, security_params, scoped).encode()
}

/// A v2c trap message (unsolicited traffic).
pub fn v2c_trap(community: &'static [u8], varbinds: Vec<snmp_engine::VarBind>) -> Bytes {
    let mut pdu = Pdu::trap_v2(varbinds);
    pdu.request_id = 999;
    pdu.version = Some(Version::V2c);
    CommunityMessage::new(Version::V2c, Bytes::from_static(community), pdu).encode()
}

/// Assert-and-extract helpers keep the match noise out of test bodies.
pub fn expect_response(event: SessionEvent) -> (i32, Pdu) {
    match event {
        SessionEvent::Response { request_id, pdu } => (request_id, pdu),
        other => panic!("expected Response, got {other:?}"),
    }
}

pub fn expect_timeout(event: SessionEvent) -> i32 {
    match event {
        SessionEvent::Timeout { request_id } => request_id,
        other => panic!("expected Timeout, got {other:?}"),
    }
}

pub fn expect_unsolicited(event: SessionEvent) -> Pdu {
    match event {
        SessionEvent::Unsolicited { pdu } => pdu,
        other => panic!("expected Unsolicited, got {other:?}"),
    }
}

pub fn is_report(pdu: &Pdu) -> bool {
    pdu.pdu_type == PduType::Report
}
