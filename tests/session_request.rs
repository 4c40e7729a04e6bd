//! Classic-dialect session behavior: matching, retries, cancellation.

mod common;

use bytes::Bytes;
use common::*;
use snmp_engine::transport::MockTransport;
use snmp_engine::{
    EngineRegistry, Error, Pdu, PduType, ProtocolErrorKind, Session, SessionEvent, Value, VarBind,
    Version, oid,
};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn v2c_session(transport: MockTransport) -> Session<MockTransport> {
    Session::builder()
        .version(Version::V2c)
        .community("public")
        .timeout(Duration::ZERO)
        .retries(2)
        .open(transport, EngineRegistry::new())
}

/// Build a v1 Get with community "public" and one null binding, parse the
/// built bytes, and feed a matching response back through the engine.
#[test]
fn v1_get_roundtrip_with_community() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let log = EventLog::new();
    let mut session = Session::builder()
        .version(Version::V1)
        .community("public")
        .open(transport, EngineRegistry::new());
    session.set_handler(log.handler());

    let request_id = session
        .send(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]))
        .unwrap();

    // inspect what went on the wire
    let sent = wire_tap.sent();
    assert_eq!(sent.len(), 1);
    let request = decode_community(&sent[0]);
    assert_eq!(request.version, Version::V1);
    assert_eq!(&request.community[..], b"public");
    assert_eq!(request.pdu.pdu_type, PduType::Get);
    assert_eq!(request.pdu.request_id, request_id);
    assert_eq!(request.pdu.varbinds.len(), 1);
    assert_eq!(request.pdu.varbinds[0].oid, oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
    assert_eq!(request.pdu.varbinds[0].value, Value::Null);

    // answer it
    let response = v2c_response(
        &request,
        vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            Value::from("engine under test"),
        )],
    );
    session.on_received(Bytes::from(response)).unwrap();

    assert_eq!(session.pending(), 0);
    let mut events = log.take();
    assert_eq!(events.len(), 1);
    let (id, pdu) = expect_response(events.remove(0));
    assert_eq!(id, request_id);
    assert_eq!(pdu.varbinds[0].value.as_str(), Some("engine under test"));
}

#[test]
fn retries_exhaust_after_exactly_r_resends() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let mut session = v2c_session(transport);

    let got: Arc<Mutex<Option<SessionEvent>>> = Arc::new(Mutex::new(None));
    let slot = got.clone();
    let request_id = session
        .send_with(Pdu::get(&[oid!(1, 3, 6, 1)]), move |event| {
            *slot.lock().unwrap() = Some(event);
        })
        .unwrap();

    assert_eq!(wire_tap.sent_count(), 1);
    session.on_timer(Instant::now());

    // retries = 2: initial send plus exactly two resends, then exhaustion
    assert_eq!(wire_tap.sent_count(), 3);
    assert_eq!(session.pending(), 0);
    let event = got.lock().unwrap().take().expect("callback fired");
    assert_eq!(expect_timeout(event), request_id);

    // classic resends reuse the identical wire image (request id is stable
    // and the classic dialect has no message id to regenerate)
    let sent = wire_tap.sent();
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[1], sent[2]);
}

#[test]
fn mismatched_request_id_never_matches() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let log = EventLog::new();
    let mut session = v2c_session(transport);
    session.set_handler(log.handler());

    session.send(Pdu::get(&[oid!(1, 3, 6, 1)])).unwrap();
    let request = decode_community(&wire_tap.sent()[0]);

    // response with a different request id is silently dropped
    let mut stranger = request.pdu.to_response();
    stranger.request_id ^= 0x7FFF;
    let wire = snmp_engine::CommunityMessage::new(
        Version::V2c,
        request.community.clone(),
        stranger,
    )
    .encode();
    session.on_received(wire).unwrap();

    assert_eq!(session.pending(), 1);
    assert!(log.is_empty());
}

#[test]
fn close_cancels_every_pending_request() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let mut session = v2c_session(transport);
    session.set_handler(log.handler());

    let first = session.send(Pdu::get(&[oid!(1, 3, 6, 1)])).unwrap();
    let second = session.send(Pdu::get_next(&[oid!(1, 3, 6, 2)])).unwrap();
    assert_eq!(session.pending(), 2);

    session.close();
    assert_eq!(session.pending(), 0);

    let mut cancelled: Vec<i32> = log
        .take()
        .into_iter()
        .map(|event| match event {
            SessionEvent::Cancelled { request_id } => request_id,
            other => panic!("expected Cancelled, got {other:?}"),
        })
        .collect();
    cancelled.sort_unstable();
    let mut expected = vec![first, second];
    expected.sort_unstable();
    assert_eq!(cancelled, expected);

    // a closed session refuses further work
    assert!(matches!(
        session.send(Pdu::get(&[oid!(1, 3)])),
        Err(Error::Protocol {
            kind: ProtocolErrorKind::SessionClosed
        })
    ));
}

#[test]
fn unsolicited_trap_reaches_the_handler() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let mut session = v2c_session(transport);
    session.set_handler(log.handler());

    let trap = v2c_trap(
        b"public",
        vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
            Value::TimeTicks(42),
        )],
    );
    session.on_received(trap).unwrap();

    let mut events = log.take();
    assert_eq!(events.len(), 1);
    let pdu = expect_unsolicited(events.remove(0));
    assert_eq!(pdu.pdu_type, PduType::TrapV2);
    // inbound PDUs carry a process-unique transaction id
    assert_ne!(pdu.transaction_id, 0);
}

#[test]
fn transport_failure_surfaces_without_tracker_mutation() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let mut session = v2c_session(transport);

    wire_tap.fail_next_send(io::ErrorKind::NetworkUnreachable);
    assert!(matches!(
        session.send(Pdu::get(&[oid!(1, 3, 6, 1)])),
        Err(Error::Transport { .. })
    ));
    // the failed request never entered the tracker: nothing to time out
    assert_eq!(session.pending(), 0);
    assert!(session.next_timeout().is_none());
}

#[test]
fn pinned_version_rejects_other_dialect() {
    let transport = MockTransport::new();
    let log = EventLog::new();
    let mut session = v2c_session(transport);
    session.set_handler(log.handler());

    session.send(Pdu::get(&[oid!(1, 3, 6, 1)])).unwrap();

    // a v1 reply on a session pinned to v2c
    let mut pdu = Pdu::new(PduType::Response);
    pdu.request_id = 1;
    let wire =
        snmp_engine::CommunityMessage::new(Version::V1, Bytes::from_static(b"public"), pdu)
            .encode();
    let err = session.on_received(wire).unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol {
            kind: ProtocolErrorKind::BadVersion { .. }
        }
    ));
    assert_eq!(session.pending(), 1);
}

#[test]
fn bad_bulk_counts_rejected_before_any_send() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let mut session = v2c_session(transport);

    assert!(matches!(
        session.send(Pdu::get_bulk(-1, 10, &[oid!(1, 3, 6)])),
        Err(Error::Protocol {
            kind: ProtocolErrorKind::BadRepeaters(-1)
        })
    ));
    assert!(matches!(
        session.send(Pdu::get_bulk(0, -3, &[oid!(1, 3, 6)])),
        Err(Error::Protocol {
            kind: ProtocolErrorKind::BadRepetitions(-3)
        })
    ));
    assert_eq!(wire_tap.sent_count(), 0);
}

#[test]
fn exception_values_never_leave_the_process() {
    let transport = MockTransport::new();
    let wire_tap = transport.clone();
    let mut session = v2c_session(transport);

    let mut pdu = Pdu::set(vec![VarBind::new(
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        Value::NoSuchObject,
    )]);
    pdu.request_id = 77;
    assert!(session.send(pdu).is_err());
    assert_eq!(wire_tap.sent_count(), 0);
}
