//! Stream-transport reassembly through the session entry points.

mod common;

use bytes::Bytes;
use common::*;
use snmp_engine::transport::MockTransport;
use snmp_engine::{EngineRegistry, Pdu, Session, Value, VarBind, Version, oid};
use std::time::Duration;

fn stream_session(transport: MockTransport) -> Session<MockTransport> {
    Session::builder()
        .version(Version::V2c)
        .community("public")
        .timeout(Duration::from_millis(50))
        .retries(0)
        .open(transport, EngineRegistry::new())
}

/// A partial delivery must be held, not rejected; the completing delivery
/// yields exactly one decoded PDU.
#[test]
fn split_delivery_decodes_exactly_once() {
    let transport = MockTransport::stream();
    let wire_tap = transport.clone();
    let log = EventLog::new();
    let mut session = stream_session(transport);
    session.set_handler(log.handler());

    let request_id = session.send(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)])).unwrap();
    let request = decode_community(&wire_tap.sent()[0]);
    let response: Vec<u8> = v2c_response(
        &request,
        vec![VarBind::new(
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            Value::from("split"),
        )],
    )
    .to_vec();

    // first three bytes: no complete frame, no error, no event
    session
        .on_received(Bytes::copy_from_slice(&response[..3]))
        .unwrap();
    assert!(log.is_empty());
    assert_eq!(session.pending(), 1);

    // the remainder completes the frame
    session
        .on_received(Bytes::copy_from_slice(&response[3..]))
        .unwrap();
    let mut events = log.take();
    assert_eq!(events.len(), 1);
    let (id, pdu) = expect_response(events.remove(0));
    assert_eq!(id, request_id);
    assert_eq!(pdu.varbinds[0].value.as_str(), Some("split"));
    assert_eq!(session.pending(), 0);
}

/// Two messages in one delivery are processed in order; a trailing partial
/// message is retained for the next delivery.
#[test]
fn coalesced_deliveries_split_in_order() {
    let transport = MockTransport::stream();
    let wire_tap = transport.clone();
    let log = EventLog::new();
    let mut session = stream_session(transport);
    session.set_handler(log.handler());

    let first_id = session.send(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)])).unwrap();
    let second_id = session.send(Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)])).unwrap();

    let sent = wire_tap.sent();
    let first_reply = v2c_response(
        &decode_community(&sent[0]),
        vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("one"))],
    );
    let second_reply = v2c_response(
        &decode_community(&sent[1]),
        vec![VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("two"))],
    );

    // both replies coalesced, plus the first half of a trap
    let trap = v2c_trap(b"public", vec![]);
    let mut delivery = first_reply.to_vec();
    delivery.extend_from_slice(&second_reply);
    delivery.extend_from_slice(&trap[..5]);

    session.on_received(Bytes::from(delivery)).unwrap();
    let mut events = log.take();
    assert_eq!(events.len(), 2);
    let (id, pdu) = expect_response(events.remove(0));
    assert_eq!(id, first_id);
    assert_eq!(pdu.varbinds[0].value.as_str(), Some("one"));
    let (id, pdu) = expect_response(events.remove(0));
    assert_eq!(id, second_id);
    assert_eq!(pdu.varbinds[0].value.as_str(), Some("two"));

    // the trap's tail arrives later
    session
        .on_received(Bytes::copy_from_slice(&trap[5..]))
        .unwrap();
    let mut events = log.take();
    assert_eq!(events.len(), 1);
    expect_unsolicited(events.remove(0));
}

/// Bytes that cannot be the start of a message mean the stream is
/// desynchronized; that surfaces as an error rather than a silent wait.
#[test]
fn desynchronized_stream_errors() {
    let transport = MockTransport::stream();
    let mut session = stream_session(transport);
    assert!(
        session
            .on_received(Bytes::from_static(&[0x02, 0x01, 0x00]))
            .is_err()
    );
}
