//! Wire round-trip properties across value types and commands.

use bytes::Bytes;
use proptest::prelude::*;
use snmp_engine::ber::{Decoder, EncodeBuf};
use snmp_engine::message::CommunityMessage;
use snmp_engine::{Oid, Pdu, PduType, TrapInfo, Value, VarBind, Version, oid};

fn arb_oid() -> impl Strategy<Value = Oid> {
    (
        0u32..=2,
        0u32..=39,
        prop::collection::vec(0u32..=u32::MAX, 0..12),
    )
        .prop_map(|(first, second, rest)| {
            let mut arcs = vec![first, second];
            arcs.extend(rest);
            Oid::new(arcs)
        })
}

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Integer),
        prop::collection::vec(any::<u8>(), 0..64)
            .prop_map(|v| Value::OctetString(Bytes::from(v))),
        Just(Value::Null),
        arb_oid().prop_map(Value::ObjectIdentifier),
        any::<[u8; 4]>().prop_map(Value::IpAddress),
        any::<u32>().prop_map(Value::Counter32),
        any::<u32>().prop_map(Value::Gauge32),
        any::<u32>().prop_map(Value::TimeTicks),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|v| Value::Opaque(Bytes::from(v))),
        any::<u64>().prop_map(Value::Counter64),
        prop::collection::vec(any::<u8>(), 1..16)
            .prop_map(|v| Value::BitString(Bytes::from(v))),
        any::<f32>().prop_map(Value::OpaqueFloat),
        any::<f64>().prop_map(Value::OpaqueDouble),
        Just(Value::NoSuchObject),
        Just(Value::NoSuchInstance),
        Just(Value::EndOfMibView),
    ]
}

proptest! {
    /// parse(build(varbind)) is the identity for every supported type.
    #[test]
    fn varbind_roundtrip(oid in arb_oid(), value in arb_value()) {
        // NaN never compares equal; skip those payloads
        if let Value::OpaqueFloat(f) = &value {
            prop_assume!(!f.is_nan());
        }
        if let Value::OpaqueDouble(f) = &value {
            prop_assume!(!f.is_nan());
        }

        let vb = VarBind::new(oid, value);
        let mut buf = EncodeBuf::new();
        vb.encode(&mut buf);
        let mut dec = Decoder::new(buf.finish());
        let back = VarBind::decode(&mut dec).unwrap();
        prop_assert_eq!(back, vb);
    }
}

/// One concrete round trip per command through the full classic envelope.
#[test]
fn every_command_roundtrips() {
    let bindings = vec![VarBind::new(
        oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
        Value::from("payload"),
    )];

    let mut pdus = vec![
        Pdu::get(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        Pdu::get_next(&[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]),
        Pdu::get_bulk(1, 20, &[oid!(1, 3, 6, 1, 2, 1, 2, 2)]),
        Pdu::set(bindings.clone()),
        Pdu::inform(bindings.clone()),
        Pdu::trap_v2(bindings.clone()),
    ];
    let mut response = Pdu::new(PduType::Response);
    response.error_status = 2;
    response.error_index = 1;
    response.varbinds = bindings.clone();
    pdus.push(response);
    let mut report = Pdu::new(PduType::Report);
    report.varbinds = bindings.clone();
    pdus.push(report);

    for (i, mut pdu) in pdus.into_iter().enumerate() {
        pdu.request_id = 1000 + i as i32;
        let version = if pdu.pdu_type == PduType::Report {
            // Report rides the secured dialect; round-trip just its body here
            let mut buf = EncodeBuf::new();
            pdu.encode(&mut buf);
            let mut dec = Decoder::new(buf.finish());
            let back = Pdu::decode(&mut dec).unwrap();
            assert_eq!(back.pdu_type, pdu.pdu_type);
            assert_eq!(back.request_id, pdu.request_id);
            assert_eq!(back.varbinds, pdu.varbinds);
            continue;
        } else {
            Version::V2c
        };

        let msg = CommunityMessage::new(version, Bytes::from_static(b"public"), pdu);
        let back = CommunityMessage::decode(msg.encode()).unwrap();
        assert_eq!(back.pdu.pdu_type, msg.pdu.pdu_type);
        assert_eq!(back.pdu.request_id, msg.pdu.request_id);
        assert_eq!(back.pdu.varbinds, msg.pdu.varbinds);
        assert_eq!(back.pdu.error_status, msg.pdu.error_status);
        assert_eq!(back.pdu.error_index, msg.pdu.error_index);
        assert_eq!(back.pdu.non_repeaters, msg.pdu.non_repeaters);
        assert_eq!(back.pdu.max_repetitions, msg.pdu.max_repetitions);
    }
}

/// The v1 trap carries its header fields ahead of the binding list.
#[test]
fn v1_trap_roundtrips_through_envelope() {
    let trap = Pdu::trap_v1(
        TrapInfo {
            enterprise: oid!(1, 3, 6, 1, 4, 1, 2021),
            agent_addr: [192, 0, 2, 7],
            generic_trap: 6,
            specific_trap: 44,
            timestamp: 123_456,
        },
        vec![VarBind::new(
            oid!(1, 3, 6, 1, 4, 1, 2021, 1),
            Value::Integer(1),
        )],
    );

    let msg = CommunityMessage::new(Version::V1, Bytes::from_static(b"traps"), trap);
    let back = CommunityMessage::decode(msg.encode()).unwrap();
    assert_eq!(back.pdu.trap, msg.pdu.trap);
    assert_eq!(back.pdu.varbinds, msg.pdu.varbinds);
}
