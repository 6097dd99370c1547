//! Wire-format compatibility checks across the codec boundary.

use lantern_core::codec::{CodecError, MessageCodec, ValidationError};
use lantern_core::message::Message;
use lantern_core::schema;

/// Byte-exact compatibility: every implementation of the protocol must put
/// this query on the wire identically.
#[test]
fn query_wire_form_is_byte_exact() {
    let payload = MessageCodec::new().encode_query("node_a", 205).unwrap();
    assert_eq!(payload, r#"{"v":1,"t":"q","n":"node_a","sid":205}"#);
}

#[test]
fn short_advertise_respects_the_packet_ceiling() {
    let codec = MessageCodec::new();

    // A realistic advertisement sits comfortably under the ceiling.
    let payload = codec
        .encode_advertise("a0b1c2d3e4f5", "5fe921aa", &[100, 205, 900])
        .unwrap();
    assert!(payload.len() <= schema::SHORT_PACKET_MAX_BYTES);

    // A service list the caller failed to bound is caught at encode time.
    let ids: Vec<u16> = (0..200).collect();
    let err = codec
        .encode_advertise("a0b1c2d3e4f5", "5fe921aa", &ids)
        .unwrap_err();
    assert!(matches!(
        err,
        CodecError::Invalid(ValidationError::Oversize { limit: 205, .. })
    ));
}

#[test]
fn long_form_profile_is_exempt_from_the_ceiling() {
    use lantern_core::message::ServiceEntry;

    let codec = MessageCodec::new();
    let services: Vec<ServiceEntry> = (0..100).map(ServiceEntry::new).collect();
    let payload = codec
        .encode_profile("a0b1c2d3e4f5", "5fe921aa", &services, None, None, None, None)
        .unwrap();
    assert!(payload.len() > schema::SHORT_PACKET_MAX_BYTES);

    // And it still decodes.
    assert!(codec.decode(payload.as_bytes()).is_ok());
}

/// A node never transmits a message it would itself reject: everything the
/// encoder emits must pass the decoder of an independent codec instance.
#[test]
fn encode_and_decode_validation_are_symmetric() {
    let sender = MessageCodec::new();
    let receiver = MessageCodec::new();

    let payloads = vec![
        sender.encode_advertise("aa11", "5fe921aa", &[205]).unwrap(),
        sender.encode_query("aa11", 205).unwrap(),
        sender
            .encode_query_result("aa11", 205, &["bb22".to_string()])
            .unwrap(),
        sender.encode_get_profile("aa11", "bb22").unwrap(),
    ];

    for payload in payloads {
        let message = receiver.decode(payload.as_bytes()).unwrap();
        assert_eq!(message.node_id(), "aa11");
    }
}

#[test]
fn hostile_wire_data_is_rejected() {
    let codec = MessageCodec::new();

    let rejects = [
        // Missing node id.
        r#"{"v":1,"t":"q","sid":205}"#,
        // Wrong version.
        r#"{"v":2,"t":"q","n":"aa","sid":205}"#,
        // Unknown type tag.
        r#"{"v":1,"t":"z","n":"aa"}"#,
        // Service id past either end of the uint16 range.
        r#"{"v":1,"t":"q","n":"aa","sid":65536}"#,
        r#"{"v":1,"t":"q","n":"aa","sid":-1}"#,
        // Empty service list.
        r#"{"v":1,"t":"a","n":"aa","h":"01","s":[]}"#,
    ];
    for raw in rejects {
        assert!(
            matches!(codec.decode(raw.as_bytes()), Err(CodecError::Invalid(_))),
            "should have been invalid: {raw}"
        );
    }

    // Non-JSON is a different failure class entirely.
    assert!(matches!(
        codec.decode(b"\xff\xfe not json"),
        Err(CodecError::Malformed(_))
    ));
}

#[test]
fn decoded_advertise_is_structurally_equivalent() {
    let codec = MessageCodec::new();
    let payload = codec
        .encode_advertise("aa11", "5fe921aa", &[100, 205, 900])
        .unwrap();

    match codec.decode(payload.as_bytes()).unwrap() {
        Message::Advertise(adv) => {
            assert_eq!(adv.node_id, "aa11");
            assert_eq!(adv.profile_hash, "5fe921aa");
            assert_eq!(adv.service_ids, vec![100, 205, 900]);
        }
        other => panic!("expected advertise, got {other:?}"),
    }
}
