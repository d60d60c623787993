use std::str::FromStr;

use crate::types::{tests::*, *};

#[test]
fn encoding_bool() {
    serialize_and_compare(true, &[1]);
    serialize_and_compare(false, &[0]);
    // Any non zero value is true
    let v = bool::decode(&mut Cursor::new(vec![0x37u8]), &DecodingOptions::test()).unwrap();
    assert!(v);
}

#[test]
fn encoding_little_endian() {
    serialize_and_compare(-2i16, &[0xfe, 0xff]);
    serialize_and_compare(1_000_000_000u32, &[0x00, 0xca, 0x9a, 0x3b]);
    serialize_and_compare(-3i64, &[0xfd, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]);
    serialize_and_compare(6.25f32, &[0x00, 0x00, 0xc8, 0x40]);
    serialize_test(f64::MIN_POSITIVE);
    serialize_test(u64::MAX);
}

#[test]
fn encode_string_part_6_5224() {
    // Sample from OPC UA Part 6 - 5.2.2.4
    let expected = [0x06, 0x00, 0x00, 0x00, 0xE6, 0xB0, 0xB4, 0x42, 0x6F, 0x79];
    serialize_and_compare(UAString::from("水Boy"), &expected);
}

#[test]
fn encoding_null_and_empty_string() {
    serialize_and_compare(UAString::null(), &[0xff, 0xff, 0xff, 0xff]);
    serialize_and_compare(UAString::from(""), &[0, 0, 0, 0]);
    // Null and empty stay distinct
    let v = serialize_test_and_return(UAString::from(""));
    assert!(!v.is_null());
}

#[test]
fn decode_string_malformed_utf8() {
    let bytes = [0x02, 0x00, 0x00, 0x00, 0xc3, 0x28];
    decode_fails::<UAString>(&bytes, &DecodingOptions::test(), StatusCode::BadDecodingError);
}

#[test]
fn decode_string_truncated() {
    // Length says 10 but only 3 bytes follow
    let bytes = [0x0a, 0x00, 0x00, 0x00, 0x41, 0x42, 0x43];
    decode_fails::<UAString>(&bytes, &DecodingOptions::test(), StatusCode::BadDecodingError);
}

#[test]
fn decode_string_length_limit() {
    let decoding_options = DecodingOptions {
        max_string_length: 2,
        ..DecodingOptions::test()
    };
    let bytes = [0x03, 0x00, 0x00, 0x00, 0x41, 0x42, 0x43];
    decode_fails::<UAString>(&bytes, &decoding_options, StatusCode::BadDecodingError);
    decode_fails::<ByteString>(&[0xfe, 0xff, 0xff, 0xff], &decoding_options, StatusCode::BadDecodingError);
}

#[test]
fn encoding_datetime() {
    let now = DateTime::now();
    serialize_test(now);

    // The epoch of the UA DateTime is 1601
    let unix_epoch = DateTime::from_str("1970-01-01T00:00:00Z").unwrap();
    assert_eq!(unix_epoch.ticks(), 116_444_736_000_000_000);

    // Values past the end of time encode as the maximum value
    let far_future = DateTime::from(i64::MAX);
    let bytes = far_future.encode_to_vec();
    assert_eq!(bytes, i64::MAX.encode_to_vec());

    serialize_and_compare(DateTime::null(), &[0, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn encode_guid_5226() {
    // Sample from OPC UA Part 6 - 5.2.2.6
    let expected_bytes = [
        0x91, 0x2B, 0x96, 0x72, 0x75, 0xFA, 0xE6, 0x4A, 0x8D, 0x28, 0xB4, 0x04, 0xDC, 0x7D, 0xAF,
        0x63,
    ];
    let guid = Guid::from_str("72962B91-FA75-4AE6-8D28-B404DC7DAF63").unwrap();
    serialize_and_compare(guid, &expected_bytes);
}

#[test]
fn node_id_compact_encodings() {
    // Two byte
    serialize_and_compare(NodeId::new(0, 72u32), &[0x00, 0x48]);
    // Four byte, sample from Part 6 - 5.2.2.9
    serialize_and_compare(NodeId::new(5, 1025u32), &[0x01, 0x05, 0x01, 0x04]);
    // Namespace too large for four byte
    serialize_and_compare(
        NodeId::new(256, 1u32),
        &[0x02, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00],
    );
    // Identifier too large for four byte
    serialize_and_compare(
        NodeId::new(1, 0x10000u32),
        &[0x02, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00],
    );
}

#[test]
fn node_id_string_part_6_5229() {
    // Sample from OPC UA Part 6 - 5.2.2.9
    let expected_bytes = [
        0x03, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x48, 0x6F, 0x74, 0xE6, 0xB0, 0xB4,
    ];
    serialize_and_compare(NodeId::new(1, "Hot水"), &expected_bytes);
}

#[test]
fn node_id_guid_and_byte_string() {
    serialize_test(NodeId::new(1, Guid::new()));
    serialize_test(NodeId::new(30, ByteString::from(vec![1u8, 2, 3, 4, 5])));
}

#[test]
fn node_id_unknown_encoding() {
    decode_fails::<NodeId>(&[0x09, 0x00], &DecodingOptions::test(), StatusCode::BadDecodingError);
    // Expanded flags are not allowed on a plain node id
    decode_fails::<NodeId>(&[0x80, 0x10], &DecodingOptions::test(), StatusCode::BadDecodingError);
}

#[test]
fn expanded_node_id() {
    serialize_test(ExpandedNodeId::from(NodeId::new(1, "VBL_Digital_Factory/Line1")));
    let node_id = ExpandedNodeId {
        node_id: NodeId::new(0, 12u32),
        namespace_uri: UAString::from("urn:vbl:factory"),
        server_index: 7,
    };
    let bytes = serialize_test_and_return(node_id).encode_to_vec();
    assert_eq!(bytes[0], 0xc0);
}

#[test]
fn localized_text() {
    let t = LocalizedText::new("en-US", "Pump speed");
    serialize_test(t);
    // Empty fields are omitted from the stream
    serialize_and_compare(LocalizedText::new("", "x"), &[0x02, 0x01, 0x00, 0x00, 0x00, 0x78]);
    serialize_and_compare(LocalizedText::null(), &[0x00]);
}

#[test]
fn qualified_name() {
    serialize_and_compare(
        QualifiedName::new(2, "Tag"),
        &[0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0x54, 0x61, 0x67],
    );
}

#[test]
fn extension_object() {
    let eo = ExtensionObject::null();
    serialize_and_compare(eo, &[0x00, 0x00, 0x00]);

    let token = AnonymousIdentityToken {
        policy_id: UAString::from("anonymous"),
    };
    let eo = serialize_test_and_return(ExtensionObject::from_message(&token));
    assert_eq!(
        eo.object_id().unwrap(),
        ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary
    );
    let decoded = eo
        .decode_inner::<AnonymousIdentityToken>(&DecodingOptions::test())
        .unwrap();
    assert_eq!(decoded, token);

    // Unknown body encoding
    decode_fails::<ExtensionObject>(
        &[0x00, 0x00, 0x07],
        &DecodingOptions::test(),
        StatusCode::BadDecodingError,
    );
}

#[test]
fn diagnostic_info() {
    let d = DiagnosticInfo {
        symbolic_id: Some(1),
        namespace_uri: None,
        locale: Some(3),
        localized_text: None,
        additional_info: Some(UAString::from("extra")),
        inner_status_code: Some(StatusCode::BadTimeout),
        inner_diagnostic_info: Some(Box::new(DiagnosticInfo {
            symbolic_id: Some(9),
            ..Default::default()
        })),
    };
    serialize_test(d);
    serialize_and_compare(DiagnosticInfo::null(), &[0x00]);
}

#[test]
fn data_value() {
    let dv = DataValue {
        value: Some(Variant::from(42i32)),
        status: Some(StatusCode::Good),
        source_timestamp: Some(DateTime::now()),
        source_picoseconds: Some(10),
        server_timestamp: Some(DateTime::now()),
        server_picoseconds: None,
    };
    serialize_test(dv);

    // Mask only, nothing else
    serialize_and_compare(DataValue::null(), &[0x00]);

    // Just a boolean value
    serialize_and_compare(DataValue::value_only(true), &[0x01, 0x01, 0x01]);
}

#[test]
fn data_value_filtered() {
    let dv = DataValue::new_now(1.5f64);
    let source_only = dv.filtered(TimestampsToReturn::Source);
    assert!(source_only.source_timestamp.is_some());
    assert!(source_only.server_timestamp.is_none());
    let neither = dv.filtered(TimestampsToReturn::Neither);
    assert!(neither.source_timestamp.is_none() && neither.server_timestamp.is_none());
    assert_eq!(neither.value, dv.value);
}

#[test]
fn null_array() {
    // A null array and an empty array are different on the wire
    let null: Option<Vec<u32>> = None;
    serialize_and_compare(null, &[0xff, 0xff, 0xff, 0xff]);
    let empty: Option<Vec<u32>> = Some(Vec::new());
    serialize_and_compare(empty, &[0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn array_length_limits() {
    let decoding_options = DecodingOptions {
        max_array_length: 3,
        ..DecodingOptions::test()
    };
    let values: Option<Vec<u8>> = Some(vec![1, 2, 3, 4]);
    let bytes = values.encode_to_vec();
    decode_fails::<Option<Vec<u8>>>(&bytes, &decoding_options, StatusCode::BadDecodingError);

    // Negative lengths other than -1 are invalid
    decode_fails::<Option<Vec<u8>>>(
        &[0xfe, 0xff, 0xff, 0xff],
        &DecodingOptions::test(),
        StatusCode::BadDecodingError,
    );

    // Length within limits, data missing
    decode_fails::<Option<Vec<u32>>>(
        &[0x02, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
        &DecodingOptions::test(),
        StatusCode::BadDecodingError,
    );
}

#[test]
fn enum_out_of_range() {
    let bytes = 17i32.encode_to_vec();
    decode_fails::<MessageSecurityMode>(&bytes, &DecodingOptions::test(), StatusCode::BadDecodingError);
    let bytes = 2i32.encode_to_vec();
    let mode =
        MessageSecurityMode::decode(&mut Cursor::new(bytes), &DecodingOptions::test()).unwrap();
    assert_eq!(mode, MessageSecurityMode::Sign);
}

#[test]
fn depth_gauge() {
    let dg = std::sync::Arc::new(crate::sync::Mutex::new(DepthGauge::with_max_depth(2)));
    {
        let _l1 = DepthLock::obtain(dg.clone()).unwrap();
        {
            let _l2 = DepthLock::obtain(dg.clone()).unwrap();
            assert_eq!(dg.lock().current_depth(), 2);
            assert_eq!(
                DepthLock::obtain(dg.clone()).unwrap_err(),
                StatusCode::BadDecodingError
            );
        }
        assert_eq!(dg.lock().current_depth(), 1);
    }
    assert_eq!(dg.lock().current_depth(), 0);
}

#[test]
fn deep_encoding() {
    // Nest variants inside variants past the decoding depth limit
    let mut v = Variant::from(1i32);
    for _ in 0..=constants::MAX_DECODING_DEPTH {
        v = Variant::Variant(Box::new(v));
    }
    let bytes = v.encode_to_vec();
    decode_fails::<Variant>(&bytes, &DecodingOptions::test(), StatusCode::BadDecodingError);

    // One less nesting is fine
    let mut v = Variant::from(1i32);
    for _ in 0..constants::MAX_DECODING_DEPTH - 1 {
        v = Variant::Variant(Box::new(v));
    }
    serialize_test(v);
}
