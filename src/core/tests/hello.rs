use crate::{
    core::comms::tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, MessageHeader, MessageType,
        MIN_CHUNK_SIZE,
    },
    types::{StatusCode, UAString},
};

fn endpoints() -> Vec<String> {
    vec!["opc.tcp://foo:4842/vblfactory".to_string()]
}

#[test]
fn endpoint_url() {
    let mut h = HelloMessage::new("", 8192, 8192, 0, 0);
    h.endpoint_url = UAString::null();

    // Negative tests
    assert!(!h.is_endpoint_url_valid(&endpoints()));
    h.endpoint_url = UAString::from("");
    assert!(!h.is_endpoint_url_valid(&endpoints()));
    h.endpoint_url = UAString::from("opc.tcp://foo:4842/blah");
    assert!(!h.is_endpoint_url_valid(&endpoints()));
    // 4097 bytes
    h.endpoint_url = UAString::from(format!(
        "opc.tcp://foo:4842/{}",
        (0..4080).map(|_| 'A').collect::<String>()
    ));
    assert!(!h.is_endpoint_url_valid(&endpoints()));

    // Positive tests
    h.endpoint_url = UAString::from("opc.tcp://foo:4842/vblfactory");
    assert!(h.is_endpoint_url_valid(&endpoints()));
    // Hostname is ignored
    h.endpoint_url = UAString::from("opc.tcp://bar:4842/vblfactory");
    assert!(h.is_endpoint_url_valid(&endpoints()));
}

#[test]
fn valid_buffer_sizes() {
    let mut h = HelloMessage {
        message_header: MessageHeader::new(MessageType::Hello),
        protocol_version: 0,
        receive_buffer_size: 0,
        send_buffer_size: 0,
        max_message_size: 0,
        max_chunk_count: 0,
        endpoint_url: UAString::null(),
    };
    assert!(!h.is_valid_buffer_sizes());
    h.receive_buffer_size = 8191;
    assert!(!h.is_valid_buffer_sizes());
    h.send_buffer_size = 8191;
    assert!(!h.is_valid_buffer_sizes());
    h.receive_buffer_size = 8192;
    assert!(!h.is_valid_buffer_sizes());
    h.send_buffer_size = 8192;
    assert!(h.is_valid_buffer_sizes());
}

#[test]
fn validate_hello() {
    let url = "opc.tcp://localhost:4842/vblfactory";
    let h = HelloMessage::new(url, 65535, 65535, 0, 0);
    assert!(h.validate(&endpoints()).is_ok());

    let mut h = HelloMessage::new(url, 65535, 65535, 0, 0);
    h.protocol_version = 1;
    assert_eq!(
        h.validate(&endpoints()).unwrap_err(),
        StatusCode::BadProtocolVersionUnsupported
    );

    let h = HelloMessage::new(url, 1024, 65535, 0, 0);
    assert_eq!(
        h.validate(&endpoints()).unwrap_err(),
        StatusCode::BadCommunicationError
    );

    let h = HelloMessage::new("opc.tcp://localhost:4842/other", 65535, 65535, 0, 0);
    assert_eq!(
        h.validate(&endpoints()).unwrap_err(),
        StatusCode::BadTcpEndpointUrlInvalid
    );
}

#[test]
fn acknowledge_takes_smaller_limits() {
    // Client sends 16384 and receives 32768, caps messages at 100000 and has no chunk limit
    let h = HelloMessage::new(
        "opc.tcp://localhost:4842/vblfactory",
        16384,
        32768,
        100000,
        0,
    );
    let ack = AcknowledgeMessage::revised(&h, 65535, 65535, 327675, 5);
    assert_eq!(ack.receive_buffer_size, 16384);
    assert_eq!(ack.send_buffer_size, 32768);
    assert_eq!(ack.max_message_size, 100000);
    assert_eq!(ack.max_chunk_count, 5);
    assert!(ack.receive_buffer_size as usize >= MIN_CHUNK_SIZE);
}

#[test]
fn error_message_carries_status() {
    let err = ErrorMessage::from_status_code(StatusCode::BadTcpMessageTooLarge);
    assert_eq!(err.status_code(), StatusCode::BadTcpMessageTooLarge);
    assert_eq!(err.reason.as_ref(), "BadTcpMessageTooLarge");
}
