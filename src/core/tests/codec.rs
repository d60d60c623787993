use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    core::{
        comms::{
            chunker::Chunker,
            tcp_codec::{Message, TcpCodec},
            tcp_types::{ErrorMessage, HelloMessage},
        },
        handle::Handle,
        tests::*,
    },
    types::*,
};

fn codec(max_message_size: usize) -> TcpCodec {
    TcpCodec::new(DecodingOptions {
        max_message_size,
        ..Default::default()
    })
}

#[test]
fn decode_hello_in_pieces() {
    let mut codec = codec(65535);
    let hello = HelloMessage::new("opc.tcp://localhost:4842/vblfactory", 8192, 8192, 0, 0);
    let mut encoded = BytesMut::new();
    codec
        .encode(Message::Hello(hello.clone()), &mut encoded)
        .unwrap();

    // Feed the bytes across two reads, nothing must come out until the frame is complete
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&encoded[..5]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(&encoded[5..20]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
    buf.extend_from_slice(&encoded[20..]);
    match codec.decode(&mut buf).unwrap() {
        Some(Message::Hello(decoded)) => assert_eq!(decoded, hello),
        other => panic!("Expected a hello, got {:?}", other),
    }
    assert!(buf.is_empty());
}

#[test]
fn decode_two_frames_in_one_read() {
    let mut codec = codec(65535);
    let mut buf = BytesMut::new();
    codec
        .encode(
            Message::Error(ErrorMessage::from_status_code(StatusCode::BadTimeout)),
            &mut buf,
        )
        .unwrap();

    let message = CloseSecureChannelRequest {
        request_header: RequestHeader::new(&NodeId::null(), &DateTime::now(), 5),
    };
    let chunks = Chunker::encode(
        &mut Handle::channel_sequence(),
        9,
        0,
        0,
        0,
        3,
        &symmetric_header(1),
        &message.clone().into(),
    )
    .unwrap();
    codec
        .encode(Message::Chunk(chunks[0].clone()), &mut buf)
        .unwrap();

    match codec.decode(&mut buf).unwrap() {
        Some(Message::Error(err)) => assert_eq!(err.status_code(), StatusCode::BadTimeout),
        other => panic!("Expected an error, got {:?}", other),
    }
    match codec.decode(&mut buf).unwrap() {
        Some(Message::Chunk(chunk)) => {
            let decoded = Chunker::decode(&[chunk], &DecodingOptions::test()).unwrap();
            assert_eq!(decoded, SupportedMessage::from(message));
        }
        other => panic!("Expected a chunk, got {:?}", other),
    }
}

#[test]
fn message_too_large() {
    let mut codec = codec(8192);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"MSGF");
    buf.extend_from_slice(&9000u32.to_le_bytes());
    buf.extend_from_slice(&[0u8; 16]);
    assert_eq!(
        codec.decode(&mut buf).unwrap_err(),
        StatusCode::BadTcpMessageTooLarge
    );
}

#[test]
fn invalid_message_type() {
    let mut codec = codec(0);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"XYZF");
    buf.extend_from_slice(&32u32.to_le_bytes());
    assert_eq!(
        codec.decode(&mut buf).unwrap_err(),
        StatusCode::BadTcpMessageTypeInvalid
    );

    // A hello cannot be intermediate
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"HELC");
    buf.extend_from_slice(&32u32.to_le_bytes());
    assert_eq!(
        codec.decode(&mut buf).unwrap_err(),
        StatusCode::BadTcpMessageTypeInvalid
    );
}

#[test]
fn message_smaller_than_header() {
    let mut codec = codec(0);
    let mut buf = BytesMut::new();
    buf.extend_from_slice(b"HELF");
    buf.extend_from_slice(&4u32.to_le_bytes());
    assert_eq!(
        codec.decode(&mut buf).unwrap_err(),
        StatusCode::BadTcpMessageTypeInvalid
    );
}
