use crate::{
    core::{
        comms::{chunker::*, message_chunk::*, tcp_types::MIN_CHUNK_SIZE},
        handle::{Handle, LAST_CHANNEL_SEQUENCE_NUMBER},
        tests::*,
    },
    types::*,
};

fn make_large_read_response() -> SupportedMessage {
    let results = (0..10000).map(|i| DataValue::new_now(i as u32)).collect();
    ReadResponse {
        response_header: ResponseHeader::with_timestamp(DateTime::now(), 0, StatusCode::Good),
        results: Some(results),
        diagnostic_infos: None,
    }
    .into()
}

fn large_decoding_options() -> DecodingOptions {
    DecodingOptions {
        max_chunk_count: 0,
        max_message_size: 0,
        // The large response uses a large array
        max_array_length: 20000,
        ..Default::default()
    }
}

fn open_secure_channel_request() -> SupportedMessage {
    OpenSecureChannelRequest {
        request_header: RequestHeader::new(&NodeId::null(), &DateTime::now(), 1),
        client_protocol_version: 0,
        request_type: SecurityTokenRequestType::Issue,
        security_mode: MessageSecurityMode::None,
        client_nonce: ByteString::null(),
        requested_lifetime: 60000,
    }
    .into()
}

/// Encode a very large message with a maximum chunk size and ensure that it turns into multiple chunks
/// and that the chunks can be decoded back to the original message.
#[test]
fn chunk_multi_encode_decode() {
    let decoding_options = large_decoding_options();
    let response = make_large_read_response();

    let mut sequence_numbers = Handle::channel_sequence();
    sequence_numbers.set_next(1000);
    let chunks = Chunker::encode(
        &mut sequence_numbers,
        100,
        0,
        MIN_CHUNK_SIZE,
        0,
        7,
        &symmetric_header(1),
        &response,
    )
    .unwrap();
    assert!(chunks.len() > 1);

    for (i, chunk) in chunks.iter().enumerate() {
        let chunk_info = chunk.chunk_info(&decoding_options).unwrap();
        assert_eq!(chunk_info.sequence_header.sequence_number, 1000 + i as u32);
        assert_eq!(chunk_info.sequence_header.request_id, 100);
        assert_eq!(chunk_info.message_header.secure_channel_id, 7);
        assert!(chunk.data.len() <= MIN_CHUNK_SIZE);
    }

    let last = Chunker::validate_chunks(Some(1000), &chunks, &decoding_options).unwrap();
    assert_eq!(last, 1000 + chunks.len() as u32 - 1);

    let new_response = Chunker::decode(&chunks, &decoding_options).unwrap();
    assert_eq!(response, new_response);
}

/// The last chunk must be marked final and no other chunk may be
#[test]
fn chunk_final_flag_mismatch() {
    let decoding_options = large_decoding_options();
    let mut sequence_numbers = Handle::channel_sequence();
    let chunks = Chunker::encode(
        &mut sequence_numbers,
        1,
        0,
        MIN_CHUNK_SIZE,
        0,
        1,
        &symmetric_header(1),
        &make_large_read_response(),
    )
    .unwrap();
    assert!(chunks.len() > 2);

    // Drop the final chunk
    let truncated = &chunks[..chunks.len() - 1];
    assert_eq!(
        Chunker::decode(truncated, &decoding_options).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

/// A message that needs more chunks than allowed cannot be sent
#[test]
fn chunk_count_exceeded() {
    let mut sequence_numbers = Handle::channel_sequence();
    let err = Chunker::encode(
        &mut sequence_numbers,
        1,
        0,
        MIN_CHUNK_SIZE,
        2,
        1,
        &symmetric_header(1),
        &make_large_read_response(),
    )
    .unwrap_err();
    assert_eq!(err, StatusCode::BadResponseTooLarge);
    // Nothing was consumed since nothing was sent
    assert_eq!(sequence_numbers.peek(), 1);
}

/// Sequence numbers must increase by exactly one from chunk to chunk
#[test]
fn validate_chunks_sequence_gap() {
    let decoding_options = large_decoding_options();
    let mut sequence_numbers = Handle::channel_sequence();
    let mut chunks = Chunker::encode(
        &mut sequence_numbers,
        1,
        0,
        MIN_CHUNK_SIZE,
        0,
        1,
        &symmetric_header(1),
        &make_large_read_response(),
    )
    .unwrap();

    // Nothing received yet, any first number is acceptable
    assert!(Chunker::validate_chunks(None, &chunks, &decoding_options).is_ok());
    // Wrong starting number
    assert_eq!(
        Chunker::validate_chunks(Some(5), &chunks, &decoding_options).unwrap_err(),
        StatusCode::BadSequenceNumberInvalid
    );

    // Gap in the middle
    set_chunk_sequence_number(&mut chunks[1], 50);
    assert_eq!(
        Chunker::validate_chunks(Some(1), &chunks, &decoding_options).unwrap_err(),
        StatusCode::BadSequenceNumberInvalid
    );
}

/// Every chunk of a message must carry the same request id
#[test]
fn validate_chunks_request_id_mismatch() {
    let decoding_options = large_decoding_options();
    let mut sequence_numbers = Handle::channel_sequence();
    let mut chunks = Chunker::encode(
        &mut sequence_numbers,
        33,
        0,
        MIN_CHUNK_SIZE,
        0,
        1,
        &symmetric_header(1),
        &make_large_read_response(),
    )
    .unwrap();
    assert_eq!(set_chunk_request_id(&mut chunks[1], 34), 33);
    assert_eq!(
        Chunker::validate_chunks(Some(1), &chunks, &decoding_options).unwrap_err(),
        StatusCode::BadSequenceNumberInvalid
    );
}

/// After the last permitted number the sequence continues at 1
#[test]
fn validate_chunks_sequence_wrap() {
    let decoding_options = large_decoding_options();
    let mut sequence_numbers = Handle::channel_sequence();
    sequence_numbers.set_next(LAST_CHANNEL_SEQUENCE_NUMBER - 1);
    let chunks = Chunker::encode(
        &mut sequence_numbers,
        1,
        0,
        MIN_CHUNK_SIZE,
        0,
        1,
        &symmetric_header(1),
        &make_large_read_response(),
    )
    .unwrap();
    assert!(chunks.len() > 3);

    let numbers = chunks
        .iter()
        .map(|c| {
            c.chunk_info(&decoding_options)
                .unwrap()
                .sequence_header
                .sequence_number
        })
        .collect::<Vec<_>>();
    assert_eq!(
        &numbers[..4],
        &[LAST_CHANNEL_SEQUENCE_NUMBER - 1, LAST_CHANNEL_SEQUENCE_NUMBER, 1, 2]
    );
    assert!(Chunker::validate_chunks(
        Some(LAST_CHANNEL_SEQUENCE_NUMBER - 1),
        &chunks,
        &decoding_options
    )
    .is_ok());
}

/// Open secure channel requests travel in OPN chunks with an asymmetric header
#[test]
fn open_secure_channel_chunk() {
    let decoding_options = DecodingOptions::test();
    let request = open_secure_channel_request();
    let mut sequence_numbers = Handle::channel_sequence();
    let chunks = Chunker::encode(
        &mut sequence_numbers,
        1,
        0,
        0,
        0,
        0,
        &asymmetric_header(),
        &request,
    )
    .unwrap();
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].is_open_secure_channel(&decoding_options));

    let chunk_info = chunks[0].chunk_info(&decoding_options).unwrap();
    let SecurityHeader::Asymmetric(header) = chunk_info.security_header else {
        panic!("Expected an asymmetric security header");
    };
    assert!(header.is_security_policy_none());

    assert_eq!(Chunker::decode(&chunks, &decoding_options).unwrap(), request);
}

/// A body whose type id is not a known message is rejected, but its request header is still
/// readable so the request can be faulted
#[test]
fn decode_unknown_message_type() {
    let decoding_options = DecodingOptions::test();
    let request_header = RequestHeader::new(&NodeId::null(), &DateTime::now(), 77);

    // An object id the server has no message for, followed by a request header
    let mut body = Vec::new();
    NodeId::from(ObjectId::ServerStatusDataType_Encoding_DefaultBinary)
        .encode(&mut body)
        .unwrap();
    request_header.encode(&mut body).unwrap();

    let chunk = MessageChunk::new(
        1,
        1,
        MessageChunkType::Message,
        MessageIsFinalType::Final,
        1,
        &symmetric_header(1),
        &body,
    )
    .unwrap();
    let chunks = vec![chunk];

    assert_eq!(
        Chunker::decode(&chunks, &decoding_options).unwrap_err(),
        StatusCode::BadServiceUnsupported
    );
    let decoded_header = Chunker::decode_request_header(&chunks, &decoding_options).unwrap();
    assert_eq!(decoded_header.request_handle, 77);
}

/// The body must start with a namespace 0 numeric node id
#[test]
fn decode_non_standard_type_id() {
    let decoding_options = DecodingOptions::test();
    let mut body = Vec::new();
    NodeId::new(2, "Foo").encode(&mut body).unwrap();
    let chunk = MessageChunk::new(
        1,
        1,
        MessageChunkType::Message,
        MessageIsFinalType::Final,
        1,
        &symmetric_header(1),
        &body,
    )
    .unwrap();
    assert_eq!(
        Chunker::decode(&[chunk], &decoding_options).unwrap_err(),
        StatusCode::BadDecodingError
    );
}

#[test]
fn body_size_is_bounded_by_minimum_chunk_size() {
    assert_eq!(
        MessageChunk::body_size_from_message_size(&symmetric_header(1), 100).unwrap_err(),
        StatusCode::BadTcpInternalError
    );
    assert_eq!(
        MessageChunk::body_size_from_message_size(&symmetric_header(1), MIN_CHUNK_SIZE).unwrap(),
        MIN_CHUNK_SIZE - MESSAGE_CHUNK_HEADER_SIZE - 4 - 8
    );
}
