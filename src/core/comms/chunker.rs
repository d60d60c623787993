// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains code for turning messages into chunks and chunks into messages.

use std::io::Cursor;

use crate::{
    core::{
        comms::{
            message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType},
            security_header::SecurityHeader,
        },
        handle::Handle,
    },
    types::{
        encoding::{BinaryEncoder, DecodingOptions},
        node_id::NodeId,
        node_ids::ObjectId,
        status_code::StatusCode,
        RequestHeader, SupportedMessage,
    },
};

/// The Chunker is responsible for turning messages to chunks and chunks into messages.
pub struct Chunker;

impl Chunker {
    /// Tells you what kind of chunk a message travels in
    pub fn message_type(message: &SupportedMessage) -> MessageChunkType {
        match message {
            SupportedMessage::OpenSecureChannelRequest(_)
            | SupportedMessage::OpenSecureChannelResponse(_) => MessageChunkType::OpenSecureChannel,
            SupportedMessage::CloseSecureChannelRequest(_)
            | SupportedMessage::CloseSecureChannelResponse(_) => {
                MessageChunkType::CloseSecureChannel
            }
            _ => MessageChunkType::Message,
        }
    }

    /// Ensures the chunks of one message carry consecutive sequence numbers and a single
    /// request id. `expected_sequence_number` is the number the first chunk must carry, or
    /// `None` when the channel has not received anything yet. Numbers wrap from
    /// `LAST_CHANNEL_SEQUENCE_NUMBER` back to 1.
    ///
    /// Returns the sequence number of the last chunk.
    pub fn validate_chunks(
        expected_sequence_number: Option<u32>,
        chunks: &[MessageChunk],
        decoding_options: &DecodingOptions,
    ) -> Result<u32, StatusCode> {
        let sequence = Handle::channel_sequence();
        let mut expected_sequence_number = expected_sequence_number;
        let mut expected_request_id = None;
        let mut last_sequence_number = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(decoding_options)?;
            let sequence_number = chunk_info.sequence_header.sequence_number;
            if sequence_number == 0 {
                error!("Chunk {} has a sequence number of 0", i);
                return Err(StatusCode::BadSequenceNumberInvalid);
            }
            if let Some(expected) = expected_sequence_number {
                if sequence_number != expected {
                    error!(
                        "Chunk sequence number of {} is not the expected value of {}, idx {}",
                        sequence_number, expected, i
                    );
                    return Err(StatusCode::BadSequenceNumberInvalid);
                }
            }
            let request_id = chunk_info.sequence_header.request_id;
            match expected_request_id {
                None => expected_request_id = Some(request_id),
                Some(expected) if expected != request_id => {
                    error!(
                        "Chunk sequence number of {} has a request id {} which is not the expected value of {}, idx {}",
                        sequence_number, request_id, expected, i
                    );
                    return Err(StatusCode::BadSequenceNumberInvalid);
                }
                _ => {}
            }
            expected_sequence_number = Some(sequence.successor(sequence_number));
            last_sequence_number = sequence_number;
        }
        Ok(last_sequence_number)
    }

    /// Encodes a message into one or more chunks. Sequence numbers are only drawn from
    /// `sequence_numbers` once the message is known to fit.
    ///
    /// * `max_message_size` - total size limit of the encoded message, 0 for no limit
    /// * `max_chunk_size` - size limit of each chunk, 0 to send the message in a single chunk
    /// * `max_chunk_count` - limit on the number of chunks, 0 for no limit
    pub fn encode(
        sequence_numbers: &mut Handle,
        request_id: u32,
        max_message_size: usize,
        max_chunk_size: usize,
        max_chunk_count: usize,
        secure_channel_id: u32,
        security_header: &SecurityHeader,
        supported_message: &SupportedMessage,
    ) -> Result<Vec<MessageChunk>, StatusCode> {
        let too_large = if supported_message.is_request() {
            StatusCode::BadRequestTooLarge
        } else {
            StatusCode::BadResponseTooLarge
        };

        let node_id = NodeId::from(supported_message.type_id());
        let message_size = supported_message.byte_len() + node_id.byte_len();
        if max_message_size > 0 && message_size > max_message_size {
            error!(
                "Max message size is {} and message {} exceeds that",
                max_message_size, message_size
            );
            return Err(too_large);
        }

        trace!("Encoding node id {:?}", node_id);
        let mut stream = Cursor::new(Vec::with_capacity(message_size));
        node_id.encode(&mut stream)?;
        supported_message.encode(&mut stream)?;
        let data = stream.into_inner();

        let message_type = Chunker::message_type(supported_message);
        let max_body_per_chunk = if max_chunk_size > 0 {
            MessageChunk::body_size_from_message_size(security_header, max_chunk_size)?
        } else {
            data.len().max(1)
        };

        let data_chunks = data.chunks(max_body_per_chunk).collect::<Vec<_>>();
        if max_chunk_count > 0 && data_chunks.len() > max_chunk_count {
            error!(
                "Message needs {} chunks which exceeds the limit of {}",
                data_chunks.len(),
                max_chunk_count
            );
            return Err(too_large);
        }

        let last = data_chunks.len() - 1;
        data_chunks
            .into_iter()
            .enumerate()
            .map(|(i, data_chunk)| {
                let is_final = if i == last {
                    MessageIsFinalType::Final
                } else {
                    MessageIsFinalType::Intermediate
                };
                MessageChunk::new(
                    sequence_numbers.next(),
                    request_id,
                    message_type,
                    is_final,
                    secure_channel_id,
                    security_header,
                    data_chunk,
                )
            })
            .collect()
    }

    /// Decodes a series of chunks to create a message. The message must be of a `SupportedMessage`
    /// type otherwise an error will occur.
    pub fn decode(
        chunks: &[MessageChunk],
        decoding_options: &DecodingOptions,
    ) -> Result<SupportedMessage, StatusCode> {
        let mut data = Cursor::new(Self::body(chunks, decoding_options)?);

        let node_id = NodeId::decode(&mut data, decoding_options)?;
        let object_id = Self::object_id_from_node_id(&node_id)?;

        match SupportedMessage::decode_by_object_id(&mut data, object_id, decoding_options) {
            Ok(SupportedMessage::Invalid(object_id)) => {
                debug!("Message {:?} is unsupported", object_id);
                Err(StatusCode::BadServiceUnsupported)
            }
            Ok(decoded_message) => Ok(decoded_message),
            Err(err) => {
                debug!("Cannot decode message {:?}, err = {}", object_id, err);
                Err(err)
            }
        }
    }

    /// Reads just the request header from the body of a request that could not be decoded
    /// in full, so the caller can still answer with a fault.
    pub fn decode_request_header(
        chunks: &[MessageChunk],
        decoding_options: &DecodingOptions,
    ) -> Option<RequestHeader> {
        let mut data = Cursor::new(Self::body(chunks, decoding_options).ok()?);
        let node_id = NodeId::decode(&mut data, decoding_options).ok()?;
        if node_id.namespace != 0 || !node_id.is_numeric() {
            return None;
        }
        RequestHeader::decode(&mut data, decoding_options).ok()
    }

    /// Concatenates the bodies of the chunks, checking that only the last chunk is final
    fn body(chunks: &[MessageChunk], decoding_options: &DecodingOptions) -> Result<Vec<u8>, StatusCode> {
        if chunks.is_empty() {
            return Err(StatusCode::BadDecodingError);
        }
        let mut data = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let chunk_info = chunk.chunk_info(decoding_options)?;
            let expected_is_final = if i == chunks.len() - 1 {
                MessageIsFinalType::Final
            } else {
                MessageIsFinalType::Intermediate
            };
            if chunk_info.message_header.is_final != expected_is_final {
                error!(
                    "Chunk {} is {:?} but {:?} was expected",
                    i, chunk_info.message_header.is_final, expected_is_final
                );
                return Err(StatusCode::BadDecodingError);
            }
            let body_start = chunk_info.body_offset;
            let body_end = body_start + chunk_info.body_length;
            data.extend_from_slice(&chunk.data[body_start..body_end]);
        }
        Ok(data)
    }

    fn object_id_from_node_id(node_id: &NodeId) -> Result<ObjectId, StatusCode> {
        if node_id.namespace != 0 || !node_id.is_numeric() {
            error!(
                "Expecting chunk to contain a OPC UA request or response, got {:?}",
                node_id
            );
            return Err(StatusCode::BadDecodingError);
        }
        node_id.as_object_id().map_err(|_| {
            debug!("The node {:?} is not an object id the server knows", node_id);
            StatusCode::BadServiceUnsupported
        })
    }
}
