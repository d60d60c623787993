// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! A message chunk is a message or part of a message. Chunks are never signed or encrypted
//! since the server only speaks the None security policy.

use std::io::{Cursor, Read, Write};

use crate::types::{status_code::StatusCode, *};

use super::{
    security_header::{
        AsymmetricSecurityHeader, SecurityHeader, SequenceHeader, SymmetricSecurityHeader,
    },
    tcp_types::{
        CHUNK_FINAL, CHUNK_FINAL_ERROR, CHUNK_INTERMEDIATE, CHUNK_MESSAGE,
        CLOSE_SECURE_CHANNEL_MESSAGE, MIN_CHUNK_SIZE, OPEN_SECURE_CHANNEL_MESSAGE,
    },
};

/// The size of a chunk header, used by several places
pub const MESSAGE_CHUNK_HEADER_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChunkType {
    Message,
    OpenSecureChannel,
    CloseSecureChannel,
}

impl MessageChunkType {
    pub fn is_open_secure_channel(&self) -> bool {
        *self == MessageChunkType::OpenSecureChannel
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageIsFinalType {
    /// Intermediate
    Intermediate,
    /// Final chunk
    Final,
    /// Abort
    FinalError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunkHeader {
    /// The kind of chunk - message, open or close
    pub message_type: MessageChunkType,
    /// The chunk type - C == intermediate, F = the final chunk, A = the final chunk when aborting
    pub is_final: MessageIsFinalType,
    /// The size of the chunk (message) including the header
    pub message_size: u32,
    /// Secure channel id
    pub secure_channel_id: u32,
}

impl BinaryEncoder<MessageChunkHeader> for MessageChunkHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_CHUNK_HEADER_SIZE
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let message_type = match self.message_type {
            MessageChunkType::Message => CHUNK_MESSAGE,
            MessageChunkType::OpenSecureChannel => OPEN_SECURE_CHANNEL_MESSAGE,
            MessageChunkType::CloseSecureChannel => CLOSE_SECURE_CHANNEL_MESSAGE,
        };
        let is_final = match self.is_final {
            MessageIsFinalType::Intermediate => CHUNK_INTERMEDIATE,
            MessageIsFinalType::Final => CHUNK_FINAL,
            MessageIsFinalType::FinalError => CHUNK_FINAL_ERROR,
        };
        let mut size = process_encode_io_result(stream.write_all(message_type).map(|_| 3))?;
        size += write_u8(stream, is_final)?;
        size += write_u32(stream, self.message_size)?;
        size += write_u32(stream, self.secure_channel_id)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type_code = [0u8; 3];
        process_decode_io_result(stream.read_exact(&mut message_type_code))?;
        let message_type = match &message_type_code[..] {
            CHUNK_MESSAGE => MessageChunkType::Message,
            OPEN_SECURE_CHANNEL_MESSAGE => MessageChunkType::OpenSecureChannel,
            CLOSE_SECURE_CHANNEL_MESSAGE => MessageChunkType::CloseSecureChannel,
            _ => {
                error!("Invalid message code");
                return Err(StatusCode::BadDecodingError);
            }
        };

        let is_final = match read_u8(stream)? {
            CHUNK_FINAL => MessageIsFinalType::Final,
            CHUNK_INTERMEDIATE => MessageIsFinalType::Intermediate,
            CHUNK_FINAL_ERROR => MessageIsFinalType::FinalError,
            _ => {
                error!("Invalid chunk type");
                return Err(StatusCode::BadDecodingError);
            }
        };

        let message_size = read_u32(stream)?;
        let secure_channel_id = read_u32(stream)?;

        Ok(MessageChunkHeader {
            message_type,
            is_final,
            message_size,
            secure_channel_id,
        })
    }
}

/// Chunk info provides some basic information gleaned from reading the chunk such as offsets
/// into the chunk and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkInfo {
    pub message_header: MessageChunkHeader,
    /// OPN chunks carry an asymmetric security header, everything else a symmetric one
    pub security_header: SecurityHeader,
    pub sequence_header: SequenceHeader,
    /// Byte offset to the security header
    pub security_header_offset: usize,
    /// Byte offset to the sequence header
    pub sequence_header_offset: usize,
    /// Byte offset to actual message body
    pub body_offset: usize,
    /// Length of message body
    pub body_length: usize,
}

/// A chunk holds a message or a portion of a message, header and all.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageChunk {
    pub data: Vec<u8>,
}

impl BinaryEncoder<MessageChunk> for MessageChunk {
    fn byte_len(&self) -> usize {
        self.data.len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        stream.write_all(&self.data).map_err(|_| {
            error!("Encoding error while writing to stream");
            StatusCode::BadEncodingError
        })?;
        Ok(self.data.len())
    }

    fn decode<S: Read>(
        in_stream: &mut S,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let chunk_header =
            MessageChunkHeader::decode(in_stream, decoding_options).map_err(|err| {
                error!("Cannot decode chunk header {:?}", err);
                StatusCode::BadCommunicationError
            })?;

        let message_size = chunk_header.message_size as usize;
        if decoding_options.max_message_size > 0 && message_size > decoding_options.max_message_size
        {
            error!(
                "Chunk size {} exceeds the maximum message size {}",
                message_size, decoding_options.max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge);
        }
        if message_size < MESSAGE_CHUNK_HEADER_SIZE {
            error!("Chunk size {} is smaller than its own header", message_size);
            return Err(StatusCode::BadTcpMessageTypeInvalid);
        }

        let mut stream = Cursor::new(vec![0u8; message_size]);
        chunk_header.encode(&mut stream)?;
        let mut data = stream.into_inner();
        process_decode_io_result(in_stream.read_exact(&mut data[MESSAGE_CHUNK_HEADER_SIZE..]))?;
        Ok(MessageChunk { data })
    }
}

impl MessageChunk {
    pub fn new(
        sequence_number: u32,
        request_id: u32,
        message_type: MessageChunkType,
        is_final: MessageIsFinalType,
        secure_channel_id: u32,
        security_header: &SecurityHeader,
        data: &[u8],
    ) -> Result<MessageChunk, StatusCode> {
        let sequence_header = SequenceHeader {
            sequence_number,
            request_id,
        };

        let message_size = MESSAGE_CHUNK_HEADER_SIZE
            + security_header.byte_len()
            + sequence_header.byte_len()
            + data.len();
        trace!("Creating a chunk with a size of {}", message_size);

        let chunk_header = MessageChunkHeader {
            message_type,
            is_final,
            message_size: message_size as u32,
            secure_channel_id,
        };

        let mut stream = Cursor::new(Vec::with_capacity(message_size));
        chunk_header.encode(&mut stream)?;
        security_header.encode(&mut stream)?;
        sequence_header.encode(&mut stream)?;
        process_encode_io_result(stream.write_all(data).map(|_| data.len()))?;

        Ok(MessageChunk {
            data: stream.into_inner(),
        })
    }

    /// The space left for the body in a chunk of `message_size` bytes
    pub fn body_size_from_message_size(
        security_header: &SecurityHeader,
        message_size: usize,
    ) -> Result<usize, StatusCode> {
        if message_size < MIN_CHUNK_SIZE {
            error!(
                "message size {} is less than minimum allowed by the protocol",
                message_size
            );
            return Err(StatusCode::BadTcpInternalError);
        }
        Ok(message_size - MESSAGE_CHUNK_HEADER_SIZE - security_header.byte_len() - 8)
    }

    pub fn message_header(
        &self,
        decoding_options: &DecodingOptions,
    ) -> Result<MessageChunkHeader, StatusCode> {
        let mut stream = Cursor::new(&self.data);
        MessageChunkHeader::decode(&mut stream, decoding_options)
    }

    pub fn is_open_secure_channel(&self, decoding_options: &DecodingOptions) -> bool {
        self.message_header(decoding_options)
            .map(|h| h.message_type.is_open_secure_channel())
            .unwrap_or(false)
    }

    /// Parses the headers of the chunk and works out where the body lies
    pub fn chunk_info(&self, decoding_options: &DecodingOptions) -> Result<ChunkInfo, StatusCode> {
        let mut stream = Cursor::new(&self.data);
        let message_header = MessageChunkHeader::decode(&mut stream, decoding_options)?;
        if message_header.message_size as usize != self.data.len() {
            error!(
                "Chunk header says {} bytes but the chunk holds {}",
                message_header.message_size,
                self.data.len()
            );
            return Err(StatusCode::BadDecodingError);
        }

        let security_header_offset = stream.position() as usize;
        let security_header = if message_header.message_type.is_open_secure_channel() {
            let security_header = AsymmetricSecurityHeader::decode(&mut stream, decoding_options)
                .map_err(|err| {
                    error!("chunk_info() cannot decode asymmetric security_header, {}", err);
                    StatusCode::BadCommunicationError
                })?;
            SecurityHeader::Asymmetric(security_header)
        } else {
            let security_header = SymmetricSecurityHeader::decode(&mut stream, decoding_options)
                .map_err(|err| {
                    error!("chunk_info() cannot decode symmetric security_header, {}", err);
                    StatusCode::BadCommunicationError
                })?;
            SecurityHeader::Symmetric(security_header)
        };

        let sequence_header_offset = stream.position() as usize;
        let sequence_header = SequenceHeader::decode(&mut stream, decoding_options).map_err(|err| {
            error!("Cannot decode sequence header {}", err);
            StatusCode::BadCommunicationError
        })?;

        let body_offset = stream.position() as usize;
        Ok(ChunkInfo {
            message_header,
            security_header,
            sequence_header,
            security_header_offset,
            sequence_header_offset,
            body_offset,
            body_length: self.data.len() - body_offset,
        })
    }
}
