// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of the UA over TCP connection messages, HEL, ACK and ERR, and the
//! 8 byte header shared by everything sent over the socket.

use std::io::{Read, Write};

use crate::core::constants::PROTOCOL_VERSION;
use crate::types::{encoding::*, status_code::StatusCode, string::UAString};

use super::url::url_matches_except_host;

pub const CHUNK_MESSAGE: &[u8] = b"MSG";
pub const OPEN_SECURE_CHANNEL_MESSAGE: &[u8] = b"OPN";
pub const CLOSE_SECURE_CHANNEL_MESSAGE: &[u8] = b"CLO";

const HELLO_MESSAGE: &[u8] = b"HEL";
const ACKNOWLEDGE_MESSAGE: &[u8] = b"ACK";
const ERROR_MESSAGE: &[u8] = b"ERR";

pub const CHUNK_FINAL: u8 = b'F';
pub const CHUNK_INTERMEDIATE: u8 = b'C';
pub const CHUNK_FINAL_ERROR: u8 = b'A';

/// Minimum size in bytes than any single message chunk can be
pub const MIN_CHUNK_SIZE: usize = 8192;

/// Size in bytes of an OPC UA message header
pub const MESSAGE_HEADER_LEN: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageType {
    Invalid,
    Hello,
    Acknowledge,
    Chunk,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeader {
    pub message_type: MessageType,
    pub message_size: u32,
}

impl BinaryEncoder<MessageHeader> for MessageHeader {
    fn byte_len(&self) -> usize {
        MESSAGE_HEADER_LEN
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let message_type = match self.message_type {
            MessageType::Hello => HELLO_MESSAGE,
            MessageType::Acknowledge => ACKNOWLEDGE_MESSAGE,
            MessageType::Error => ERROR_MESSAGE,
            MessageType::Chunk | MessageType::Invalid => {
                // Chunks write their own header
                error!(
                    "Cannot write a header of type {:?} as a connection message",
                    self.message_type
                );
                return Err(StatusCode::BadEncodingError);
            }
        };
        let mut size = process_encode_io_result(stream.write_all(message_type).map(|_| 3))?;
        size += write_u8(stream, CHUNK_FINAL)?;
        size += write_u32(stream, self.message_size)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        let mut message_type = [0u8; 4];
        process_decode_io_result(stream.read_exact(&mut message_type))?;
        let message_size = read_u32(stream)?;
        Ok(MessageHeader {
            message_type: MessageHeader::message_type(&message_type),
            message_size,
        })
    }
}

impl MessageHeader {
    pub fn new(message_type: MessageType) -> MessageHeader {
        MessageHeader {
            message_type,
            message_size: 0,
        }
    }

    /// Identifies the message from the first 4 bytes of the header, the 3 letter kind followed
    /// by the chunk type.
    pub fn message_type(t: &[u8]) -> MessageType {
        if t.len() != 4 {
            return MessageType::Invalid;
        }
        let message_type = match &t[0..3] {
            HELLO_MESSAGE => MessageType::Hello,
            ACKNOWLEDGE_MESSAGE => MessageType::Acknowledge,
            ERROR_MESSAGE => MessageType::Error,
            CHUNK_MESSAGE | OPEN_SECURE_CHANNEL_MESSAGE | CLOSE_SECURE_CHANNEL_MESSAGE => {
                MessageType::Chunk
            }
            _ => {
                error!("message type doesn't match anything");
                return MessageType::Invalid;
            }
        };
        // Connection messages are always final, only chunks may be intermediate or aborts
        match t[3] {
            CHUNK_FINAL => message_type,
            CHUNK_INTERMEDIATE | CHUNK_FINAL_ERROR if message_type == MessageType::Chunk => {
                message_type
            }
            _ => MessageType::Invalid,
        }
    }
}

/// Picks the smaller of two sizes where 0 stands for "no limit"
pub fn min_zero_infinite(server: u32, client: u32) -> u32 {
    match (server, client) {
        (0, client) => client,
        (server, 0) => server,
        (server, client) => server.min(client),
    }
}

/// Implementation of the HEL message in OPC UA
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    pub message_header: MessageHeader,
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
    pub endpoint_url: UAString,
}

impl BinaryEncoder<HelloMessage> for HelloMessage {
    fn byte_len(&self) -> usize {
        // 5 * u32 = 20
        self.message_header.byte_len() + 20 + self.endpoint_url.byte_len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = 0;
        size += self.message_header.encode(stream)?;
        size += self.protocol_version.encode(stream)?;
        size += self.receive_buffer_size.encode(stream)?;
        size += self.send_buffer_size.encode(stream)?;
        size += self.max_message_size.encode(stream)?;
        size += self.max_chunk_count.encode(stream)?;
        size += self.endpoint_url.encode(stream)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(HelloMessage {
            message_header: MessageHeader::decode(stream, decoding_options)?,
            protocol_version: u32::decode(stream, decoding_options)?,
            receive_buffer_size: u32::decode(stream, decoding_options)?,
            send_buffer_size: u32::decode(stream, decoding_options)?,
            max_message_size: u32::decode(stream, decoding_options)?,
            max_chunk_count: u32::decode(stream, decoding_options)?,
            endpoint_url: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl HelloMessage {
    const MAX_URL_LEN: usize = 4096;

    /// Creates a HEL message
    pub fn new(
        endpoint_url: &str,
        send_buffer_size: usize,
        receive_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> HelloMessage {
        let mut msg = HelloMessage {
            message_header: MessageHeader::new(MessageType::Hello),
            protocol_version: PROTOCOL_VERSION,
            send_buffer_size: send_buffer_size as u32,
            receive_buffer_size: receive_buffer_size as u32,
            max_message_size: max_message_size as u32,
            max_chunk_count: max_chunk_count as u32,
            endpoint_url: UAString::from(endpoint_url),
        };
        msg.message_header.message_size = msg.byte_len() as u32;
        msg
    }

    /// Checks the hello against the server's endpoint urls. The host part of the url is not
    /// compared since clients may reach the server through any of its names.
    pub fn validate(&self, endpoint_urls: &[String]) -> Result<(), StatusCode> {
        if self.protocol_version != PROTOCOL_VERSION {
            error!(
                "Client requested protocol version {}, only {} is supported",
                self.protocol_version, PROTOCOL_VERSION
            );
            return Err(StatusCode::BadProtocolVersionUnsupported);
        }
        if !self.is_valid_buffer_sizes() {
            error!(
                "Hello buffer sizes receive {} / send {} are below the minimum of {}",
                self.receive_buffer_size, self.send_buffer_size, MIN_CHUNK_SIZE
            );
            return Err(StatusCode::BadCommunicationError);
        }
        if !self.is_endpoint_url_valid(endpoint_urls) {
            error!("Hello endpoint url {} is not served", self.endpoint_url);
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        Ok(())
    }

    pub fn is_endpoint_url_valid(&self, endpoint_urls: &[String]) -> bool {
        match self.endpoint_url.value() {
            Some(endpoint_url) if endpoint_url.len() <= HelloMessage::MAX_URL_LEN => endpoint_urls
                .iter()
                .any(|e| url_matches_except_host(e, endpoint_url)),
            Some(_) => {
                error!("Supplied endpoint url exceeds maximum length");
                false
            }
            None => {
                error!("Hello message contains no endpoint url");
                false
            }
        }
    }

    pub fn is_valid_buffer_sizes(&self) -> bool {
        // Set in part 6 as minimum transport buffer size
        self.receive_buffer_size >= MIN_CHUNK_SIZE as u32
            && self.send_buffer_size >= MIN_CHUNK_SIZE as u32
    }
}

/// Implementation of the ACK message in OPC UA
#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgeMessage {
    pub message_header: MessageHeader,
    pub protocol_version: u32,
    pub receive_buffer_size: u32,
    pub send_buffer_size: u32,
    pub max_message_size: u32,
    pub max_chunk_count: u32,
}

impl BinaryEncoder<AcknowledgeMessage> for AcknowledgeMessage {
    fn byte_len(&self) -> usize {
        self.message_header.byte_len() + 20
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size: usize = 0;
        size += self.message_header.encode(stream)?;
        size += self.protocol_version.encode(stream)?;
        size += self.receive_buffer_size.encode(stream)?;
        size += self.send_buffer_size.encode(stream)?;
        size += self.max_message_size.encode(stream)?;
        size += self.max_chunk_count.encode(stream)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(AcknowledgeMessage {
            message_header: MessageHeader::decode(stream, decoding_options)?,
            protocol_version: u32::decode(stream, decoding_options)?,
            receive_buffer_size: u32::decode(stream, decoding_options)?,
            send_buffer_size: u32::decode(stream, decoding_options)?,
            max_message_size: u32::decode(stream, decoding_options)?,
            max_chunk_count: u32::decode(stream, decoding_options)?,
        })
    }
}

impl AcknowledgeMessage {
    /// Builds the server's answer to a hello. The server's receive buffer answers the client's
    /// send buffer and vice versa, each being the smaller of the two sides.
    pub fn revised(
        hello: &HelloMessage,
        receive_buffer_size: usize,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) -> AcknowledgeMessage {
        let mut ack = AcknowledgeMessage {
            message_header: MessageHeader::new(MessageType::Acknowledge),
            protocol_version: PROTOCOL_VERSION,
            receive_buffer_size: min_zero_infinite(
                receive_buffer_size as u32,
                hello.send_buffer_size,
            ),
            send_buffer_size: min_zero_infinite(
                send_buffer_size as u32,
                hello.receive_buffer_size,
            ),
            max_message_size: min_zero_infinite(max_message_size as u32, hello.max_message_size),
            max_chunk_count: min_zero_infinite(max_chunk_count as u32, hello.max_chunk_count),
        };
        ack.message_header.message_size = ack.byte_len() as u32;
        ack
    }
}

/// Implementation of the ERR message in OPC UA
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub message_header: MessageHeader,
    pub error: u32,
    pub reason: UAString,
}

impl BinaryEncoder<ErrorMessage> for ErrorMessage {
    fn byte_len(&self) -> usize {
        self.message_header.byte_len() + self.error.byte_len() + self.reason.byte_len()
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size: usize = 0;
        size += self.message_header.encode(stream)?;
        size += self.error.encode(stream)?;
        size += self.reason.encode(stream)?;
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        Ok(ErrorMessage {
            message_header: MessageHeader::decode(stream, decoding_options)?,
            error: u32::decode(stream, decoding_options)?,
            reason: UAString::decode(stream, decoding_options)?,
        })
    }
}

impl ErrorMessage {
    pub fn from_status_code(status_code: StatusCode) -> ErrorMessage {
        let mut error = ErrorMessage {
            message_header: MessageHeader::new(MessageType::Error),
            error: status_code.bits(),
            reason: UAString::from(status_code.name()),
        };
        error.message_header.message_size = error.byte_len() as u32;
        error
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_bits(self.error)
    }
}
