// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The codec is an implementation of a tokio Encoder/Decoder which can be used to read
//! data from the socket in terms of frames which in our case are any of the following:
//!
//! * HEL - Hello message
//! * ACK - Acknowledge message
//! * ERR - Error message
//! * MSG - Message chunk
//! * OPN - Open Secure Channel message
//! * CLO - Close Secure Channel message
//!
//! Errors are reported as status codes so the transport can tell the peer why the connection
//! is being dropped.

use std::io;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::types::{
    encoding::{BinaryEncoder, DecodingOptions},
    status_code::StatusCode,
};

use super::{
    message_chunk::MessageChunk,
    tcp_types::{
        AcknowledgeMessage, ErrorMessage, HelloMessage, MessageHeader, MessageType,
        MESSAGE_HEADER_LEN,
    },
};

#[derive(Debug)]
pub enum Message {
    Hello(HelloMessage),
    Acknowledge(AcknowledgeMessage),
    Error(ErrorMessage),
    Chunk(MessageChunk),
}

/// Implements a tokio codec that as close as possible, allows incoming data to be transformed into
/// OPC UA message chunks with no intermediate buffers. Chunks are subsequently transformed into
/// messages so there is still some buffers within message chunks, but not at the raw socket level.
pub struct TcpCodec {
    decoding_options: DecodingOptions,
}

impl Decoder for TcpCodec {
    type Item = Message;
    type Error = StatusCode;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < MESSAGE_HEADER_LEN {
            // Every OPC UA message has at least 8 bytes of header to be read to see what follows
            return Ok(None);
        }

        let message_header = {
            let mut buf = io::Cursor::new(&buf[0..MESSAGE_HEADER_LEN]);
            MessageHeader::decode(&mut buf, &self.decoding_options)?
        };
        if message_header.message_type == MessageType::Invalid {
            error!("Message type for chunk is invalid.");
            return Err(StatusCode::BadTcpMessageTypeInvalid);
        }

        let message_size = message_header.message_size as usize;
        if message_size < MESSAGE_HEADER_LEN {
            error!("Message size {} is smaller than a message header", message_size);
            return Err(StatusCode::BadTcpMessageTypeInvalid);
        }
        let max_message_size = self.decoding_options.max_message_size;
        if max_message_size > 0 && message_size > max_message_size {
            error!(
                "Message size {} exceeds the maximum of {}",
                message_size, max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge);
        }

        if buf.len() < message_size {
            // Not enough bytes yet, make room for the rest of the message
            buf.reserve(message_size - buf.len());
            return Ok(None);
        }

        let buf = buf.split_to(message_size);
        let message = Self::decode_message(message_header, &buf, &self.decoding_options)
            .map_err(|e| {
                error!("Codec got an error {} while decoding a message", e);
                e
            })?;
        Ok(Some(message))
    }
}

impl Encoder<Message> for TcpCodec {
    type Error = StatusCode;

    fn encode(&mut self, data: Message, buf: &mut BytesMut) -> Result<(), StatusCode> {
        match data {
            Message::Hello(msg) => self.write(msg, buf),
            Message::Acknowledge(msg) => self.write(msg, buf),
            Message::Error(msg) => self.write(msg, buf),
            Message::Chunk(msg) => self.write(msg, buf),
        }
    }
}

impl TcpCodec {
    pub fn new(decoding_options: DecodingOptions) -> TcpCodec {
        TcpCodec { decoding_options }
    }

    // Writes the encodable thing into the buffer.
    fn write<T>(&self, msg: T, buf: &mut BytesMut) -> Result<(), StatusCode>
    where
        T: BinaryEncoder<T> + std::fmt::Debug,
    {
        buf.reserve(msg.byte_len());
        msg.encode(&mut buf.writer()).map(|_| ()).map_err(|err| {
            error!("Error writing message {:?}, err = {}", msg, err);
            err
        })
    }

    /// Reads a message out of the buffer, which is assumed by now to be the proper length
    fn decode_message(
        message_header: MessageHeader,
        buf: &[u8],
        decoding_options: &DecodingOptions,
    ) -> Result<Message, StatusCode> {
        let mut buf = io::Cursor::new(buf);
        match message_header.message_type {
            MessageType::Acknowledge => Ok(Message::Acknowledge(AcknowledgeMessage::decode(
                &mut buf,
                decoding_options,
            )?)),
            MessageType::Hello => Ok(Message::Hello(HelloMessage::decode(
                &mut buf,
                decoding_options,
            )?)),
            MessageType::Error => Ok(Message::Error(ErrorMessage::decode(
                &mut buf,
                decoding_options,
            )?)),
            MessageType::Chunk => Ok(Message::Chunk(MessageChunk::decode(
                &mut buf,
                decoding_options,
            )?)),
            MessageType::Invalid => Err(StatusCode::BadTcpMessageTypeInvalid),
        }
    }
}
