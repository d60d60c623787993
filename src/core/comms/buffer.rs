// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Outgoing data for one connection. Messages are turned into chunks when they are written to
//! the buffer and the chunks are encoded into bytes one at a time as the socket drains.

use std::collections::VecDeque;

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncWriteExt;

use crate::{
    core::{
        comms::{
            chunker::Chunker,
            message_chunk::MessageChunk,
            security_header::SecurityHeader,
            tcp_types::{AcknowledgeMessage, ErrorMessage},
        },
        handle::Handle,
    },
    types::{
        encoding::BinaryEncoder, status_code::StatusCode, DateTime, ResponseHeader, ServiceFault,
        SupportedMessage,
    },
};

#[derive(Debug)]
enum PendingPayload {
    Chunk(MessageChunk),
    Ack(AcknowledgeMessage),
    Error(ErrorMessage),
}

pub struct SendBuffer {
    /// Bytes of the chunk currently being written to the socket
    buffer: BytesMut,
    /// Queued chunks
    chunks: VecDeque<PendingPayload>,
    /// Sequence numbers of outgoing chunks
    sequence_numbers: Handle,
    /// Maximum size of a message, total. Use 0 for no limit
    pub max_message_size: usize,
    /// Maximum number of chunks in a message. Use 0 for no limit
    pub max_chunk_count: usize,
    /// Maximum size of each individual chunk.
    pub send_buffer_size: usize,
}

// The send buffer works as follows:
//  - `write` turns a message into chunks which are queued.
//  - `encode_next_chunk` moves the next queued chunk into the byte buffer.
//  - `read_into_async` drains the byte buffer into the socket, possibly over several calls.
//  - A new chunk is only encoded once the byte buffer is empty.
impl SendBuffer {
    pub fn new(buffer_size: usize, max_message_size: usize, max_chunk_count: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(buffer_size + 1024),
            chunks: VecDeque::with_capacity(max_chunk_count.max(1)),
            sequence_numbers: Handle::channel_sequence(),
            max_message_size,
            max_chunk_count,
            send_buffer_size: buffer_size,
        }
    }

    pub fn encode_next_chunk(&mut self) -> Result<(), StatusCode> {
        if self.can_read() {
            return Err(StatusCode::BadInvalidState);
        }

        let Some(next_chunk) = self.chunks.pop_front() else {
            return Ok(());
        };

        trace!("Sending chunk {:?}", next_chunk);
        let mut writer = (&mut self.buffer).writer();
        match next_chunk {
            PendingPayload::Chunk(c) => c.encode(&mut writer)?,
            PendingPayload::Ack(a) => a.encode(&mut writer)?,
            PendingPayload::Error(e) => e.encode(&mut writer)?,
        };
        Ok(())
    }

    pub fn write_ack(&mut self, ack: AcknowledgeMessage) {
        self.chunks.push_back(PendingPayload::Ack(ack));
    }

    pub fn write_error(&mut self, error: ErrorMessage) {
        self.chunks.push_back(PendingPayload::Error(error));
    }

    /// Queues a message for sending. A response too large for the negotiated limits is
    /// replaced by a `ServiceFault` with `BadResponseTooLarge` for the same request.
    pub fn write(
        &mut self,
        request_id: u32,
        message: SupportedMessage,
        secure_channel_id: u32,
        security_header: &SecurityHeader,
    ) -> Result<u32, StatusCode> {
        trace!("Writing message to buffer");

        let chunks = match self.encode(request_id, &message, secure_channel_id, security_header) {
            Err(StatusCode::BadResponseTooLarge) => {
                warn!(
                    "Response to request {} is too large to send, replacing it with a fault",
                    message.request_handle()
                );
                let fault = ServiceFault {
                    response_header: ResponseHeader::with_timestamp(
                        DateTime::now(),
                        message.request_handle(),
                        StatusCode::BadResponseTooLarge,
                    ),
                };
                self.encode(request_id, &fault.into(), secure_channel_id, security_header)?
            }
            result => result?,
        };

        self.chunks
            .extend(chunks.into_iter().map(PendingPayload::Chunk));
        Ok(request_id)
    }

    fn encode(
        &mut self,
        request_id: u32,
        message: &SupportedMessage,
        secure_channel_id: u32,
        security_header: &SecurityHeader,
    ) -> Result<Vec<MessageChunk>, StatusCode> {
        Chunker::encode(
            &mut self.sequence_numbers,
            request_id,
            self.max_message_size,
            self.send_buffer_size,
            self.max_chunk_count,
            secure_channel_id,
            security_header,
            message,
        )
    }

    /// Writes as much of the current chunk as the socket accepts. `write_buf` only advances
    /// the buffer by what was written, so this is cancellation safe.
    pub async fn read_into_async(
        &mut self,
        write: &mut (impl tokio::io::AsyncWrite + Unpin),
    ) -> Result<(), tokio::io::Error> {
        let written = write.write_buf(&mut self.buffer).await?;
        if written == 0 && !self.buffer.is_empty() {
            return Err(tokio::io::ErrorKind::WriteZero.into());
        }
        Ok(())
    }

    pub fn should_encode_chunks(&self) -> bool {
        !self.chunks.is_empty() && !self.can_read()
    }

    pub fn can_read(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// True once every queued payload has been handed to the socket
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.buffer.is_empty()
    }

    /// Applies the limits agreed in the hello / acknowledge exchange. Limits only ever shrink.
    pub fn revise(
        &mut self,
        send_buffer_size: usize,
        max_message_size: usize,
        max_chunk_count: usize,
    ) {
        if self.send_buffer_size > send_buffer_size && send_buffer_size > 0 {
            self.send_buffer_size = send_buffer_size;
        }
        if max_message_size > 0 && (self.max_message_size == 0 || self.max_message_size > max_message_size) {
            self.max_message_size = max_message_size;
        }
        if max_chunk_count > 0 && (self.max_chunk_count == 0 || self.max_chunk_count > max_chunk_count) {
            self.max_chunk_count = max_chunk_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{PendingPayload, SendBuffer};

    use crate::core::comms::{
        chunker::Chunker,
        message_chunk::MessageChunk,
        security_header::{SecurityHeader, SymmetricSecurityHeader},
    };
    use crate::types::{
        DataValue, DateTime, DecodingOptions, NodeId, ReadRequest, ReadResponse, ReadValueId,
        RequestHeader, ResponseHeader, StatusCode, SupportedMessage, TimestampsToReturn,
    };

    fn security_header() -> SecurityHeader {
        SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id: 1 })
    }

    fn read_request(count: u32) -> SupportedMessage {
        ReadRequest {
            request_header: RequestHeader::new(&NodeId::null(), &DateTime::null(), 101),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(
                (0..count)
                    .map(|r| ReadValueId::from(NodeId::new(1, r)))
                    .collect(),
            ),
        }
        .into()
    }

    fn queued_chunks(buffer: &SendBuffer) -> Vec<MessageChunk> {
        buffer
            .chunks
            .iter()
            .filter_map(|p| match p {
                PendingPayload::Chunk(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn buffer_simple() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        let request_id = buffer
            .write(1, read_request(1), 5, &security_header())
            .unwrap();
        assert_eq!(request_id, 1);

        assert!(buffer.should_encode_chunks());
        assert_eq!(buffer.chunks.len(), 1);
        buffer.encode_next_chunk().unwrap();
        assert!(buffer.can_read());
        assert!(!buffer.is_empty());

        let mut cursor = Cursor::new(Vec::new());
        buffer.read_into_async(&mut cursor).await.unwrap();
        assert!(cursor.get_ref().len() > 50);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn buffer_chunking() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        buffer
            .write(1, read_request(1000), 5, &security_header())
            .unwrap();
        assert_eq!(buffer.chunks.len(), 3);

        let mut cursor = Cursor::new(Vec::new());
        for _ in 0..3 {
            assert!(buffer.should_encode_chunks());
            buffer.encode_next_chunk().unwrap();
            assert!(!buffer.should_encode_chunks());
            assert!(buffer.can_read());
            buffer.read_into_async(&mut cursor).await.unwrap();
        }
        assert!(!buffer.should_encode_chunks());
        assert!(!buffer.can_read());
        assert!(cursor.get_ref().len() > 8196 * 2 && cursor.get_ref().len() < 8196 * 3);
    }

    #[test]
    fn chunks_carry_consecutive_sequence_numbers() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        buffer
            .write(1, read_request(1000), 5, &security_header())
            .unwrap();
        buffer.write(2, read_request(1), 5, &security_header()).unwrap();
        let decoding_options = DecodingOptions::test();
        let sequence_numbers = queued_chunks(&buffer)
            .iter()
            .map(|c| c.chunk_info(&decoding_options).unwrap().sequence_header.sequence_number)
            .collect::<Vec<_>>();
        assert_eq!(sequence_numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn buffer_too_large_request() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        let err = buffer
            .write(1, read_request(10000), 5, &security_header())
            .unwrap_err();
        assert_eq!(err, StatusCode::BadRequestTooLarge);
        assert!(buffer.is_empty());
    }

    #[test]
    fn buffer_too_many_chunks() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        let err = buffer
            .write(1, read_request(4000), 5, &security_header())
            .unwrap_err();
        assert_eq!(err, StatusCode::BadRequestTooLarge);
    }

    #[test]
    fn too_large_response_becomes_fault() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        let response = ReadResponse {
            response_header: ResponseHeader::with_timestamp(
                DateTime::now(),
                7,
                StatusCode::Good,
            ),
            results: Some((0..20000).map(|i| DataValue::from(i as i32)).collect()),
            diagnostic_infos: None,
        };
        buffer
            .write(3, response.into(), 5, &security_header())
            .unwrap();

        let chunks = queued_chunks(&buffer);
        assert_eq!(chunks.len(), 1);
        let message = Chunker::decode(&chunks, &DecodingOptions::test()).unwrap();
        let SupportedMessage::ServiceFault(fault) = message else {
            panic!("Expected a service fault, got {:?}", message);
        };
        assert_eq!(fault.response_header.request_handle, 7);
        assert_eq!(
            fault.response_header.service_result,
            StatusCode::BadResponseTooLarge
        );
    }

    #[tokio::test]
    async fn buffer_read_partial() {
        let mut buffer = SendBuffer::new(8196, 81960, 5);
        buffer
            .write(1, read_request(1000), 5, &security_header())
            .unwrap();
        assert_eq!(buffer.chunks.len(), 3);

        // A fixed size buffer exactly half the chunk size simulates a TCP connection
        // accepting data in smaller pieces than the chunk size.
        let mut buf = [0u8; 4098];
        let mut cursor = Cursor::new(&mut buf as &mut [u8]);

        for _ in 0..2 {
            assert!(buffer.should_encode_chunks());
            buffer.encode_next_chunk().unwrap();
            assert!(!buffer.should_encode_chunks());
            assert!(buffer.can_read());

            buffer.read_into_async(&mut cursor).await.unwrap();
            assert!(buffer.can_read());
            assert_eq!(cursor.position(), 4098);
            cursor.set_position(0);
            buffer.read_into_async(&mut cursor).await.unwrap();
            assert!(!buffer.can_read());
            assert_eq!(cursor.position(), 4098);
            cursor.set_position(0);
        }
        assert!(buffer.should_encode_chunks());
        buffer.encode_next_chunk().unwrap();
        assert!(buffer.can_read());
        buffer.read_into_async(&mut cursor).await.unwrap();
        assert!(cursor.position() < 4098);

        assert!(!buffer.should_encode_chunks());
        assert!(!buffer.can_read());
    }

    #[test]
    fn revise_only_shrinks() {
        let mut buffer = SendBuffer::new(65535, 0, 0);
        buffer.revise(8192, 100000, 10);
        assert_eq!(buffer.send_buffer_size, 8192);
        assert_eq!(buffer.max_message_size, 100000);
        assert_eq!(buffer.max_chunk_count, 10);
        buffer.revise(16384, 0, 20);
        assert_eq!(buffer.send_buffer_size, 8192);
        assert_eq!(buffer.max_message_size, 100000);
        assert_eq!(buffer.max_chunk_count, 10);
    }
}
