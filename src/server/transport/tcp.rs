// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::{
    io::{ReadHalf, WriteHalf},
    net::TcpStream,
};
use tokio_util::codec::FramedRead;

use crate::{
    core::{
        comms::{
            buffer::SendBuffer,
            chunker::Chunker,
            message_chunk::{ChunkInfo, MessageChunk, MessageIsFinalType},
            security_header::SecurityHeader,
            tcp_codec::{Message, TcpCodec},
            tcp_types::{AcknowledgeMessage, ErrorMessage, HelloMessage},
        },
        handle::Handle,
    },
    types::{encoding::DecodingOptions, RequestHeader, StatusCode, SupportedMessage},
};

pub(crate) struct TcpTransport {
    read: FramedRead<ReadHalf<TcpStream>, TcpCodec>,
    write: WriteHalf<TcpStream>,
    send_buffer: SendBuffer,
    state: TransportState,
    pending_chunks: Vec<MessageChunk>,
    /// Total size in bytes of `pending_chunks`
    pending_size: usize,
    /// Client protocol version set during HELLO
    pub(crate) client_protocol_version: u32,
    /// Sequence number of the last chunk received, `None` until the first one
    last_received_sequence_number: Option<u32>,
    sequence_numbers: Handle,
    config: TransportConfig,
    decoding_options: DecodingOptions,
}

enum TransportState {
    WaitingForHello(Instant),
    Running,
    Closing,
}

#[derive(Debug, Clone)]
pub(crate) struct TransportConfig {
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub max_message_size: usize,
    pub max_chunk_count: usize,
    pub hello_timeout: Duration,
    /// The urls a hello may ask for
    pub endpoint_urls: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct Request {
    pub message: SupportedMessage,
    pub chunk_info: ChunkInfo,
    pub request_id: u32,
}

impl Request {
    pub fn secure_channel_id(&self) -> u32 {
        self.chunk_info.message_header.secure_channel_id
    }

    /// The token id of a symmetric security header, `None` for OpenSecureChannel
    pub fn token_id(&self) -> Option<u32> {
        self.chunk_info.security_header.token_id()
    }
}

#[derive(Debug)]
pub(crate) enum TransportPollResult {
    OutgoingMessageSent,
    IncomingChunk,
    IncomingMessage(Request),
    /// A request whose body could not be decoded but whose header could, so it can be
    /// answered with a fault.
    UndecodableMessage {
        request_id: u32,
        request_header: RequestHeader,
        status: StatusCode,
    },
    IncomingHello,
    Error(StatusCode),
    Closed,
}

impl TcpTransport {
    pub fn new(stream: TcpStream, config: TransportConfig, decoding_options: DecodingOptions) -> Self {
        let (read, write) = tokio::io::split(stream);
        let read = FramedRead::new(read, TcpCodec::new(decoding_options.clone()));

        Self {
            read,
            write,
            send_buffer: SendBuffer::new(
                config.send_buffer_size,
                config.max_message_size,
                config.max_chunk_count,
            ),
            state: TransportState::WaitingForHello(Instant::now() + config.hello_timeout),
            pending_chunks: Vec::new(),
            pending_size: 0,
            client_protocol_version: 0,
            last_received_sequence_number: None,
            sequence_numbers: Handle::channel_sequence(),
            config,
            decoding_options,
        }
    }

    /// Set the transport state to closing, once the final message is sent
    /// the connection will be closed.
    pub fn set_closing(&mut self) {
        self.state = TransportState::Closing;
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.state, TransportState::Closing)
    }

    pub fn enqueue_error(&mut self, message: ErrorMessage) {
        self.send_buffer.write_error(message);
    }

    pub fn enqueue_message_for_send(
        &mut self,
        message: SupportedMessage,
        request_id: u32,
        secure_channel_id: u32,
        security_header: &SecurityHeader,
    ) -> Result<(), StatusCode> {
        self.send_buffer
            .write(request_id, message, secure_channel_id, security_header)?;
        Ok(())
    }

    fn process_hello(&mut self, hello: HelloMessage) -> Result<(), StatusCode> {
        hello.validate(&self.config.endpoint_urls)?;
        self.client_protocol_version = hello.protocol_version;

        let acknowledge = AcknowledgeMessage::revised(
            &hello,
            self.config.receive_buffer_size,
            self.config.send_buffer_size,
            self.config.max_message_size,
            self.config.max_chunk_count,
        );
        debug!("Sending acknowledge {:?}", acknowledge);
        self.send_buffer.revise(
            acknowledge.send_buffer_size as usize,
            acknowledge.max_message_size as usize,
            acknowledge.max_chunk_count as usize,
        );
        self.send_buffer.write_ack(acknowledge);

        self.state = TransportState::Running;
        Ok(())
    }

    /// Makes progress on the connection: waits for the hello, writes queued chunks and reads
    /// incoming ones. Cancellation safe, so it can be raced against other futures.
    pub async fn poll(&mut self) -> TransportPollResult {
        // Nothing is sent until the hello arrives
        if let TransportState::WaitingForHello(deadline) = &self.state {
            return tokio::select! {
                _ = tokio::time::sleep_until((*deadline).into()) => {
                    warn!("Hello was not received in time");
                    TransportPollResult::Error(StatusCode::BadTimeout)
                }
                r = self.wait_for_hello() => {
                    match r.and_then(|h| self.process_hello(h)) {
                        Ok(()) => TransportPollResult::IncomingHello,
                        Err(e) => TransportPollResult::Error(e),
                    }
                }
            };
        }

        // Outgoing chunks are encoded one at a time, the next only once the previous one
        // has been written out.
        if self.send_buffer.should_encode_chunks() {
            if let Err(e) = self.send_buffer.encode_next_chunk() {
                return TransportPollResult::Error(e);
            }
        }

        if self.send_buffer.can_read() {
            tokio::select! {
                r = self.send_buffer.read_into_async(&mut self.write) => {
                    if let Err(e) = r {
                        error!("Write to socket failed: {}", e);
                        return TransportPollResult::Closed;
                    }
                    TransportPollResult::OutgoingMessageSent
                }
                incoming = self.read.next(), if !self.is_closing() => {
                    self.handle_incoming_message(incoming)
                }
            }
        } else {
            if self.is_closing() {
                return TransportPollResult::Closed;
            }
            let incoming = self.read.next().await;
            self.handle_incoming_message(incoming)
        }
    }

    async fn wait_for_hello(&mut self) -> Result<HelloMessage, StatusCode> {
        match self.read.next().await {
            Some(Ok(Message::Hello(hello))) => Ok(hello),
            Some(Ok(bad_msg)) => {
                error!("Expected a hello message, got {:?} instead", bad_msg);
                Err(StatusCode::BadCommunicationError)
            }
            Some(Err(err)) => {
                error!("Communication error while waiting for hello message: {}", err);
                Err(err)
            }
            None => Err(StatusCode::BadConnectionClosed),
        }
    }

    fn handle_incoming_message(
        &mut self,
        incoming: Option<Result<Message, StatusCode>>,
    ) -> TransportPollResult {
        let Some(incoming) = incoming else {
            return TransportPollResult::Closed;
        };
        match incoming {
            Ok(message) => match self.process_message(message) {
                Ok(None) => TransportPollResult::IncomingChunk,
                Ok(Some(result)) => {
                    self.clear_pending();
                    result
                }
                Err(e) => {
                    self.clear_pending();
                    TransportPollResult::Error(e)
                }
            },
            Err(StatusCode::BadConnectionClosed) => TransportPollResult::Closed,
            Err(err) => {
                error!("Error reading from stream {}", err);
                TransportPollResult::Error(err)
            }
        }
    }

    fn clear_pending(&mut self) {
        self.pending_chunks.clear();
        self.pending_size = 0;
    }

    fn process_message(&mut self, message: Message) -> Result<Option<TransportPollResult>, StatusCode> {
        let chunk = match message {
            Message::Chunk(chunk) => chunk,
            unexpected => {
                error!("Received unexpected message: {:?}", unexpected);
                return Err(StatusCode::BadUnexpectedError);
            }
        };

        let header = chunk.message_header(&self.decoding_options)?;
        let max_chunk_count = self.config.max_chunk_count;
        if max_chunk_count > 0 && self.pending_chunks.len() >= max_chunk_count {
            error!("Message has more than {} chunks", max_chunk_count);
            return Err(StatusCode::BadEncodingLimitsExceeded);
        }
        let max_message_size = self.config.max_message_size;
        if max_message_size > 0 && self.pending_size + chunk.data.len() > max_message_size {
            error!(
                "Message of {} bytes or more exceeds the limit of {}",
                self.pending_size + chunk.data.len(),
                max_message_size
            );
            return Err(StatusCode::BadTcpMessageTooLarge);
        }
        self.pending_size += chunk.data.len();
        self.pending_chunks.push(chunk);

        if header.is_final == MessageIsFinalType::Intermediate {
            return Ok(None);
        }

        let expected_sequence_number = self
            .last_received_sequence_number
            .map(|n| self.sequence_numbers.successor(n));
        self.last_received_sequence_number = Some(Chunker::validate_chunks(
            expected_sequence_number,
            &self.pending_chunks,
            &self.decoding_options,
        )?);

        if header.is_final == MessageIsFinalType::FinalError {
            debug!(
                "Client aborted a message, discarding {} chunks",
                self.pending_chunks.len()
            );
            self.clear_pending();
            return Ok(None);
        }

        let chunk_info = self.pending_chunks[0].chunk_info(&self.decoding_options)?;
        let request_id = chunk_info.sequence_header.request_id;
        match Chunker::decode(&self.pending_chunks, &self.decoding_options) {
            Ok(message) => Ok(Some(TransportPollResult::IncomingMessage(Request {
                message,
                chunk_info,
                request_id,
            }))),
            Err(status) => {
                match Chunker::decode_request_header(&self.pending_chunks, &self.decoding_options) {
                    Some(request_header) => Ok(Some(TransportPollResult::UndecodableMessage {
                        request_id,
                        request_header,
                        status,
                    })),
                    None => Err(status),
                }
            }
        }
    }
}
