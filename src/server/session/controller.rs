// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{sync::Arc, time::Instant};

use futures::{future::BoxFuture, future::Either, stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::{
    core::comms::{
        message_chunk::MessageChunkType, security_header::SecurityHeader, tcp_types::ErrorMessage,
    },
    server::{
        info::ServerInfo,
        secure_channel::{SecureChannel, SecureChannelManager},
        transport::{Request, TcpTransport, TransportConfig, TransportPollResult},
    },
    sync::RwLock,
    types::{
        service_types::{
            FindServersRequest, FindServersResponse, GetEndpointsRequest, GetEndpointsResponse,
            OpenSecureChannelRequest, OpenSecureChannelResponse, SecurityTokenRequestType,
            ServiceFault,
        },
        RequestHeader, ResponseHeader, StatusCode, SupportedMessage,
    },
};

use super::{
    manager::SessionManager,
    message_handler::{HandleMessageResult, MessageHandler, RequestData},
};

/// A response waiting to be sent on the connection
pub(crate) struct Response {
    pub message: SupportedMessage,
    pub request_id: u32,
}

impl Response {
    pub fn from_result(
        result: Result<impl Into<SupportedMessage>, StatusCode>,
        request_handle: u32,
        request_id: u32,
    ) -> Self {
        match result {
            Ok(r) => Self {
                message: r.into(),
                request_id,
            },
            Err(e) => Self {
                message: ServiceFault::for_request_handle(request_handle, e).into(),
                request_id,
            },
        }
    }
}

enum RequestProcessResult {
    Ok,
    /// Close the connection after sending what is queued
    Close,
    /// Send an ERR message and close the connection
    Error(StatusCode),
}

/// Serves one connection: its transport, its secure channel and the requests of the
/// sessions bound to it.
pub(crate) struct SessionController {
    channel: Arc<RwLock<SecureChannel>>,
    channels: Arc<SecureChannelManager>,
    transport: TcpTransport,
    session_manager: Arc<RwLock<SessionManager>>,
    message_handler: MessageHandler,
    pending_messages: FuturesUnordered<BoxFuture<'static, Response>>,
    info: Arc<ServerInfo>,
    /// The channel must be opened by then
    open_deadline: Instant,
    shutdown: CancellationToken,
}

impl SessionController {
    pub fn new(
        socket: TcpStream,
        channels: Arc<SecureChannelManager>,
        session_manager: Arc<RwLock<SessionManager>>,
        message_handler: MessageHandler,
        info: Arc<ServerInfo>,
        shutdown: CancellationToken,
    ) -> Self {
        let config = &info.config;
        let transport_config = TransportConfig {
            send_buffer_size: config.limits.send_buffer_size,
            receive_buffer_size: config.limits.receive_buffer_size,
            max_message_size: config.limits.max_message_size,
            max_chunk_count: config.limits.max_chunk_count,
            hello_timeout: std::time::Duration::from_secs(config.tcp_config.hello_timeout as u64),
            endpoint_urls: info.endpoint_urls(),
        };
        let open_deadline = Instant::now() + transport_config.hello_timeout * 2;
        let transport = TcpTransport::new(socket, transport_config, info.decoding_options());
        let channel = channels.create_channel();

        Self {
            channel,
            channels,
            transport,
            session_manager,
            message_handler,
            pending_messages: FuturesUnordered::new(),
            info,
            open_deadline,
            shutdown,
        }
    }

    /// When the connection must be dropped unless something happens: the channel is not open in
    /// time, or its token expired without being renewed.
    fn deadline(&self) -> Instant {
        let channel = trace_read_lock!(self.channel);
        if channel.is_open() {
            channel.token_expiry().unwrap_or(self.open_deadline)
        } else {
            self.open_deadline
        }
    }

    pub async fn run(mut self) {
        let secure_channel_id = trace_read_lock!(self.channel).secure_channel_id();
        debug!("Connection task for secure channel {} started", secure_channel_id);

        loop {
            let deadline = tokio::time::Instant::from_std(self.deadline());
            let closing = self.transport.is_closing();
            let resp_fut = if self.pending_messages.is_empty() {
                Either::Left(futures::future::pending::<Option<Response>>())
            } else {
                Either::Right(self.pending_messages.next())
            };

            tokio::select! {
                _ = tokio::time::sleep_until(deadline), if !closing => {
                    let status = if trace_read_lock!(self.channel).is_open() {
                        warn!("Secure channel {} token expired, closing connection", secure_channel_id);
                        StatusCode::BadSecureChannelTokenUnknown
                    } else {
                        warn!("Secure channel {} was not opened in time, closing connection", secure_channel_id);
                        StatusCode::BadTimeout
                    };
                    self.fatal_error(status);
                }
                _ = self.shutdown.cancelled(), if !closing => {
                    info!("Server is shutting down, closing connection of secure channel {}", secure_channel_id);
                    self.fatal_error(StatusCode::BadServerHalted);
                }
                msg = resp_fut => {
                    if let Some(msg) = msg {
                        if let Err(e) = self.send(msg.message, msg.request_id) {
                            error!("Failed to send response: {}", e);
                            self.fatal_error(e);
                        }
                    }
                }
                res = self.transport.poll() => {
                    trace!("Transport poll result: {:?}", res);
                    match res {
                        TransportPollResult::IncomingMessage(req) => {
                            match self.process_request(req) {
                                RequestProcessResult::Ok => {}
                                RequestProcessResult::Close => self.transport.set_closing(),
                                RequestProcessResult::Error(status) => self.fatal_error(status),
                            }
                        }
                        TransportPollResult::UndecodableMessage { request_id, request_header, status } => {
                            warn!("Request {} could not be decoded: {}", request_id, status);
                            if let Err(e) = self.send(ServiceFault::new(&request_header, status).into(), request_id) {
                                self.fatal_error(e);
                            }
                        }
                        TransportPollResult::Error(status) => self.fatal_error(status),
                        TransportPollResult::Closed => break,
                        _ => (),
                    }
                }
            }
        }

        // Publish requests waiting here can no longer be answered
        trace_read_lock!(self.session_manager).detach_channel(secure_channel_id);
        trace_write_lock!(self.channel).close();
        self.channels.remove(secure_channel_id);
        info!("Connection of secure channel {} closed", secure_channel_id);
    }

    fn fatal_error(&mut self, status: StatusCode) {
        if !self.transport.is_closing() {
            error!("Closing connection with error {}", status);
            self.transport.enqueue_error(ErrorMessage::from_status_code(status));
            self.transport.set_closing();
        }
    }

    fn send(&mut self, message: SupportedMessage, request_id: u32) -> Result<(), StatusCode> {
        let (secure_channel_id, security_header) = {
            let channel = trace_read_lock!(self.channel);
            let message_type = if matches!(message, SupportedMessage::OpenSecureChannelResponse(_)) {
                MessageChunkType::OpenSecureChannel
            } else {
                MessageChunkType::Message
            };
            (
                channel.secure_channel_id(),
                channel.make_security_header(message_type),
            )
        };
        self.transport
            .enqueue_message_for_send(message, request_id, secure_channel_id, &security_header)
    }

    fn send_response(&mut self, response: Response) -> RequestProcessResult {
        match self.send(response.message, response.request_id) {
            Ok(()) => RequestProcessResult::Ok,
            Err(e) => {
                error!("Failed to send request response: {}", e);
                RequestProcessResult::Error(e)
            }
        }
    }

    fn process_request(&mut self, request: Request) -> RequestProcessResult {
        let now = Instant::now();
        let request_id = request.request_id;

        if let SupportedMessage::OpenSecureChannelRequest(r) = &request.message {
            return self.open_secure_channel(&request, r, now);
        }

        // Everything else must arrive on the open channel with a live token
        let Some(token_id) = request.token_id() else {
            error!("Message is not protected by a symmetric security header");
            return RequestProcessResult::Error(StatusCode::BadSecurityChecksFailed);
        };
        if let Err(e) =
            trace_write_lock!(self.channel).validate_message(request.secure_channel_id(), token_id, now)
        {
            return RequestProcessResult::Error(e);
        }
        let secure_channel_id = request.secure_channel_id();

        match request.message {
            SupportedMessage::CloseSecureChannelRequest(_) => {
                info!("Client closed secure channel {}", secure_channel_id);
                RequestProcessResult::Close
            }

            SupportedMessage::CreateSessionRequest(request) => {
                let result = {
                    let channel = trace_read_lock!(self.channel);
                    trace_write_lock!(self.session_manager).create_session(&channel, &request, now)
                };
                self.send_response(Response::from_result(
                    result,
                    request.request_header.request_handle,
                    request_id,
                ))
            }

            SupportedMessage::ActivateSessionRequest(request) => {
                let result = {
                    let channel = trace_read_lock!(self.channel);
                    trace_read_lock!(self.session_manager).activate_session(&channel, &request, now)
                };
                self.send_response(Response::from_result(
                    result,
                    request.request_header.request_handle,
                    request_id,
                ))
            }

            SupportedMessage::CloseSessionRequest(request) => {
                let result = trace_write_lock!(self.session_manager)
                    .close_session(secure_channel_id, &request);
                self.send_response(Response::from_result(
                    result,
                    request.request_header.request_handle,
                    request_id,
                ))
            }

            SupportedMessage::GetEndpointsRequest(request) => {
                let response = self.get_endpoints(&request);
                self.send_response(Response {
                    message: response.into(),
                    request_id,
                })
            }

            SupportedMessage::FindServersRequest(request) => {
                let response = self.find_servers(&request);
                self.send_response(Response {
                    message: response.into(),
                    request_id,
                })
            }

            message => {
                let request_handle = message.request_handle();
                let data = match message.request_header() {
                    Some(header) => self.validate_request(header, secure_channel_id, request_id, now),
                    None => {
                        error!("Received a message that is not a request {:?}", message);
                        Err(StatusCode::BadServiceUnsupported)
                    }
                };
                let data = match data {
                    Ok(data) => data,
                    Err(e) => {
                        return self.send_response(Response {
                            message: ServiceFault::for_request_handle(request_handle, e).into(),
                            request_id,
                        })
                    }
                };

                match self.message_handler.handle_message(message, data) {
                    HandleMessageResult::SyncMessage(response) => self.send_response(response),
                    HandleMessageResult::PublishResponse(pending) => {
                        self.pending_messages.push(pending.recv().boxed());
                        RequestProcessResult::Ok
                    }
                }
            }
        }
    }

    /// Checks that the request belongs to an activated session bound to this channel that has
    /// not timed out.
    fn validate_request(
        &self,
        header: &RequestHeader,
        secure_channel_id: u32,
        request_id: u32,
        now: Instant,
    ) -> Result<RequestData, StatusCode> {
        let session = trace_read_lock!(self.session_manager)
            .find_by_token(&header.authentication_token)
            .ok_or(StatusCode::BadSessionIdInvalid)?;

        let (token, session_id) = {
            let session = trace_read_lock!(session);
            let token = session.validate_activated()?.clone();
            session.validate_secure_channel_id(secure_channel_id)?;
            session.validate_timed_out(now)?;
            (token, session.session_id_numeric())
        };

        Ok(RequestData {
            request_id,
            request_handle: header.request_handle,
            session,
            token,
            session_id,
        })
    }

    fn open_secure_channel(
        &mut self,
        request: &Request,
        open_request: &OpenSecureChannelRequest,
        now: Instant,
    ) -> RequestProcessResult {
        let SecurityHeader::Asymmetric(security_header) = &request.chunk_info.security_header else {
            error!("Secure channel request message does not have asymmetric security header");
            return RequestProcessResult::Error(StatusCode::BadSecurityChecksFailed);
        };

        let result = {
            let mut channel = trace_write_lock!(self.channel);
            if open_request.request_type == SecurityTokenRequestType::Renew
                && request.secure_channel_id() != channel.secure_channel_id()
            {
                error!(
                    "Renew request for secure channel {} arrived on secure channel {}",
                    request.secure_channel_id(),
                    channel.secure_channel_id()
                );
                return RequestProcessResult::Error(StatusCode::BadSecureChannelIdInvalid);
            }
            channel
                .process_open_request(
                    open_request,
                    security_header,
                    self.transport.client_protocol_version,
                    &self.info.config.secure_channel,
                    now,
                )
                .map(|security_token| OpenSecureChannelResponse {
                    response_header: ResponseHeader::new_good(&open_request.request_header),
                    server_protocol_version: 0,
                    security_token,
                    server_nonce: channel.server_nonce(),
                })
        };

        match result {
            Ok(response) => self.send_response(Response {
                message: response.into(),
                request_id: request.request_id,
            }),
            Err(e) => {
                let _ = self.send(
                    ServiceFault::new(&open_request.request_header, e).into(),
                    request.request_id,
                );
                RequestProcessResult::Close
            }
        }
    }

    fn get_endpoints(&self, request: &GetEndpointsRequest) -> GetEndpointsResponse {
        // Locale ids are ignored, endpoint descriptions are not localized
        let endpoints = self
            .info
            .endpoints(&request.endpoint_url, &request.profile_uris);
        GetEndpointsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            endpoints,
        }
    }

    fn find_servers(&self, request: &FindServersRequest) -> FindServersResponse {
        let mut servers = vec![self.info.application_description()];

        // Filter servers that do not have a matching application uri
        if let Some(ref server_uris) = request.server_uris {
            if !server_uris.is_empty() {
                servers.retain(|server| server_uris.iter().any(|uri| *uri == server.application_uri));
            }
        }

        FindServersResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            servers: Some(servers),
        }
    }
}
