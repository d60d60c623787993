//! Tests that drive a running server over TCP

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, task::JoinHandle};
use tokio_util::codec::Framed;

use crate::{
    core::{
        comms::{
            chunker::Chunker,
            message_chunk::{MessageChunk, MessageChunkType, MessageIsFinalType},
            security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
            tcp_codec::{Message, TcpCodec},
            tcp_types::HelloMessage,
        },
        handle::Handle,
    },
    server::{ServerConfig, ServerCore, ServerHandle},
    supported_message_as,
    types::{
        service_types::{
            ActivateSessionRequest, CloseSecureChannelRequest, CloseSessionRequest,
            CreateSessionRequest, GetEndpointsRequest, MessageSecurityMode,
            OpenSecureChannelRequest, ReadRequest, ReadValueId, SecurityTokenRequestType,
            SignatureData, TimestampsToReturn,
        },
        ByteString, DateTime, DecodingOptions, ExtensionObject, NodeId, RequestHeader,
        StatusCode, SupportedMessage, UAString, Variant,
    },
};

use super::tags::TagUpdate;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

const MANIFEST: &str = r#"{
    "name": "Plant",
    "tags": [
        {
            "name": "Line1",
            "tagType": "Folder",
            "tags": [
                { "name": "Temperature", "tagType": "AtomicTag", "dataType": "Float8", "value": 20.0 },
                { "name": "Count", "tagType": "AtomicTag", "dataType": "Int4", "value": 7 }
            ]
        }
    ]
}"#;

struct TestServer {
    handle: ServerHandle,
    port: u16,
    task: JoinHandle<Result<(), String>>,
    _dir: tempdir::TempDir,
}

impl TestServer {
    async fn start<F>(configure: F) -> TestServer
    where
        F: FnOnce(&mut ServerConfig),
    {
        let dir = tempdir::TempDir::new("vbl-opcua-server").unwrap();
        let manifest = dir.path().join("tags.json");
        std::fs::write(&manifest, MANIFEST).unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut config = ServerConfig::factory();
        config.tcp_config.host = "127.0.0.1".to_string();
        config.tcp_config.port = port;
        config.tag_manifest = Some(manifest);
        configure(&mut config);

        let (core, handle) = ServerCore::new(config).unwrap();
        let listener = tokio::net::TcpListener::from_std(listener).unwrap();
        let task = tokio::spawn(core.run_with_listener(listener));
        TestServer {
            handle,
            port,
            task,
            _dir: dir,
        }
    }

    fn endpoint_url(&self) -> String {
        format!("opc.tcp://localhost:{}/vblfactory", self.port)
    }

    async fn stop(self) {
        self.handle.cancel();
        let result = tokio::time::timeout(RECV_TIMEOUT, self.task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}

/// A bare client speaking the binary protocol without security
struct TestClient {
    framed: Framed<TcpStream, TcpCodec>,
    sequence_numbers: Handle,
    next_request_id: u32,
    secure_channel_id: u32,
    token_id: u32,
    authentication_token: NodeId,
}

impl TestClient {
    async fn connect(port: u16) -> TestClient {
        let stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        TestClient {
            framed: Framed::new(stream, TcpCodec::new(DecodingOptions::test())),
            sequence_numbers: Handle::channel_sequence(),
            next_request_id: 1,
            secure_channel_id: 0,
            token_id: 0,
            authentication_token: NodeId::null(),
        }
    }

    async fn next(&mut self) -> Message {
        tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
    }

    async fn hello(&mut self, endpoint_url: &str) -> Message {
        let hello = HelloMessage::new(endpoint_url, 65535, 65535, 0, 0);
        self.framed.send(Message::Hello(hello)).await.unwrap();
        self.next().await
    }

    async fn send(&mut self, message: SupportedMessage, security_header: SecurityHeader) {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let chunks = Chunker::encode(
            &mut self.sequence_numbers,
            request_id,
            0,
            0,
            0,
            self.secure_channel_id,
            &security_header,
            &message,
        )
        .unwrap();
        for chunk in chunks {
            self.framed.send(Message::Chunk(chunk)).await.unwrap();
        }
    }

    /// Sends a single hand built MSG chunk as part of request `request_id`
    async fn send_chunk(&mut self, request_id: u32, is_final: MessageIsFinalType, data: &[u8]) {
        let chunk = MessageChunk::new(
            self.sequence_numbers.next(),
            request_id,
            MessageChunkType::Message,
            is_final,
            self.secure_channel_id,
            &SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            }),
            data,
        )
        .unwrap();
        self.framed.send(Message::Chunk(chunk)).await.unwrap();
    }

    /// Reads the next response, panicking on anything but a message
    async fn response(&mut self) -> SupportedMessage {
        let mut chunks: Vec<MessageChunk> = Vec::new();
        loop {
            match self.next().await {
                Message::Chunk(chunk) => {
                    let is_final = chunk
                        .chunk_info(&DecodingOptions::test())
                        .unwrap()
                        .message_header
                        .is_final;
                    chunks.push(chunk);
                    if is_final == MessageIsFinalType::Final {
                        return Chunker::decode(&chunks, &DecodingOptions::test()).unwrap();
                    }
                }
                other => panic!("Expected a message chunk, got {:?}", other),
            }
        }
    }

    async fn request(&mut self, message: SupportedMessage) -> SupportedMessage {
        let header = SecurityHeader::Symmetric(SymmetricSecurityHeader {
            token_id: self.token_id,
        });
        self.send(message, header).await;
        self.response().await
    }

    fn header(&self, request_handle: u32) -> RequestHeader {
        RequestHeader::new(&self.authentication_token, &DateTime::now(), request_handle)
    }

    async fn open(&mut self, endpoint_url: &str, requested_lifetime: u32) {
        match self.hello(endpoint_url).await {
            Message::Acknowledge(_) => {}
            other => panic!("Expected an acknowledge, got {:?}", other),
        }
        let request = OpenSecureChannelRequest {
            request_header: RequestHeader::dummy(),
            client_protocol_version: 0,
            request_type: SecurityTokenRequestType::Issue,
            security_mode: MessageSecurityMode::None,
            client_nonce: ByteString::null(),
            requested_lifetime,
        };
        self.send(
            request.into(),
            SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none()),
        )
        .await;
        let response = supported_message_as!(self.response().await, OpenSecureChannelResponse);
        assert_eq!(response.response_header.service_result, StatusCode::Good);
        self.secure_channel_id = response.security_token.channel_id;
        self.token_id = response.security_token.token_id;
        assert!(self.secure_channel_id > 0);
    }

    async fn create_session(&mut self, endpoint_url: &str) {
        let request = CreateSessionRequest {
            request_header: self.header(1),
            client_description: crate::types::service_types::ApplicationDescription {
                application_uri: "urn:test-client".into(),
                product_uri: UAString::null(),
                application_name: "test client".into(),
                application_type: crate::types::service_types::ApplicationType::Client,
                gateway_server_uri: UAString::null(),
                discovery_profile_uri: UAString::null(),
                discovery_urls: None,
            },
            server_uri: UAString::null(),
            endpoint_url: endpoint_url.into(),
            session_name: "test".into(),
            client_nonce: ByteString::null(),
            client_certificate: ByteString::null(),
            requested_session_timeout: 60_000.0,
            max_response_message_size: 0,
        };
        let response =
            supported_message_as!(self.request(request.into()).await, CreateSessionResponse);
        assert_eq!(response.response_header.request_handle, 1);
        self.authentication_token = response.authentication_token;
    }

    async fn activate_session(&mut self) {
        let request = ActivateSessionRequest {
            request_header: self.header(2),
            client_signature: SignatureData::default(),
            client_software_certificates: None,
            locale_ids: None,
            user_identity_token: ExtensionObject::null(),
            user_token_signature: SignatureData::default(),
        };
        let response =
            supported_message_as!(self.request(request.into()).await, ActivateSessionResponse);
        assert_eq!(response.response_header.service_result, StatusCode::Good);
    }

    async fn read(&mut self, node_id: NodeId) -> SupportedMessage {
        let request = ReadRequest {
            request_header: self.header(10),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(vec![ReadValueId::from(node_id)]),
        };
        self.request(request.into()).await
    }
}

fn fault_status(message: SupportedMessage) -> StatusCode {
    match message {
        SupportedMessage::ServiceFault(fault) => fault.response_header.service_result,
        other => panic!("Expected a service fault, got {:?}", other),
    }
}

fn temperature() -> NodeId {
    NodeId::new(2, "Plant/Line1/Temperature")
}

#[tokio::test]
async fn hello_is_acknowledged() {
    let server = TestServer::start(|_| {}).await;
    let mut client = TestClient::connect(server.port).await;
    match client.hello(&server.endpoint_url()).await {
        Message::Acknowledge(ack) => {
            assert_eq!(ack.protocol_version, 0);
            assert!(ack.receive_buffer_size <= 65535);
            assert!(ack.send_buffer_size <= 65535);
        }
        other => panic!("Expected an acknowledge, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn hello_for_unknown_endpoint_is_rejected() {
    let server = TestServer::start(|_| {}).await;
    let mut client = TestClient::connect(server.port).await;
    let url = format!("opc.tcp://localhost:{}/nowhere", server.port);
    match client.hello(&url).await {
        Message::Error(err) => assert_eq!(err.status_code(), StatusCode::BadTcpEndpointUrlInvalid),
        other => panic!("Expected an error, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn read_tag_after_activation() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;
    client.create_session(&url).await;

    // Services are refused until the session is activated
    assert_eq!(
        fault_status(client.read(temperature()).await),
        StatusCode::BadSessionNotActivated
    );

    client.activate_session().await;
    let response = supported_message_as!(client.read(temperature()).await, ReadResponse);
    assert_eq!(response.response_header.request_handle, 10);
    let results = response.results.unwrap();
    assert_eq!(results[0].value, Some(Variant::Double(20.0)));

    // Values pushed through the feed become visible to readers
    server
        .handle
        .tag_sender()
        .send(TagUpdate::new(temperature(), 42.0f64))
        .await
        .unwrap();
    let mut value = None;
    for _ in 0..50 {
        let response = supported_message_as!(client.read(temperature()).await, ReadResponse);
        value = response.results.unwrap().remove(0).value;
        if value == Some(Variant::Double(42.0)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(value, Some(Variant::Double(42.0)));

    server.stop().await;
}

#[tokio::test]
async fn get_endpoints_before_session() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;
    let request = GetEndpointsRequest {
        request_header: client.header(3),
        endpoint_url: url.as_str().into(),
        locale_ids: None,
        profile_uris: None,
    };
    let response = supported_message_as!(client.request(request.into()).await, GetEndpointsResponse);
    let endpoints = response.endpoints.unwrap();
    assert_eq!(endpoints.len(), 1);
    let endpoint_url: &str = endpoints[0].endpoint_url.as_ref();
    assert!(endpoint_url.ends_with("/vblfactory"));
    assert_eq!(endpoints[0].security_mode, MessageSecurityMode::None);
    server.stop().await;
}

#[tokio::test]
async fn close_session_twice_is_good() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;
    client.create_session(&url).await;
    client.activate_session().await;

    for _ in 0..2 {
        let request = CloseSessionRequest {
            request_header: client.header(4),
            delete_subscriptions: true,
        };
        let response =
            supported_message_as!(client.request(request.into()).await, CloseSessionResponse);
        assert_eq!(response.response_header.service_result, StatusCode::Good);
    }
    assert!(server.handle.session_manager().read().is_empty());

    // The session is gone, reads fail but the channel stays usable
    assert_eq!(
        fault_status(client.read(temperature()).await),
        StatusCode::BadSessionIdInvalid
    );
    server.stop().await;
}

#[tokio::test]
async fn expired_channel_token_closes_connection() {
    let server = TestServer::start(|config| {
        config.secure_channel.min_token_lifetime_ms = 100;
    })
    .await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 200).await;

    // The server closes the channel when the token runs out, even if the client is silent
    match client.next().await {
        Message::Error(err) => {
            assert_eq!(err.status_code(), StatusCode::BadSecureChannelTokenUnknown)
        }
        other => panic!("Expected an error, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn close_secure_channel_ends_connection() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;
    let header = SecurityHeader::Symmetric(SymmetricSecurityHeader {
        token_id: client.token_id,
    });
    let request = CloseSecureChannelRequest {
        request_header: client.header(5),
    };
    client.send(request.into(), header).await;
    let next = tokio::time::timeout(RECV_TIMEOUT, client.framed.next())
        .await
        .unwrap();
    assert!(next.is_none() || matches!(next, Some(Err(_))));
    server.stop().await;
}

#[tokio::test]
async fn shutdown_closes_connections() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;

    server.handle.cancel();
    match client.next().await {
        Message::Error(err) => assert_eq!(err.status_code(), StatusCode::BadServerHalted),
        other => panic!("Expected an error, got {:?}", other),
    }
    server.stop().await;
}

#[tokio::test]
async fn aborted_message_is_discarded() {
    let server = TestServer::start(|_| {}).await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;

    // The first half of a request, then the abort chunk carrying an error code and reason
    let request_id = client.next_request_id;
    client.next_request_id += 1;
    client
        .send_chunk(request_id, MessageIsFinalType::Intermediate, &[0u8; 64])
        .await;
    let mut abort_body = StatusCode::BadRequestTooLarge.bits().to_le_bytes().to_vec();
    abort_body.extend_from_slice(&(-1i32).to_le_bytes());
    client
        .send_chunk(request_id, MessageIsFinalType::FinalError, &abort_body)
        .await;

    // The sequence carries on after the aborted chunks
    let request = GetEndpointsRequest {
        request_header: client.header(6),
        endpoint_url: url.as_str().into(),
        locale_ids: None,
        profile_uris: None,
    };
    let response = supported_message_as!(client.request(request.into()).await, GetEndpointsResponse);
    assert_eq!(response.response_header.request_handle, 6);
    assert_eq!(response.response_header.service_result, StatusCode::Good);
    server.stop().await;
}

#[tokio::test]
async fn oversized_message_closes_connection() {
    let server = TestServer::start(|config| {
        config.limits.max_message_size = 16384;
    })
    .await;
    let url = server.endpoint_url();
    let mut client = TestClient::connect(server.port).await;
    client.open(&url, 60_000).await;

    // Each chunk fits on its own but together they pass the message size limit
    let request_id = client.next_request_id;
    client.next_request_id += 1;
    for _ in 0..3 {
        client
            .send_chunk(request_id, MessageIsFinalType::Intermediate, &[0u8; 6000])
            .await;
    }
    match client.next().await {
        Message::Error(err) => assert_eq!(err.status_code(), StatusCode::BadTcpMessageTooLarge),
        other => panic!("Expected an error, got {:?}", other),
    }
    server.stop().await;
}
