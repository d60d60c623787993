use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;

use crate::{
    core::comms::security_header::AsymmetricSecurityHeader,
    server::{
        address_space::{types::VariableBuilder, AddressSpace},
        authenticator::{DefaultAuthenticator, UserToken},
        config::{ChannelConfig, ServerConfig},
        info::ServerInfo,
        secure_channel::SecureChannel,
        subscriptions::{PersistentSessionKey, SubscriptionCache},
    },
    supported_message_as,
    types::{
        node_ids::{DataTypeId, ObjectId},
        service_types::{
            ActivateSessionRequest, BrowseDirection, BrowseNextRequest, BrowseRequest,
            CloseSessionRequest, CreateMonitoredItemsRequest, CreateSessionRequest,
            CreateSubscriptionRequest, MessageSecurityMode, MonitoredItemCreateRequest,
            MonitoringMode, MonitoringParameters, OpenSecureChannelRequest, PublishRequest,
            ReadRequest, ReadValueId, SecurityTokenRequestType, SignatureData,
            TimestampsToReturn, ViewDescription, WriteRequest, WriteValue,
        },
        AttributeId, BrowseDescription, ByteString, DataValue, DateTime, DecodingOptions,
        ExtensionObject, NodeId, RequestHeader, StatusCode, SupportedMessage, UAString, Variant,
    },
};

use super::{
    controller::Response,
    manager::SessionManager,
    message_handler::{HandleMessageResult, MessageHandler, RequestData},
};

const ENDPOINT_URL: &str = "opc.tcp://localhost:4842/vblfactory";

struct Fixture {
    info: Arc<ServerInfo>,
    address_space: Arc<AddressSpace>,
    subscriptions: Arc<SubscriptionCache>,
    manager: SessionManager,
    temperature: NodeId,
}

fn fixture(subscriptions_outlive_sessions: bool) -> Fixture {
    let mut config = ServerConfig::factory();
    config.session.subscriptions_outlive_sessions = subscriptions_outlive_sessions;
    let config = Arc::new(config);
    let info = Arc::new(ServerInfo::new(
        config.clone(),
        Arc::new(DefaultAuthenticator::new(config.user_tokens.clone())),
    ));
    let address_space = Arc::new(AddressSpace::new());
    let ns = address_space.register_namespace("urn:test");
    let temperature = NodeId::new(ns, "Line1/Temperature");
    VariableBuilder::new(&temperature, "Temperature", "Temperature")
        .value(21.5f64)
        .data_type(DataTypeId::Double)
        .writable()
        .organized_by(ObjectId::ObjectsFolder)
        .insert(&address_space)
        .unwrap();
    let subscriptions = Arc::new(SubscriptionCache::new(config.limits.subscriptions));
    address_space.set_data_change_listener(subscriptions.clone());
    let manager = SessionManager::new(info.clone(), subscriptions.clone());
    Fixture {
        info,
        address_space,
        subscriptions,
        manager,
        temperature,
    }
}

fn open_channel(id: u32, now: Instant) -> SecureChannel {
    let mut channel = SecureChannel::new(id);
    channel
        .process_open_request(
            &OpenSecureChannelRequest {
                request_header: RequestHeader::dummy(),
                client_protocol_version: 0,
                request_type: SecurityTokenRequestType::Issue,
                security_mode: MessageSecurityMode::None,
                client_nonce: ByteString::null(),
                requested_lifetime: 600_000,
            },
            &AsymmetricSecurityHeader::none(),
            0,
            &ChannelConfig::default(),
            now,
        )
        .unwrap();
    channel
}

fn header(token: &NodeId) -> RequestHeader {
    RequestHeader::new(token, &DateTime::now(), 1)
}

/// Creates and activates an anonymous session, returning its authentication token
fn create_session(f: &mut Fixture, channel: &SecureChannel, timeout: f64, now: Instant) -> NodeId {
    let response = f
        .manager
        .create_session(
            channel,
            &CreateSessionRequest {
                request_header: RequestHeader::dummy(),
                client_description: f.info.application_description(),
                server_uri: UAString::null(),
                endpoint_url: ENDPOINT_URL.into(),
                session_name: "test-session".into(),
                client_nonce: ByteString::null(),
                client_certificate: ByteString::null(),
                requested_session_timeout: timeout,
                max_response_message_size: 0,
            },
            now,
        )
        .unwrap();
    assert_eq!(response.revised_session_timeout, timeout);
    assert_eq!(response.server_endpoints.as_ref().map(|e| e.len()), Some(1));

    let token = response.authentication_token;
    f.manager
        .activate_session(channel, &activate_request(&token), now)
        .unwrap();
    token
}

fn activate_request(token: &NodeId) -> ActivateSessionRequest {
    ActivateSessionRequest {
        request_header: header(token),
        client_signature: SignatureData::default(),
        client_software_certificates: None,
        locale_ids: None,
        user_identity_token: ExtensionObject::null(),
        user_token_signature: SignatureData::default(),
    }
}

fn close_request(token: &NodeId, delete_subscriptions: bool) -> CloseSessionRequest {
    CloseSessionRequest {
        request_header: header(token),
        delete_subscriptions,
    }
}

fn add_subscription(f: &Fixture, token: &NodeId) -> u32 {
    let session = f.manager.find_by_token(token).unwrap();
    let session_id = session.read().session_id_numeric();
    let key = PersistentSessionKey::new(
        &UserToken::anonymous(),
        MessageSecurityMode::None,
        f.info.config.application_uri.as_str(),
    );
    f.subscriptions
        .create_subscription(
            session_id,
            &key,
            &CreateSubscriptionRequest {
                request_header: RequestHeader::dummy(),
                requested_publishing_interval: 1000.0,
                requested_lifetime_count: 300,
                requested_max_keep_alive_count: 10,
                max_notifications_per_publish: 0,
                publishing_enabled: true,
                priority: 0,
            },
            &f.info,
        )
        .unwrap()
        .subscription_id
}

fn request_data(f: &Fixture, token: &NodeId, request_id: u32) -> RequestData {
    let session = f.manager.find_by_token(token).unwrap();
    let session_id = session.read().session_id_numeric();
    RequestData {
        request_id,
        request_handle: request_id,
        session,
        token: UserToken::anonymous(),
        session_id,
    }
}

fn sync_response(result: HandleMessageResult) -> Response {
    match result {
        HandleMessageResult::SyncMessage(response) => response,
        HandleMessageResult::PublishResponse(_) => panic!("Expected a synchronous response"),
    }
}

fn service_result(message: &SupportedMessage) -> StatusCode {
    match message {
        SupportedMessage::ServiceFault(fault) => fault.response_header.service_result,
        other => panic!("Expected a service fault, got {:?}", other),
    }
}

#[test]
fn session_lifecycle() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 30_000.0, now);
    assert_eq!(f.manager.len(), 1);

    let session = f.manager.find_by_token(&token).unwrap();
    assert!(session.read().is_activated());
    assert_eq!(session.read().secure_channel_id(), Some(1));
    assert_eq!(session.read().session_timeout(), Duration::from_secs(30));

    f.manager.close_session(1, &close_request(&token, true)).unwrap();
    assert!(f.manager.is_empty());
    assert!(session.read().is_closed());
    assert_eq!(
        session.read().validate_activated().err(),
        Some(StatusCode::BadSessionClosed)
    );
}

#[test]
fn close_session_twice_is_good() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 30_000.0, now);

    let first = f.manager.close_session(1, &close_request(&token, true)).unwrap();
    assert_eq!(first.response_header.service_result, StatusCode::Good);
    let second = f.manager.close_session(1, &close_request(&token, true)).unwrap();
    assert_eq!(second.response_header.service_result, StatusCode::Good);
}

#[test]
fn close_session_from_another_channel_is_rejected() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 30_000.0, now);
    assert_eq!(
        f.manager.close_session(2, &close_request(&token, true)).err(),
        Some(StatusCode::BadSecureChannelIdInvalid)
    );
    assert_eq!(f.manager.len(), 1);
}

#[test]
fn create_session_with_unknown_endpoint_fails() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let result = f.manager.create_session(
        &channel,
        &CreateSessionRequest {
            request_header: RequestHeader::dummy(),
            client_description: f.info.application_description(),
            server_uri: UAString::null(),
            endpoint_url: "opc.tcp://localhost:4842/elsewhere".into(),
            session_name: UAString::null(),
            client_nonce: ByteString::null(),
            client_certificate: ByteString::null(),
            requested_session_timeout: 30_000.0,
            max_response_message_size: 0,
        },
        now,
    );
    assert_eq!(result.err(), Some(StatusCode::BadTcpEndpointUrlInvalid));
    assert!(f.manager.is_empty());
}

#[test]
fn activation_can_move_to_another_channel() {
    let mut f = fixture(false);
    let now = Instant::now();
    let first = open_channel(1, now);
    let token = create_session(&mut f, &first, 30_000.0, now);

    // The first channel goes away, the session waits to be activated again
    f.manager.detach_channel(1);
    let session = f.manager.find_by_token(&token).unwrap();
    assert_eq!(session.read().secure_channel_id(), None);

    let second = open_channel(2, now);
    f.manager
        .activate_session(&second, &activate_request(&token), now)
        .unwrap();
    assert_eq!(session.read().secure_channel_id(), Some(2));
}

#[test]
fn session_times_out_after_idle_period() {
    for outlive in [false, true] {
        let mut f = fixture(outlive);
        let now = Instant::now();
        let channel = open_channel(1, now);
        let token = create_session(&mut f, &channel, 60_000.0, now);
        let subscription_id = add_subscription(&f, &token);
        let session = f.manager.find_by_token(&token).unwrap();

        assert!(f.manager.sweep_expired(now + Duration::from_secs(59)).is_empty());
        assert_eq!(f.manager.len(), 1);

        // Service calls past the timeout are refused even before the sweep runs
        assert_eq!(
            session
                .read()
                .validate_timed_out(now + Duration::from_secs(61))
                .err(),
            Some(StatusCode::BadSessionIdInvalid)
        );

        let expired = f.manager.sweep_expired(now + Duration::from_secs(61));
        assert_eq!(expired.len(), 1);
        assert!(f.manager.is_empty());
        assert!(f.manager.find_by_token(&token).is_none());
        assert!(session.read().is_closed());

        let owner = f.subscriptions.subscription_owner(subscription_id);
        if outlive {
            // Detached, they wait to be transferred
            assert!(owner.is_some());
        } else {
            assert_eq!(owner, None);
        }
    }
}

#[test]
fn activity_extends_the_session() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 60_000.0, now);
    let session = f.manager.find_by_token(&token).unwrap();
    session
        .read()
        .validate_timed_out(now + Duration::from_secs(50))
        .unwrap();
    assert!(f.manager.sweep_expired(now + Duration::from_secs(70)).is_empty());
    assert_eq!(f.manager.sweep_expired(now + Duration::from_secs(111)).len(), 1);
}

#[tokio::test]
async fn write_is_published_to_subscribers() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 60_000.0, now);
    f.address_space
        .set_variable_value(f.temperature.clone(), 0.0f64, None, StatusCode::Good)
        .unwrap();
    let handler = MessageHandler::new(
        f.info.clone(),
        f.address_space.clone(),
        f.subscriptions.clone(),
    );

    let response = sync_response(handler.handle_message(
        CreateSubscriptionRequest {
            request_header: header(&token),
            requested_publishing_interval: 500.0,
            requested_lifetime_count: 30,
            requested_max_keep_alive_count: 10,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        }
        .into(),
        request_data(&f, &token, 1),
    ));
    assert_eq!(response.request_id, 1);
    let subscription_id =
        supported_message_as!(response.message, CreateSubscriptionResponse).subscription_id;

    let response = sync_response(handler.handle_message(
        CreateMonitoredItemsRequest {
            request_header: header(&token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::from(f.temperature.clone()),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle: 99,
                    sampling_interval: 0.0,
                    filter: ExtensionObject::null(),
                    queue_size: 1,
                    discard_oldest: true,
                },
            }]),
        }
        .into(),
        request_data(&f, &token, 2),
    ));
    let results = supported_message_as!(response.message, CreateMonitoredItemsResponse)
        .results
        .unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);

    let write_issued = DateTime::now();
    let response = sync_response(handler.handle_message(
        WriteRequest {
            request_header: header(&token),
            nodes_to_write: Some(vec![WriteValue {
                node_id: f.temperature.clone(),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::value_only(Variant::Double(42.0)),
            }]),
        }
        .into(),
        request_data(&f, &token, 3),
    ));
    let write = supported_message_as!(response.message, WriteResponse);
    assert_eq!(write.results, Some(vec![StatusCode::Good]));

    let pending = match handler.handle_message(
        PublishRequest {
            request_header: header(&token),
            subscription_acknowledgements: None,
        }
        .into(),
        request_data(&f, &token, 4),
    ) {
        HandleMessageResult::PublishResponse(pending) => pending,
        HandleMessageResult::SyncMessage(_) => panic!("Publish should wait for the subscription"),
    };

    let start = Instant::now();
    f.subscriptions.tick_at(&Utc::now(), start);
    f.subscriptions
        .tick_at(&Utc::now(), start + Duration::from_millis(500));

    let response = pending.recv().await;
    assert_eq!(response.request_id, 4);
    let publish = supported_message_as!(response.message, PublishResponse);
    assert_eq!(publish.subscription_id, subscription_id);
    let changes = publish
        .notification_message
        .data_changes(&DecodingOptions::default());
    assert_eq!(changes.len(), 1);
    let items = changes[0].monitored_items.as_ref().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].client_handle, 99);
    assert_eq!(items[0].value.value, Some(Variant::Double(42.0)));
    assert!(items[0].value.server_timestamp.unwrap() >= write_issued);
}

#[test]
fn read_rejects_negative_max_age() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 60_000.0, now);
    let handler = MessageHandler::new(
        f.info.clone(),
        f.address_space.clone(),
        f.subscriptions.clone(),
    );

    let read = |max_age: f64, nodes: Option<Vec<ReadValueId>>| {
        sync_response(handler.handle_message(
            ReadRequest {
                request_header: header(&token),
                max_age,
                timestamps_to_return: TimestampsToReturn::Both,
                nodes_to_read: nodes,
            }
            .into(),
            request_data(&f, &token, 1),
        ))
        .message
    };

    assert_eq!(
        service_result(&read(-1.0, Some(vec![ReadValueId::from(f.temperature.clone())]))),
        StatusCode::BadMaxAgeInvalid
    );
    assert_eq!(service_result(&read(0.0, None)), StatusCode::BadNothingToDo);

    let response = supported_message_as!(
        read(0.0, Some(vec![ReadValueId::from(f.temperature.clone())])),
        ReadResponse
    );
    let results = response.results.unwrap();
    assert_eq!(results[0].value, Some(Variant::Double(21.5)));
}

#[test]
fn browse_pages_with_continuation_points() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 60_000.0, now);
    let handler = MessageHandler::new(
        f.info.clone(),
        f.address_space.clone(),
        f.subscriptions.clone(),
    );

    let description = BrowseDescription {
        node_id: f.address_space.objects_folder_id(),
        browse_direction: BrowseDirection::Forward,
        reference_type_id: NodeId::null(),
        include_subtypes: true,
        node_class_mask: 0,
        result_mask: 0x3f,
    };
    let total = f.address_space.browse(&description, usize::MAX).unwrap().len();
    assert!(total >= 2);

    let response = sync_response(handler.handle_message(
        BrowseRequest {
            request_header: header(&token),
            view: ViewDescription::default(),
            requested_max_references_per_node: 1,
            nodes_to_browse: Some(vec![description]),
        }
        .into(),
        request_data(&f, &token, 1),
    ));
    let result = supported_message_as!(response.message, BrowseResponse)
        .results
        .unwrap()
        .remove(0);
    assert_eq!(result.status_code, StatusCode::Good);
    assert_eq!(result.references.map(|r| r.len()), Some(1));
    assert!(!result.continuation_point.is_null());

    let session = f.manager.find_by_token(&token).unwrap();
    assert_eq!(session.read().browse_continuation_point_count(), 1);

    let mut seen = 1;
    let mut continuation_point = result.continuation_point;
    while !continuation_point.is_null() {
        let response = sync_response(handler.handle_message(
            BrowseNextRequest {
                request_header: header(&token),
                release_continuation_points: false,
                continuation_points: Some(vec![continuation_point.clone()]),
            }
            .into(),
            request_data(&f, &token, 2),
        ));
        let result = supported_message_as!(response.message, BrowseNextResponse)
            .results
            .unwrap()
            .remove(0);
        assert_eq!(result.status_code, StatusCode::Good);
        seen += result.references.map_or(0, |r| r.len());
        continuation_point = result.continuation_point;
    }
    assert_eq!(seen, total);
    assert_eq!(session.read().browse_continuation_point_count(), 0);
}

#[test]
fn unsupported_service_is_faulted() {
    let mut f = fixture(false);
    let now = Instant::now();
    let channel = open_channel(1, now);
    let token = create_session(&mut f, &channel, 60_000.0, now);
    let handler = MessageHandler::new(
        f.info.clone(),
        f.address_space.clone(),
        f.subscriptions.clone(),
    );
    let response = sync_response(handler.handle_message(
        close_request(&token, false).into(),
        request_data(&f, &token, 9),
    ));
    assert_eq!(response.request_id, 9);
    assert_eq!(service_result(&response.message), StatusCode::BadServiceUnsupported);
}
