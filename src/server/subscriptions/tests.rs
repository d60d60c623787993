use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use tokio::sync::oneshot;

use crate::{
    server::{
        address_space::{types::VariableBuilder, AddressSpace},
        authenticator::{DefaultAuthenticator, UserToken},
        config::{ServerConfig, SubscriptionLimits},
        info::ServerInfo,
    },
    supported_message_as,
    types::{
        node_ids::ObjectId,
        service_types::{
            CreateMonitoredItemsRequest, CreateSubscriptionRequest, MessageSecurityMode,
            MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, PublishRequest,
            ReadValueId, RepublishRequest, SubscriptionAcknowledgement, TimestampsToReturn,
            TransferSubscriptionsRequest,
        },
        DecodingOptions, ExtensionObject, NodeId, RequestHeader, StatusCode, SupportedMessage,
        Variant,
    },
};

use super::{PendingPublish, PersistentSessionKey, SubscriptionCache};

struct Fixture {
    cache: Arc<SubscriptionCache>,
    info: ServerInfo,
    address_space: AddressSpace,
    temperature: NodeId,
}

fn fixture(limits: SubscriptionLimits) -> Fixture {
    let config = ServerConfig::factory();
    let info = ServerInfo::new(
        Arc::new(config),
        Arc::new(DefaultAuthenticator::new(BTreeMap::new())),
    );
    let address_space = AddressSpace::new();
    let ns = address_space.register_namespace("urn:test");
    let temperature = NodeId::new(ns, "Line1/Temperature");
    VariableBuilder::new(&temperature, "Temperature", "Temperature")
        .value(21.5f64)
        .organized_by(ObjectId::ObjectsFolder)
        .insert(&address_space)
        .unwrap();
    let cache = Arc::new(SubscriptionCache::new(limits));
    address_space.set_data_change_listener(cache.clone());
    Fixture {
        cache,
        info,
        address_space,
        temperature,
    }
}

fn key(user: &str) -> PersistentSessionKey {
    let token = if user.is_empty() {
        UserToken::anonymous()
    } else {
        UserToken(user.to_string())
    };
    PersistentSessionKey::new(&token, MessageSecurityMode::None, "urn:test-client")
}

fn create_subscription(
    f: &Fixture,
    session_id: u32,
    key: &PersistentSessionKey,
    keep_alive: u32,
    lifetime: u32,
) -> u32 {
    let request = CreateSubscriptionRequest {
        request_header: RequestHeader::dummy(),
        requested_publishing_interval: 1000.0,
        requested_lifetime_count: lifetime,
        requested_max_keep_alive_count: keep_alive,
        max_notifications_per_publish: 0,
        publishing_enabled: true,
        priority: 0,
    };
    let response = f
        .cache
        .create_subscription(session_id, key, &request, &f.info)
        .unwrap();
    assert_eq!(response.revised_publishing_interval, 1000.0);
    response.subscription_id
}

fn monitor(f: &Fixture, session_id: u32, subscription_id: u32, node_id: NodeId, client_handle: u32) -> StatusCode {
    let request = CreateMonitoredItemsRequest {
        request_header: RequestHeader::dummy(),
        subscription_id,
        timestamps_to_return: TimestampsToReturn::Both,
        items_to_create: Some(vec![MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::from(node_id),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle,
                sampling_interval: 0.0,
                filter: ExtensionObject::null(),
                queue_size: 1,
                discard_oldest: true,
            },
        }]),
    };
    let results = f
        .cache
        .create_monitored_items(session_id, &request, &f.info, &f.address_space)
        .unwrap();
    assert_eq!(results.len(), 1);
    results[0].status_code
}

fn publish(
    f: &Fixture,
    session_id: u32,
    now: Instant,
    timeout: Duration,
    acks: Option<Vec<SubscriptionAcknowledgement>>,
) -> oneshot::Receiver<SupportedMessage> {
    let (tx, rx) = oneshot::channel();
    f.cache.enqueue_publish_request(
        session_id,
        &Utc::now(),
        now,
        PendingPublish {
            response: tx,
            request: Box::new(PublishRequest {
                request_header: RequestHeader::dummy(),
                subscription_acknowledgements: acks,
            }),
            ack_results: None,
            deadline: now + timeout,
        },
    );
    rx
}

fn service_result(message: SupportedMessage) -> StatusCode {
    match message {
        SupportedMessage::ServiceFault(fault) => fault.response_header.service_result,
        SupportedMessage::PublishResponse(response) => response.response_header.service_result,
        other => panic!("Unexpected response {:?}", other),
    }
}

fn at(start: Instant, ms: u64) -> Instant {
    start + Duration::from_millis(ms)
}

const TIMEOUT: Duration = Duration::from_secs(30);

#[test]
fn publish_delivers_initial_value_and_writes() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    assert_eq!(monitor(&f, 1, sub_id, f.temperature.clone(), 7), StatusCode::Good);
    assert_eq!(f.cache.monitored_node_count(&f.temperature), 1);

    let start = Instant::now();
    let now = Utc::now();
    let mut rx = publish(&f, 1, start, TIMEOUT, None);
    f.cache.tick_at(&now, start);
    assert!(rx.try_recv().is_err());
    f.cache.tick_at(&now, at(start, 1000));

    let response = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);
    assert_eq!(response.subscription_id, sub_id);
    assert_eq!(response.notification_message.sequence_number, 1);
    let changes = response
        .notification_message
        .data_changes(&DecodingOptions::default());
    let items = changes[0].monitored_items.as_ref().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].client_handle, 7);
    assert_eq!(items[0].value.value, Some(Variant::Double(21.5)));
    assert_eq!(response.available_sequence_numbers, Some(vec![1]));

    f.address_space
        .set_variable_value(f.temperature.clone(), 30.0f64, None, StatusCode::Good)
        .unwrap();
    let mut rx = publish(&f, 1, at(start, 1100), TIMEOUT, None);
    f.cache.tick_at(&now, at(start, 2000));
    let response = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);
    assert_eq!(response.notification_message.sequence_number, 2);
    let changes = response
        .notification_message
        .data_changes(&DecodingOptions::default());
    let items = changes[0].monitored_items.as_ref().unwrap();
    assert_eq!(items[0].value.value, Some(Variant::Double(30.0)));
}

#[test]
fn acknowledged_messages_cannot_be_republished() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    monitor(&f, 1, sub_id, f.temperature.clone(), 1);
    let start = Instant::now();
    let now = Utc::now();
    let mut rx = publish(&f, 1, start, TIMEOUT, None);
    f.cache.tick_at(&now, start);
    f.cache.tick_at(&now, at(start, 1000));
    let first = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);

    let republish = |sequence_number| {
        f.cache.republish(
            1,
            &RepublishRequest {
                request_header: RequestHeader::dummy(),
                subscription_id: sub_id,
                retransmit_sequence_number: sequence_number,
            },
        )
    };
    let response = republish(1).unwrap();
    assert_eq!(response.notification_message, first.notification_message);
    assert_eq!(republish(5).unwrap_err(), StatusCode::BadMessageNotAvailable);

    let acks = vec![
        SubscriptionAcknowledgement {
            subscription_id: sub_id,
            sequence_number: 1,
        },
        SubscriptionAcknowledgement {
            subscription_id: sub_id,
            sequence_number: 1,
        },
        SubscriptionAcknowledgement {
            subscription_id: sub_id + 100,
            sequence_number: 1,
        },
    ];
    let mut rx = publish(&f, 1, at(start, 1100), TIMEOUT, Some(acks));
    assert_eq!(republish(1).unwrap_err(), StatusCode::BadMessageNotAvailable);

    // The acknowledgement results come back with the next response
    f.address_space
        .set_variable_value(f.temperature.clone(), 22.0f64, None, StatusCode::Good)
        .unwrap();
    f.cache.tick_at(&now, at(start, 2000));
    let response = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);
    assert_eq!(
        response.results,
        Some(vec![
            StatusCode::Good,
            StatusCode::BadSequenceNumberUnknown,
            StatusCode::BadSubscriptionIdInvalid,
        ])
    );
}

#[test]
fn oldest_publish_request_is_rejected_when_full() {
    let limits = SubscriptionLimits {
        max_pending_publish_requests: 2,
        ..Default::default()
    };
    let f = fixture(limits);
    let key = key("");
    create_subscription(&f, 1, &key, 10, 30);
    let start = Instant::now();
    let mut rx1 = publish(&f, 1, start, TIMEOUT, None);
    let mut rx2 = publish(&f, 1, start, TIMEOUT, None);
    let mut rx3 = publish(&f, 1, start, TIMEOUT, None);
    assert_eq!(
        service_result(rx1.try_recv().unwrap()),
        StatusCode::BadTooManyPublishRequests
    );
    assert!(rx2.try_recv().is_err());
    assert!(rx3.try_recv().is_err());
}

#[test]
fn publish_without_subscription() {
    let f = fixture(SubscriptionLimits::default());
    let mut rx = publish(&f, 1, Instant::now(), TIMEOUT, None);
    assert_eq!(
        service_result(rx.try_recv().unwrap()),
        StatusCode::BadNoSubscription
    );
}

#[test]
fn publish_request_times_out() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    create_subscription(&f, 1, &key, 10, 30);
    let start = Instant::now();
    let mut rx = publish(&f, 1, start, Duration::from_millis(500), None);
    f.cache.tick_at(&Utc::now(), at(start, 600));
    assert_eq!(service_result(rx.try_recv().unwrap()), StatusCode::BadTimeout);
}

#[test]
fn expired_subscription_is_deleted() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 1, 3);
    monitor(&f, 1, sub_id, f.temperature.clone(), 1);
    let start = Instant::now();
    let now = Utc::now();
    f.cache.tick_at(&now, start);
    f.cache.tick_at(&now, at(start, 1001));
    f.cache.tick_at(&now, at(start, 2002));
    assert_eq!(f.cache.subscription_owner(sub_id), Some(1));
    f.cache.tick_at(&now, at(start, 3003));
    assert_eq!(f.cache.subscription_owner(sub_id), None);
    assert!(f.cache.session_subscription_ids(1).is_empty());
    assert_eq!(f.cache.monitored_node_count(&f.temperature), 0);

    // The client learns about it with its next publish
    let mut rx = publish(&f, 1, at(start, 3100), TIMEOUT, None);
    let response = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);
    assert_eq!(response.subscription_id, sub_id);
    let status_changes = response
        .notification_message
        .status_changes(&DecodingOptions::default());
    assert_eq!(status_changes[0].status, StatusCode::BadTimeout);

    let mut rx = publish(&f, 1, at(start, 3200), TIMEOUT, None);
    assert_eq!(
        service_result(rx.try_recv().unwrap()),
        StatusCode::BadNoSubscription
    );
}

#[test]
fn closing_a_session_deletes_its_subscriptions() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    monitor(&f, 1, sub_id, f.temperature.clone(), 1);
    let mut rx = publish(&f, 1, Instant::now(), TIMEOUT, None);
    f.cache.close_session(1, true);
    assert_eq!(service_result(rx.try_recv().unwrap()), StatusCode::BadSessionClosed);
    assert_eq!(f.cache.subscription_owner(sub_id), None);
    assert_eq!(f.cache.monitored_node_count(&f.temperature), 0);
}

#[test]
fn detached_subscriptions_can_be_transferred() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("operator");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    let mut rx = publish(&f, 1, Instant::now(), TIMEOUT, None);
    f.cache.close_session(1, false);
    assert_eq!(service_result(rx.try_recv().unwrap()), StatusCode::BadSessionClosed);
    assert_eq!(f.cache.subscription_owner(sub_id), Some(1));

    let request = TransferSubscriptionsRequest {
        request_header: RequestHeader::dummy(),
        subscription_ids: Some(vec![sub_id, sub_id + 100]),
        send_initial_values: true,
    };
    let response = f.cache.transfer(&request, 2, &key);
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[1].status_code, StatusCode::BadSubscriptionIdInvalid);
    assert_eq!(f.cache.subscription_owner(sub_id), Some(2));
    assert_eq!(f.cache.session_subscription_ids(2), vec![sub_id]);
    assert!(f.cache.session_subscription_ids(1).is_empty());
}

#[test]
fn transfer_requires_the_same_identity() {
    let f = fixture(SubscriptionLimits::default());
    let sub_id = create_subscription(&f, 1, &key("operator"), 10, 30);
    let request = TransferSubscriptionsRequest {
        request_header: RequestHeader::dummy(),
        subscription_ids: Some(vec![sub_id]),
        send_initial_values: false,
    };
    let response = f.cache.transfer(&request, 2, &key("maintenance"));
    assert_eq!(
        response.results.unwrap()[0].status_code,
        StatusCode::BadUserAccessDenied
    );
    assert_eq!(f.cache.subscription_owner(sub_id), Some(1));
}

#[test]
fn previous_owner_is_told_about_transfer() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    let start = Instant::now();
    let mut rx = publish(&f, 1, start, TIMEOUT, None);
    let request = TransferSubscriptionsRequest {
        request_header: RequestHeader::dummy(),
        subscription_ids: Some(vec![sub_id]),
        send_initial_values: false,
    };
    let response = f.cache.transfer(&request, 2, &key);
    assert_eq!(response.results.unwrap()[0].status_code, StatusCode::Good);

    f.cache.tick_at(&Utc::now(), at(start, 100));
    let response = supported_message_as!(rx.try_recv().unwrap(), PublishResponse);
    assert_eq!(response.subscription_id, sub_id);
    let status_changes = response
        .notification_message
        .status_changes(&DecodingOptions::default());
    assert_eq!(
        status_changes[0].status,
        StatusCode::GoodSubscriptionTransferred
    );
}

#[test]
fn monitored_items_of_another_session_are_hidden() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    monitor(&f, 1, sub_id, f.temperature.clone(), 11);
    monitor(&f, 1, sub_id, f.temperature.clone(), 12);
    let (server_handles, client_handles) = f.cache.get_monitored_items(1, sub_id).unwrap();
    assert_eq!(server_handles.len(), 2);
    assert_eq!(client_handles, vec![11, 12]);
    assert_eq!(
        f.cache.get_monitored_items(2, sub_id).unwrap_err(),
        StatusCode::BadUserAccessDenied
    );
    assert_eq!(
        f.cache.get_monitored_items(1, sub_id + 100).unwrap_err(),
        StatusCode::BadSubscriptionIdInvalid
    );
}

#[test]
fn unknown_node_is_not_monitored() {
    let f = fixture(SubscriptionLimits::default());
    let key = key("");
    let sub_id = create_subscription(&f, 1, &key, 10, 30);
    assert_eq!(
        monitor(&f, 1, sub_id, NodeId::new(1, "Nowhere"), 1),
        StatusCode::BadNodeIdUnknown
    );
    let results = f.cache.delete_subscriptions(1, &[sub_id, sub_id]).unwrap();
    assert_eq!(
        results,
        vec![StatusCode::Good, StatusCode::BadSubscriptionIdInvalid]
    );
}
