// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Resource limits of the server. Every section may be left out of the configuration
//! file, missing values take the defaults below.

use crate::{server::constants as server, types::constants as codec};

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Limits {
    /// Elements in a decoded array
    pub max_array_length: usize,
    /// Characters in a decoded string
    pub max_string_length: usize,
    /// Bytes in a decoded byte string
    pub max_byte_string_length: usize,
    /// Bytes in a whole message, summed over its chunks
    pub max_message_size: usize,
    /// Chunks making up one message
    pub max_chunk_count: usize,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    /// Browse continuation points held for a session
    pub max_browse_continuation_points: usize,
    pub subscriptions: SubscriptionLimits,
    pub operational: OperationalLimits,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_array_length: codec::MAX_ARRAY_LENGTH,
            max_string_length: codec::MAX_STRING_LENGTH,
            max_byte_string_length: codec::MAX_BYTE_STRING_LENGTH,
            max_message_size: codec::MAX_MESSAGE_SIZE,
            max_chunk_count: codec::MAX_CHUNK_COUNT,
            send_buffer_size: server::SEND_BUFFER_SIZE,
            receive_buffer_size: server::RECEIVE_BUFFER_SIZE,
            max_browse_continuation_points: server::MAX_BROWSE_CONTINUATION_POINTS,
            subscriptions: SubscriptionLimits::default(),
            operational: OperationalLimits::default(),
        }
    }
}

/// Bounds applied when subscriptions and monitored items are created or revised
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionLimits {
    pub max_subscriptions_per_session: usize,
    /// Publish requests queued for a session before the oldest is answered with
    /// `BadTooManyPublishRequests`
    pub max_pending_publish_requests: usize,
    pub max_publish_requests_per_subscription: usize,
    pub min_sampling_interval_ms: f64,
    pub min_publishing_interval_ms: f64,
    pub max_keep_alive_count: u32,
    /// Used when a client asks for a keep alive count of 0
    pub default_keep_alive_count: u32,
    /// 0 for no limit
    pub max_monitored_items_per_sub: usize,
    pub max_monitored_item_queue_size: usize,
    pub max_lifetime_count: u32,
    /// 0 for no limit
    pub max_notifications_per_publish: u64,
    /// Notification messages kept for republish, 0 for no limit
    pub max_queued_notifications: usize,
}

impl Default for SubscriptionLimits {
    fn default() -> Self {
        SubscriptionLimits {
            max_subscriptions_per_session: server::MAX_SUBSCRIPTIONS_PER_SESSION,
            max_pending_publish_requests: server::MAX_PENDING_PUBLISH_REQUESTS,
            max_publish_requests_per_subscription: server::MAX_PUBLISH_REQUESTS_PER_SUBSCRIPTION,
            min_sampling_interval_ms: server::MIN_SAMPLING_INTERVAL_MS,
            min_publishing_interval_ms: server::MIN_PUBLISHING_INTERVAL_MS,
            max_keep_alive_count: server::MAX_KEEP_ALIVE_COUNT,
            default_keep_alive_count: server::DEFAULT_KEEP_ALIVE_COUNT,
            max_monitored_items_per_sub: server::DEFAULT_MAX_MONITORED_ITEMS_PER_SUB,
            max_monitored_item_queue_size: server::MAX_DATA_CHANGE_QUEUE_SIZE,
            // The lifetime has to cover at least three keep alives
            max_lifetime_count: server::MAX_KEEP_ALIVE_COUNT * 3,
            max_notifications_per_publish: server::MAX_NOTIFICATIONS_PER_PUBLISH,
            max_queued_notifications: server::MAX_QUEUED_NOTIFICATIONS,
        }
    }
}

/// Operations a single service call may carry. Calls over a limit fail with
/// `BadTooManyOperations`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OperationalLimits {
    pub max_nodes_per_read: usize,
    pub max_nodes_per_write: usize,
    pub max_nodes_per_browse: usize,
    pub max_references_per_browse_node: usize,
    pub max_nodes_per_translate_browse_paths_to_node_ids: usize,
    pub max_nodes_per_method_call: usize,
    pub max_monitored_items_per_call: usize,
    pub max_subscriptions_per_call: usize,
}

impl Default for OperationalLimits {
    fn default() -> Self {
        OperationalLimits {
            max_nodes_per_read: server::MAX_NODES_PER_READ,
            max_nodes_per_write: server::MAX_NODES_PER_WRITE,
            max_nodes_per_browse: server::MAX_NODES_PER_BROWSE,
            max_references_per_browse_node: server::MAX_REFERENCES_PER_BROWSE_NODE,
            max_nodes_per_translate_browse_paths_to_node_ids:
                server::MAX_NODES_PER_TRANSLATE_BROWSE_PATHS_TO_NODE_IDS,
            max_nodes_per_method_call: server::MAX_NODES_PER_METHOD_CALL,
            max_monitored_items_per_call: server::MAX_MONITORED_ITEMS_PER_CALL,
            max_subscriptions_per_call: server::MAX_SUBSCRIPTIONS_PER_CALL,
        }
    }
}

#[test]
fn partial_limits_take_defaults() {
    let limits: Limits = serde_yaml::from_str(
        "max_message_size: 16384\nsubscriptions:\n  max_pending_publish_requests: 2\n",
    )
    .unwrap();
    assert_eq!(limits.max_message_size, 16384);
    assert_eq!(limits.max_chunk_count, codec::MAX_CHUNK_COUNT);
    assert_eq!(limits.subscriptions.max_pending_publish_requests, 2);
    assert_eq!(
        limits.subscriptions.min_publishing_interval_ms,
        server::MIN_PUBLISHING_INTERVAL_MS
    );
    assert_eq!(limits.operational, OperationalLimits::default());
}
