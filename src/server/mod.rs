// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA server. Connections are accepted by [`ServerCore`], each one served by its own
//! session controller task which owns the transport and the secure channel. Sessions, the
//! address space and the subscription cache are shared between connections.

pub mod address_space;
pub mod authenticator;
pub mod config;
pub mod info;
pub mod secure_channel;
pub mod server_core;
pub mod session;
pub mod subscriptions;
pub mod tags;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::{ServerConfig, ServerEndpoint, ServerUserToken};
pub use server_core::{ServerCore, ServerHandle};

pub mod constants {
    //! Provides constants that govern the internal workings of the server implementation.
    /// The default hello timeout period in seconds
    pub const DEFAULT_HELLO_TIMEOUT_SECONDS: u32 = 5;
    /// Default port of the factory server
    pub const DEFAULT_PORT: u16 = 4842;
    /// Path of the factory endpoint
    pub const ENDPOINT_PATH: &str = "/vblfactory";
    /// Default maximum number of monitored items per subscription
    pub const DEFAULT_MAX_MONITORED_ITEMS_PER_SUB: usize = 1000;

    // Internally controlled values

    /// The polling interval in millis on subscriptions and monitored items. The more
    /// fine-grained this is, the more often subscriptions will be checked for changes. The minimum
    /// publish interval cannot be less than this.
    pub const SUBSCRIPTION_TIMER_RATE_MS: u64 = 100;
    /// Minimum publishing interval for subscriptions
    pub const MIN_PUBLISHING_INTERVAL_MS: f64 = SUBSCRIPTION_TIMER_RATE_MS as f64;
    /// Minimum sampling interval on monitored items
    pub const MIN_SAMPLING_INTERVAL_MS: f64 = SUBSCRIPTION_TIMER_RATE_MS as f64;
    /// Maximum data change queue allowed by clients on monitored items
    pub const MAX_DATA_CHANGE_QUEUE_SIZE: usize = 10;
    /// Minimum time in MS a session may be inactive before it times out
    pub const MIN_SESSION_TIMEOUT_MS: f64 = 10_000f64;
    /// Maximum time in MS that a session can be inactive before a timeout
    pub const MAX_SESSION_TIMEOUT_MS: f64 = 60_000f64;
    /// Interval between sweeps for timed out sessions
    pub const SESSION_SWEEP_INTERVAL_MS: u64 = 1_000;
    /// Maximum number of sessions open at once
    pub const MAX_SESSIONS: usize = 100;
    /// Minimum lifetime of a secure channel token
    pub const MIN_TOKEN_LIFETIME_MS: u32 = 10_000;
    /// Maximum lifetime of a secure channel token
    pub const MAX_TOKEN_LIFETIME_MS: u32 = 3_600_000;
    /// Lifetime granted when the client asks for 0
    pub const DEFAULT_TOKEN_LIFETIME_MS: u32 = 600_000;
    /// Maximum size in bytes that a request message is allowed to be
    pub const MAX_REQUEST_MESSAGE_SIZE: u32 = 32768;
    /// Default keep alive count
    pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;
    /// Maximum keep alive count
    pub const MAX_KEEP_ALIVE_COUNT: u32 = 30000;
    /// Maximum browse continuation points
    pub const MAX_BROWSE_CONTINUATION_POINTS: usize = 20;
    /// Send buffer size in bytes
    pub const SEND_BUFFER_SIZE: usize = 65535;
    /// Receive buffer size in bytes
    pub const RECEIVE_BUFFER_SIZE: usize = 65535;

    /// Maximum number of nodes in a TranslateBrowsePathsToNodeIdsRequest
    pub const MAX_NODES_PER_TRANSLATE_BROWSE_PATHS_TO_NODE_IDS: usize = 10;
    pub const MAX_NODES_PER_READ: usize = 50;
    pub const MAX_NODES_PER_WRITE: usize = 10;
    pub const MAX_NODES_PER_METHOD_CALL: usize = 10;
    pub const MAX_NODES_PER_BROWSE: usize = 50;
    pub const MAX_MONITORED_ITEMS_PER_CALL: usize = 10;
    pub const MAX_SUBSCRIPTIONS_PER_CALL: usize = 10;

    pub const MAX_REFERENCES_PER_BROWSE_NODE: usize = 1000;

    pub const MAX_SUBSCRIPTIONS_PER_SESSION: usize = 10;
    pub const MAX_PENDING_PUBLISH_REQUESTS: usize = 20;
    pub const MAX_PUBLISH_REQUESTS_PER_SUBSCRIPTION: usize = 4;
    /// Maximum notifications in one publish response, 0 for no limit
    pub const MAX_NOTIFICATIONS_PER_PUBLISH: u64 = 0;
    /// Maximum notification messages queued by a subscription
    pub const MAX_QUEUED_NOTIFICATIONS: usize = 20;

    pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 30000;

    /// Interval of the simulated tag feed
    pub const DEFAULT_SIMULATION_INTERVAL_MS: u64 = 1000;
}

pub mod prelude {
    pub use super::{
        address_space::{AddressSpace, NodeType},
        authenticator::{AuthManager, DefaultAuthenticator, UserToken},
        config::*,
        info::ServerInfo,
        server_core::{ServerCore, ServerHandle},
        subscriptions::SubscriptionCache,
        tags::{feed::TagFeed, feed::TagUpdate, manifest::TagManifest, simulator::TagSimulator},
    };
    pub use crate::core::prelude::*;
}
