// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    server::address_space::AddressSpace,
    types::{DateTime, NodeId, StatusCode, Variant},
};

/// Number of updates that may wait for the feed before senders have to wait
pub const TAG_FEED_QUEUE_SIZE: usize = 1024;

/// A new value for a tag, from whatever source drives the tags.
#[derive(Debug, Clone, PartialEq)]
pub struct TagUpdate {
    pub node_id: NodeId,
    pub value: Variant,
    /// The time the value was taken at the source, `None` for now
    pub source_timestamp: Option<DateTime>,
    pub status: StatusCode,
}

impl TagUpdate {
    pub fn new<N, V>(node_id: N, value: V) -> Self
    where
        N: Into<NodeId>,
        V: Into<Variant>,
    {
        Self {
            node_id: node_id.into(),
            value: value.into(),
            source_timestamp: None,
            status: StatusCode::Good,
        }
    }

    pub fn with_source_timestamp(mut self, source_timestamp: DateTime) -> Self {
        self.source_timestamp = Some(source_timestamp);
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

/// Applies tag updates to the address space, which notifies the subscriptions monitoring them.
pub struct TagFeed {
    address_space: Arc<AddressSpace>,
    updates: mpsc::Receiver<TagUpdate>,
}

impl TagFeed {
    pub fn new(address_space: Arc<AddressSpace>) -> (TagFeed, mpsc::Sender<TagUpdate>) {
        let (sender, updates) = mpsc::channel(TAG_FEED_QUEUE_SIZE);
        (
            TagFeed {
                address_space,
                updates,
            },
            sender,
        )
    }

    /// Applies one update. Unknown tags and values of the wrong type are logged and dropped.
    pub fn apply(&self, update: TagUpdate) -> Result<(), StatusCode> {
        let TagUpdate {
            node_id,
            value,
            source_timestamp,
            status,
        } = update;
        self.address_space
            .set_variable_value(node_id.clone(), value, source_timestamp.or_else(|| Some(DateTime::now())), status)
            .map_err(|err| {
                debug!("Update of tag {} was rejected: {}", node_id, err);
                err
            })
    }

    /// Runs until every sender is dropped or the token is cancelled.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                update = self.updates.recv() => {
                    let Some(update) = update else {
                        debug!("Every tag update sender has gone, tag feed stops");
                        break;
                    };
                    let _ = self.apply(update);
                }
            }
        }
    }
}
