// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The subscription engine. Subscriptions are grouped by the session that owns them, publish
//! requests wait in a per session queue and are answered through a oneshot channel when the
//! publishing cycle of a subscription produces a notification.

mod monitored_item;
mod session_subscriptions;
mod subscription;

use std::{
    collections::HashSet,
    sync::Arc,
    time::Instant,
};

use chrono::Utc;
use hashbrown::HashMap;
use tokio::sync::oneshot;

use crate::{
    server::{
        address_space::{AddressSpace, DataChangeListener},
        authenticator::UserToken,
        config::SubscriptionLimits,
        info::ServerInfo,
    },
    sync::{Mutex, RwLock},
    types::{
        service_types::{
            CreateMonitoredItemsRequest, CreateSubscriptionRequest, CreateSubscriptionResponse,
            MessageSecurityMode, ModifyMonitoredItemsRequest, ModifySubscriptionRequest,
            ModifySubscriptionResponse, MonitoredItemCreateResult, MonitoredItemModifyResult,
            MonitoringMode, PublishRequest, RepublishRequest, RepublishResponse, ServiceFault,
            SetPublishingModeRequest, SetPublishingModeResponse, TimestampsToReturn,
            TransferResult, TransferSubscriptionsRequest, TransferSubscriptionsResponse,
        },
        DataValue, DateTimeUtc, ExtensionObject, NodeId, NotificationMessage, ResponseHeader,
        StatusCode, SupportedMessage, UAString,
    },
};

pub use self::{
    monitored_item::{FilterType, MonitoredItem},
    subscription::{MonitoredItemHandle, Subscription, SubscriptionState},
};
use self::{session_subscriptions::SessionSubscriptions, subscription::TickReason};

/// A publish request waiting for a notification to send
pub struct PendingPublish {
    pub response: oneshot::Sender<SupportedMessage>,
    pub request: Box<PublishRequest>,
    pub ack_results: Option<Vec<StatusCode>>,
    pub deadline: Instant,
}

struct NonAckedPublish {
    message: NotificationMessage,
    subscription_id: u32,
}

/// Identifies who owns a subscription beyond the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentSessionKey {
    pub token: UserToken,
    pub security_mode: MessageSecurityMode,
    pub application_uri: String,
}

impl PersistentSessionKey {
    pub fn new(token: &UserToken, security_mode: MessageSecurityMode, application_uri: &str) -> Self {
        Self {
            token: token.clone(),
            security_mode,
            application_uri: application_uri.to_owned(),
        }
    }

    /// Subscriptions may move to a session of the same identity, made by the same client
    /// application over a channel of the same security mode. This includes anonymous users.
    pub fn is_equivalent_for_transfer(&self, other: &PersistentSessionKey) -> bool {
        self.token == other.token
            && self.security_mode == other.security_mode
            && self.application_uri == other.application_uri
    }
}

struct SubscriptionCacheInner {
    /// Map from session id to subscription cache for that session.
    session_subscriptions: HashMap<u32, Arc<Mutex<SessionSubscriptions>>>,
    /// Map from subscription id to the id of the session owning it.
    subscription_to_session: HashMap<u32, u32>,
}

/// Holds the subscriptions of every session. Lock order is the session map, then a single
/// session, and the node index is never held together with either.
pub struct SubscriptionCache {
    inner: RwLock<SubscriptionCacheInner>,
    /// The monitored items following the value of each node
    monitored_nodes: RwLock<HashMap<NodeId, Vec<MonitoredItemHandle>>>,
    limits: SubscriptionLimits,
}

impl SubscriptionCache {
    pub fn new(limits: SubscriptionLimits) -> Self {
        Self {
            inner: RwLock::new(SubscriptionCacheInner {
                session_subscriptions: HashMap::new(),
                subscription_to_session: HashMap::new(),
            }),
            monitored_nodes: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Runs the sampling and publishing cycles of every subscription. Called by the
    /// subscription timer of the server.
    pub fn periodic_tick(&self) {
        self.tick_at(&Utc::now(), Instant::now());
    }

    pub(crate) fn tick_at(&self, now: &DateTimeUtc, now_instant: Instant) {
        let mut expired = HashSet::new();
        let mut to_delete = Vec::new();
        {
            let lck = trace_read_lock!(self.inner);
            for (session_id, sub) in lck.session_subscriptions.iter() {
                let mut sub_lck = trace_lock!(sub);
                expired.extend(sub_lck.tick(now, now_instant, TickReason::TickTimerFired));
                if sub_lck.is_ready_to_delete() {
                    to_delete.push(*session_id);
                }
            }
        }
        if expired.is_empty() && to_delete.is_empty() {
            return;
        }
        {
            let mut lck = trace_write_lock!(self.inner);
            for subscription_id in &expired {
                lck.subscription_to_session.remove(subscription_id);
            }
            for session_id in to_delete {
                let ready = lck
                    .session_subscriptions
                    .get(&session_id)
                    .map_or(false, |s| trace_lock!(s).is_ready_to_delete());
                if ready {
                    debug!("Removing the subscriptions of closed session {}", session_id);
                    lck.session_subscriptions.remove(&session_id);
                }
            }
        }
        self.forget_subscriptions(&expired);
    }

    fn get(&self, session_id: u32) -> Option<Arc<Mutex<SessionSubscriptions>>> {
        let lck = trace_read_lock!(self.inner);
        lck.session_subscriptions.get(&session_id).cloned()
    }

    /// Finds the subscriptions of the session, failing if the session has none
    fn get_for_session(
        &self,
        session_id: u32,
    ) -> Result<Arc<Mutex<SessionSubscriptions>>, StatusCode> {
        self.get(session_id).ok_or(StatusCode::BadNoSubscription)
    }

    pub fn create_subscription(
        &self,
        session_id: u32,
        key: &PersistentSessionKey,
        request: &CreateSubscriptionRequest,
        info: &ServerInfo,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        let mut lck = trace_write_lock!(self.inner);
        let cache = lck
            .session_subscriptions
            .entry(session_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(SessionSubscriptions::new(self.limits, key.clone())))
            })
            .clone();
        let mut cache_lck = trace_lock!(cache);
        let subscription_id = info.subscription_id_handle.next();
        let response = cache_lck.create_subscription(subscription_id, request)?;
        lck.subscription_to_session
            .insert(subscription_id, session_id);
        info!(
            "Created subscription {} on session {}, publishing interval {} ms",
            subscription_id, session_id, response.revised_publishing_interval
        );
        Ok(response)
    }

    pub fn modify_subscription(
        &self,
        session_id: u32,
        request: &ModifySubscriptionRequest,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let mut cache_lck = trace_lock!(cache);
        cache_lck.modify_subscription(request)
    }

    pub fn set_publishing_mode(
        &self,
        session_id: u32,
        request: &SetPublishingModeRequest,
    ) -> Result<SetPublishingModeResponse, StatusCode> {
        let cache = self.get_for_session(session_id)?;
        let mut cache_lck = trace_lock!(cache);
        cache_lck.set_publishing_mode(request)
    }

    pub fn republish(
        &self,
        session_id: u32,
        request: &RepublishRequest,
    ) -> Result<RepublishResponse, StatusCode> {
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let cache_lck = trace_lock!(cache);
        cache_lck.republish(request)
    }

    /// Queues a publish request. A session without subscriptions gets `BadNoSubscription`
    /// straight away.
    pub fn enqueue_publish_request(
        &self,
        session_id: u32,
        now: &DateTimeUtc,
        now_instant: Instant,
        request: PendingPublish,
    ) {
        match self.get(session_id) {
            Some(cache) => {
                let mut cache_lck = trace_lock!(cache);
                cache_lck.enqueue_publish_request(now, now_instant, request);
            }
            None => {
                let _ = request.response.send(
                    ServiceFault::new(
                        &request.request.request_header,
                        StatusCode::BadNoSubscription,
                    )
                    .into(),
                );
            }
        }
    }

    /// Answers every publish request waiting on the session, e.g. because its channel closed
    pub fn cancel_publish_requests(&self, session_id: u32, status: StatusCode) {
        if let Some(cache) = self.get(session_id) {
            trace_lock!(cache).cancel_publish_requests(status);
        }
    }

    /// Handles the end of a session. Its subscriptions are either deleted or detached, in which
    /// case they keep running until they expire or are transferred. Either way waiting publish
    /// requests are answered with `BadSessionClosed`.
    pub fn close_session(&self, session_id: u32, delete_subscriptions: bool) {
        if delete_subscriptions {
            let deleted = {
                let mut lck = trace_write_lock!(self.inner);
                let Some(cache) = lck.session_subscriptions.remove(&session_id) else {
                    return;
                };
                let mut cache_lck = trace_lock!(cache);
                cache_lck.cancel_publish_requests(StatusCode::BadSessionClosed);
                let ids = cache_lck.subscription_ids();
                for id in &ids {
                    lck.subscription_to_session.remove(id);
                }
                ids
            };
            if !deleted.is_empty() {
                info!(
                    "Deleted subscriptions {:?} of closed session {}",
                    deleted, session_id
                );
            }
            self.forget_subscriptions(&deleted.into_iter().collect());
        } else if let Some(cache) = self.get(session_id) {
            let mut cache_lck = trace_lock!(cache);
            cache_lck.detach();
            debug!(
                "Detached subscriptions {:?} of closed session {}",
                cache_lck.subscription_ids(),
                session_id
            );
        }
    }

    /// The ids of the subscriptions owned by the session
    pub fn session_subscription_ids(&self, session_id: u32) -> Vec<u32> {
        self.get(session_id)
            .map(|cache| trace_lock!(cache).subscription_ids())
            .unwrap_or_default()
    }

    /// The owning session of a subscription
    pub fn subscription_owner(&self, subscription_id: u32) -> Option<u32> {
        let lck = trace_read_lock!(self.inner);
        lck.subscription_to_session.get(&subscription_id).copied()
    }

    pub fn delete_subscriptions(
        &self,
        session_id: u32,
        ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let (results, deleted) = {
            let mut lck = trace_write_lock!(self.inner);
            let Some(cache) = lck.session_subscriptions.get(&session_id).cloned() else {
                return Err(StatusCode::BadNoSubscription);
            };
            let mut cache_lck = trace_lock!(cache);
            let mut deleted = HashSet::new();
            let results = ids
                .iter()
                .map(|id| {
                    if cache_lck.remove(*id).0.is_some() {
                        lck.subscription_to_session.remove(id);
                        deleted.insert(*id);
                        StatusCode::Good
                    } else {
                        StatusCode::BadSubscriptionIdInvalid
                    }
                })
                .collect();
            (results, deleted)
        };
        self.forget_subscriptions(&deleted);
        Ok(results)
    }

    /// Moves subscriptions to the session. The previous owner, if still connected, is told
    /// with a `GoodSubscriptionTransferred` status change.
    pub fn transfer(
        &self,
        request: &TransferSubscriptionsRequest,
        session_id: u32,
        key: &PersistentSessionKey,
    ) -> TransferSubscriptionsResponse {
        let now = Utc::now();
        let ids = request.subscription_ids.as_deref().unwrap_or_default();
        let mut results = Vec::with_capacity(ids.len());
        {
            let mut lck = trace_write_lock!(self.inner);
            let target = lck
                .session_subscriptions
                .entry(session_id)
                .or_insert_with(|| {
                    Arc::new(Mutex::new(SessionSubscriptions::new(self.limits, key.clone())))
                })
                .clone();
            let mut emptied = Vec::new();

            for subscription_id in ids {
                let owner_id = lck.subscription_to_session.get(subscription_id).copied();
                let result = match owner_id {
                    None => TransferResult {
                        status_code: StatusCode::BadSubscriptionIdInvalid,
                        available_sequence_numbers: None,
                    },
                    Some(owner_id) if owner_id == session_id => {
                        let mut target_lck = trace_lock!(target);
                        if request.send_initial_values {
                            if let Some(sub) = target_lck.get_mut(*subscription_id) {
                                sub.set_resend_data();
                            }
                        }
                        TransferResult {
                            status_code: StatusCode::Good,
                            available_sequence_numbers: target_lck
                                .available_sequence_numbers(*subscription_id),
                        }
                    }
                    Some(owner_id) => {
                        let Some(owner) = lck.session_subscriptions.get(&owner_id).cloned() else {
                            results.push(TransferResult {
                                status_code: StatusCode::BadSubscriptionIdInvalid,
                                available_sequence_numbers: None,
                            });
                            continue;
                        };
                        let mut owner_lck = trace_lock!(owner);
                        let mut target_lck = trace_lock!(target);
                        if !owner_lck.key().is_equivalent_for_transfer(key) {
                            warn!(
                                "Subscription {} cannot be transferred to session {}, the identity differs",
                                subscription_id, session_id
                            );
                            TransferResult {
                                status_code: StatusCode::BadUserAccessDenied,
                                available_sequence_numbers: None,
                            }
                        } else {
                            match owner_lck.remove(*subscription_id) {
                                (Some(mut sub), notifications) => {
                                    let status_change = sub.make_status_change(
                                        &now,
                                        StatusCode::GoodSubscriptionTransferred,
                                    );
                                    if request.send_initial_values {
                                        sub.set_resend_data();
                                    }
                                    match target_lck.insert(sub, notifications) {
                                        Ok(()) => {
                                            owner_lck
                                                .enqueue_status_change(*subscription_id, status_change);
                                            if owner_lck.is_ready_to_delete() {
                                                emptied.push(owner_id);
                                            }
                                            lck.subscription_to_session
                                                .insert(*subscription_id, session_id);
                                            info!(
                                                "Transferred subscription {} from session {} to session {}",
                                                subscription_id, owner_id, session_id
                                            );
                                            TransferResult {
                                                status_code: StatusCode::Good,
                                                available_sequence_numbers: target_lck
                                                    .available_sequence_numbers(*subscription_id),
                                            }
                                        }
                                        Err((status_code, sub, notifications)) => {
                                            // Give it back, the owner had room for it before
                                            if let Err((status, sub, _)) =
                                                owner_lck.insert(sub, notifications)
                                            {
                                                error!(
                                                    "Subscription {} was lost returning it to session {}, {}",
                                                    sub.id(), owner_id, status
                                                );
                                                lck.subscription_to_session.remove(subscription_id);
                                            }
                                            TransferResult {
                                                status_code,
                                                available_sequence_numbers: None,
                                            }
                                        }
                                    }
                                }
                                (None, _) => TransferResult {
                                    status_code: StatusCode::BadSubscriptionIdInvalid,
                                    available_sequence_numbers: None,
                                },
                            }
                        }
                    }
                };
                results.push(result);
            }
            for owner_id in emptied {
                lck.session_subscriptions.remove(&owner_id);
            }
        }
        TransferSubscriptionsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        }
    }

    /// Creates monitored items. The initial value of each item is read from the address space
    /// before any lock of the cache is taken.
    pub fn create_monitored_items(
        &self,
        session_id: u32,
        request: &CreateMonitoredItemsRequest,
        info: &ServerInfo,
        address_space: &AddressSpace,
    ) -> Result<Vec<MonitoredItemCreateResult>, StatusCode> {
        if request.timestamps_to_return == TimestampsToReturn::Invalid {
            return Err(StatusCode::BadTimestampsToReturnInvalid);
        }
        let items_to_create = request.items_to_create.as_deref().unwrap_or_default();
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        if !trace_lock!(cache).contains(request.subscription_id) {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        }

        let initial_values = items_to_create
            .iter()
            .map(|item| {
                let item = &item.item_to_monitor;
                let value = address_space.read_attribute(
                    &item.node_id,
                    item.attribute_id,
                    &UAString::null(),
                    &item.data_encoding,
                    TimestampsToReturn::Both,
                );
                if value.value.is_none() && value.status().is_bad() {
                    Err(value.status())
                } else {
                    Ok(value)
                }
            })
            .collect::<Vec<_>>();

        let decoding_options = info.decoding_options();
        let mut new_handles = Vec::new();
        let results = {
            let mut cache_lck = trace_lock!(cache);
            let Some(subscription) = cache_lck.get_mut(request.subscription_id) else {
                return Err(StatusCode::BadSubscriptionIdInvalid);
            };
            let publishing_interval_ms = subscription.publishing_interval_ms();
            items_to_create
                .iter()
                .zip(initial_values)
                .map(|(item_to_create, initial_value)| {
                    let result = initial_value.and_then(|initial_value| {
                        let max_items = self.limits.max_monitored_items_per_sub;
                        if max_items > 0 && subscription.len() >= max_items {
                            return Err(StatusCode::BadTooManyMonitoredItems);
                        }
                        MonitoredItem::new(
                            info.monitored_item_id_handle.next(),
                            item_to_create,
                            request.timestamps_to_return,
                            &self.limits,
                            publishing_interval_ms,
                            &decoding_options,
                            initial_value,
                        )
                    });
                    match result {
                        Ok(item) => {
                            let result = MonitoredItemCreateResult {
                                status_code: StatusCode::Good,
                                monitored_item_id: item.id(),
                                revised_sampling_interval: item.sampling_interval(),
                                revised_queue_size: item.queue_size() as u32,
                                filter_result: ExtensionObject::null(),
                            };
                            if item.monitors_value() {
                                new_handles.push((
                                    item.item_to_monitor().node_id.clone(),
                                    MonitoredItemHandle {
                                        subscription_id: request.subscription_id,
                                        monitored_item_id: item.id(),
                                    },
                                ));
                            }
                            subscription.insert(item);
                            result
                        }
                        Err(status_code) => {
                            debug!(
                                "Cannot create monitored item for {}, {}",
                                item_to_create.item_to_monitor.node_id, status_code
                            );
                            MonitoredItemCreateResult {
                                status_code,
                                monitored_item_id: 0,
                                revised_sampling_interval: 0.0,
                                revised_queue_size: 0,
                                filter_result: ExtensionObject::null(),
                            }
                        }
                    }
                })
                .collect::<Vec<_>>()
        };

        if !new_handles.is_empty() {
            let mut nodes = trace_write_lock!(self.monitored_nodes);
            for (node_id, handle) in new_handles {
                nodes.entry(node_id).or_default().push(handle);
            }
        }
        Ok(results)
    }

    pub fn modify_monitored_items(
        &self,
        session_id: u32,
        request: &ModifyMonitoredItemsRequest,
        info: &ServerInfo,
    ) -> Result<Vec<MonitoredItemModifyResult>, StatusCode> {
        if request.timestamps_to_return == TimestampsToReturn::Invalid {
            return Err(StatusCode::BadTimestampsToReturnInvalid);
        }
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let mut cache_lck = trace_lock!(cache);
        let Some(subscription) = cache_lck.get_mut(request.subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        let publishing_interval_ms = subscription.publishing_interval_ms();
        let decoding_options = info.decoding_options();
        let items_to_modify = request.items_to_modify.as_deref().unwrap_or_default();
        Ok(items_to_modify
            .iter()
            .map(|item_to_modify| {
                let result = match subscription.get_mut(&item_to_modify.monitored_item_id) {
                    Some(item) => item
                        .modify(
                            item_to_modify,
                            request.timestamps_to_return,
                            &self.limits,
                            publishing_interval_ms,
                            &decoding_options,
                        )
                        .map(|_| (item.sampling_interval(), item.queue_size())),
                    None => Err(StatusCode::BadMonitoredItemIdInvalid),
                };
                match result {
                    Ok((revised_sampling_interval, revised_queue_size)) => {
                        MonitoredItemModifyResult {
                            status_code: StatusCode::Good,
                            revised_sampling_interval,
                            revised_queue_size: revised_queue_size as u32,
                            filter_result: ExtensionObject::null(),
                        }
                    }
                    Err(status_code) => MonitoredItemModifyResult {
                        status_code,
                        revised_sampling_interval: 0.0,
                        revised_queue_size: 0,
                        filter_result: ExtensionObject::null(),
                    },
                }
            })
            .collect())
    }

    pub fn set_monitoring_mode(
        &self,
        session_id: u32,
        subscription_id: u32,
        monitoring_mode: MonitoringMode,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let mut cache_lck = trace_lock!(cache);
        let Some(subscription) = cache_lck.get_mut(subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        Ok(monitored_item_ids
            .iter()
            .map(|id| {
                let Some(item) = subscription.get_mut(id) else {
                    return StatusCode::BadMonitoredItemIdInvalid;
                };
                item.set_monitoring_mode(monitoring_mode);
                if item.is_reporting() && item.has_notifications() {
                    subscription.mark_notified(*id);
                }
                StatusCode::Good
            })
            .collect())
    }

    pub fn delete_monitored_items(
        &self,
        session_id: u32,
        subscription_id: u32,
        monitored_item_ids: &[u32],
    ) -> Result<Vec<StatusCode>, StatusCode> {
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let mut removed = Vec::new();
        let results = {
            let mut cache_lck = trace_lock!(cache);
            let Some(subscription) = cache_lck.get_mut(subscription_id) else {
                return Err(StatusCode::BadSubscriptionIdInvalid);
            };
            monitored_item_ids
                .iter()
                .map(|id| match subscription.remove(id) {
                    Some(item) => {
                        removed.push((
                            item.item_to_monitor().node_id.clone(),
                            MonitoredItemHandle {
                                subscription_id,
                                monitored_item_id: *id,
                            },
                        ));
                        StatusCode::Good
                    }
                    None => StatusCode::BadMonitoredItemIdInvalid,
                })
                .collect()
        };
        if !removed.is_empty() {
            let mut nodes = trace_write_lock!(self.monitored_nodes);
            for (node_id, handle) in removed {
                if let Some(handles) = nodes.get_mut(&node_id) {
                    handles.retain(|h| *h != handle);
                    if handles.is_empty() {
                        nodes.remove(&node_id);
                    }
                }
            }
        }
        Ok(results)
    }

    /// The server and client handles of the monitored items of a subscription owned by the
    /// session.
    pub fn get_monitored_items(
        &self,
        session_id: u32,
        subscription_id: u32,
    ) -> Result<(Vec<u32>, Vec<u32>), StatusCode> {
        match self.subscription_owner(subscription_id) {
            None => return Err(StatusCode::BadSubscriptionIdInvalid),
            Some(owner) if owner != session_id => return Err(StatusCode::BadUserAccessDenied),
            Some(_) => {}
        }
        let cache = self
            .get(session_id)
            .ok_or(StatusCode::BadSubscriptionIdInvalid)?;
        let cache_lck = trace_lock!(cache);
        cache_lck
            .get(subscription_id)
            .map(|s| s.monitored_item_handles())
            .ok_or(StatusCode::BadSubscriptionIdInvalid)
    }

    /// Drops the node index entries of subscriptions that no longer exist
    fn forget_subscriptions(&self, subscription_ids: &HashSet<u32>) {
        if subscription_ids.is_empty() {
            return;
        }
        let mut nodes = trace_write_lock!(self.monitored_nodes);
        nodes.retain(|_, handles| {
            handles.retain(|h| !subscription_ids.contains(&h.subscription_id));
            !handles.is_empty()
        });
    }

    /// The number of monitored items following changes of the node
    pub fn monitored_node_count(&self, node_id: &NodeId) -> usize {
        let nodes = trace_read_lock!(self.monitored_nodes);
        nodes.get(node_id).map_or(0, |h| h.len())
    }
}

impl DataChangeListener for SubscriptionCache {
    fn data_changed(&self, node_id: &NodeId, value: &DataValue) {
        let handles = {
            let nodes = trace_read_lock!(self.monitored_nodes);
            match nodes.get(node_id) {
                Some(handles) if !handles.is_empty() => handles.clone(),
                _ => return,
            }
        };
        let lck = trace_read_lock!(self.inner);
        let mut by_session: HashMap<u32, Vec<MonitoredItemHandle>> = HashMap::new();
        for handle in handles {
            if let Some(session_id) = lck.subscription_to_session.get(&handle.subscription_id) {
                by_session.entry(*session_id).or_default().push(handle);
            }
        }
        for (session_id, handles) in by_session {
            if let Some(cache) = lck.session_subscriptions.get(&session_id) {
                trace_lock!(cache).notify_data_changes(&handles, value);
            }
        }
    }
}

#[cfg(test)]
mod tests;
