// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{collections::VecDeque, time::Instant};

use hashbrown::HashMap;

use crate::{
    server::config::SubscriptionLimits,
    types::{
        service_types::{
            CreateSubscriptionRequest, CreateSubscriptionResponse, ModifySubscriptionRequest,
            ModifySubscriptionResponse, PublishRequest, PublishResponse, RepublishRequest,
            RepublishResponse, ServiceFault, SetPublishingModeRequest, SetPublishingModeResponse,
        },
        DataValue, DateTime, DateTimeUtc, NotificationMessage, ResponseHeader, StatusCode,
    },
};

use super::{
    subscription::{MonitoredItemHandle, Subscription, SubscriptionSettings, TickReason},
    NonAckedPublish, PendingPublish, PersistentSessionKey,
};

/// Subscriptions belonging to a single session. They are owned by the identity that created
/// them, so they can be transfered to a different session of the same identity.
pub(super) struct SessionSubscriptions {
    /// Identity of the session that created the subscriptions, used for transfers.
    key: PersistentSessionKey,
    subscriptions: HashMap<u32, Subscription>,
    /// Publish requests waiting for notifications, in arrival order
    publish_request_queue: VecDeque<PendingPublish>,
    /// Notifications that have been sent but have yet to be acknowledged.
    retransmission_queue: VecDeque<NonAckedPublish>,
    /// Status changes of subscriptions that left this session, e.g. expired or transferred.
    status_changes: VecDeque<NonAckedPublish>,
    /// Set once the session is gone. The subscriptions keep running until they expire or are
    /// transferred.
    detached: bool,
    limits: SubscriptionLimits,
}

impl SessionSubscriptions {
    pub(super) fn new(limits: SubscriptionLimits, key: PersistentSessionKey) -> Self {
        Self {
            key,
            subscriptions: HashMap::new(),
            publish_request_queue: VecDeque::new(),
            retransmission_queue: VecDeque::new(),
            status_changes: VecDeque::new(),
            detached: false,
            limits,
        }
    }

    fn max_publish_requests(&self) -> usize {
        self.limits
            .max_pending_publish_requests
            .min(self.subscriptions.len() * self.limits.max_publish_requests_per_subscription)
            .max(1)
    }

    pub(super) fn key(&self) -> &PersistentSessionKey {
        &self.key
    }

    pub(super) fn is_detached(&self) -> bool {
        self.detached
    }

    /// Detaches the subscriptions from their session and answers every waiting publish request
    pub(super) fn detach(&mut self) {
        self.detached = true;
        self.status_changes.clear();
        self.cancel_publish_requests(StatusCode::BadSessionClosed);
    }

    pub(super) fn is_ready_to_delete(&self) -> bool {
        self.detached && self.subscriptions.is_empty()
    }

    pub(super) fn subscription_ids(&self) -> Vec<u32> {
        let mut ids = self.subscriptions.keys().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    pub(super) fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.contains_key(&subscription_id)
    }

    pub(super) fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub(super) fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    /// Adds a subscription transferred from another session along with its unacknowledged
    /// notifications.
    pub(super) fn insert(
        &mut self,
        subscription: Subscription,
        notifications: Vec<NonAckedPublish>,
    ) -> Result<(), (StatusCode, Subscription, Vec<NonAckedPublish>)> {
        if self.subscriptions.len() >= self.limits.max_subscriptions_per_session {
            return Err((StatusCode::BadTooManySubscriptions, subscription, notifications));
        }
        self.subscriptions.insert(subscription.id(), subscription);
        self.retransmission_queue.extend(notifications);
        Ok(())
    }

    /// Removes a subscription and the notifications of it still awaiting acknowledgement
    pub(super) fn remove(
        &mut self,
        subscription_id: u32,
    ) -> (Option<Subscription>, Vec<NonAckedPublish>) {
        let (notifications, retained): (Vec<_>, Vec<_>) = self
            .retransmission_queue
            .drain(..)
            .partition(|n| n.subscription_id == subscription_id);
        self.retransmission_queue = retained.into();
        (self.subscriptions.remove(&subscription_id), notifications)
    }

    /// Queues a status change for the next publish request, unless no client is listening
    pub(super) fn enqueue_status_change(&mut self, subscription_id: u32, message: NotificationMessage) {
        if self.detached {
            return;
        }
        if self.status_changes.len() >= self.limits.max_queued_notifications.max(1) {
            self.status_changes.pop_front();
        }
        self.status_changes.push_back(NonAckedPublish {
            message,
            subscription_id,
        });
    }

    pub(super) fn create_subscription(
        &mut self,
        subscription_id: u32,
        request: &CreateSubscriptionRequest,
    ) -> Result<CreateSubscriptionResponse, StatusCode> {
        if self.subscriptions.len() >= self.limits.max_subscriptions_per_session {
            return Err(StatusCode::BadTooManySubscriptions);
        }
        let settings = self.revise_settings(
            request.requested_publishing_interval,
            request.requested_max_keep_alive_count,
            request.requested_lifetime_count,
            request.priority,
            request.max_notifications_per_publish,
        );
        let subscription = Subscription::new(
            subscription_id,
            request.publishing_enabled,
            settings,
            self.limits.max_queued_notifications,
        );
        self.subscriptions.insert(subscription_id, subscription);
        Ok(CreateSubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            subscription_id,
            revised_publishing_interval: settings.publishing_interval_ms,
            revised_lifetime_count: settings.lifetime_count,
            revised_max_keep_alive_count: settings.max_keep_alive_count,
        })
    }

    pub(super) fn modify_subscription(
        &mut self,
        request: &ModifySubscriptionRequest,
    ) -> Result<ModifySubscriptionResponse, StatusCode> {
        let settings = self.revise_settings(
            request.requested_publishing_interval,
            request.requested_max_keep_alive_count,
            request.requested_lifetime_count,
            request.priority,
            request.max_notifications_per_publish,
        );
        let Some(subscription) = self.subscriptions.get_mut(&request.subscription_id) else {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        };
        subscription.apply_settings(settings);

        Ok(ModifySubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            revised_publishing_interval: settings.publishing_interval_ms,
            revised_lifetime_count: settings.lifetime_count,
            revised_max_keep_alive_count: settings.max_keep_alive_count,
        })
    }

    pub(super) fn set_publishing_mode(
        &mut self,
        request: &SetPublishingModeRequest,
    ) -> Result<SetPublishingModeResponse, StatusCode> {
        let ids = match request.subscription_ids {
            Some(ref ids) if !ids.is_empty() => ids,
            _ => return Err(StatusCode::BadNothingToDo),
        };
        let results = ids
            .iter()
            .map(|id| match self.subscriptions.get_mut(id) {
                Some(subscription) => {
                    subscription.set_publishing_enabled(request.publishing_enabled);
                    StatusCode::Good
                }
                None => StatusCode::BadSubscriptionIdInvalid,
            })
            .collect();
        Ok(SetPublishingModeResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
            diagnostic_infos: None,
        })
    }

    pub(super) fn republish(
        &self,
        request: &RepublishRequest,
    ) -> Result<RepublishResponse, StatusCode> {
        let notification_message = self.find_notification_message(
            request.subscription_id,
            request.retransmit_sequence_number,
        )?;
        Ok(RepublishResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            notification_message,
        })
    }

    /// Takes the requested values passed in a create / modify and returns revised values that
    /// conform to the server's limits, as (publishing interval, keep alive count, lifetime count).
    /// Clamps the requested values to the configured limits. A NaN interval or a keep alive
    /// count of 0 take the defaults, the lifetime is stretched to cover three keep alives.
    fn revise_settings(
        &self,
        publishing_interval_ms: f64,
        max_keep_alive_count: u32,
        lifetime_count: u32,
        priority: u8,
        max_notifications_per_publish: u32,
    ) -> SubscriptionSettings {
        let limits = &self.limits;
        let publishing_interval_ms = if publishing_interval_ms.is_nan() {
            limits.min_publishing_interval_ms
        } else {
            publishing_interval_ms.max(limits.min_publishing_interval_ms)
        };
        let max_keep_alive_count = match max_keep_alive_count {
            0 => limits.default_keep_alive_count,
            n => n.min(limits.max_keep_alive_count),
        };
        let lifetime_count = lifetime_count
            .min(limits.max_lifetime_count)
            .max(max_keep_alive_count.saturating_mul(3));
        let max_notifications = limits.max_notifications_per_publish as usize;
        let requested = max_notifications_per_publish as usize;
        let max_notifications_per_publish =
            if max_notifications > 0 && (requested == 0 || requested > max_notifications) {
                max_notifications
            } else {
                requested
            };
        SubscriptionSettings {
            publishing_interval_ms,
            max_keep_alive_count,
            lifetime_count,
            priority,
            max_notifications_per_publish,
        }
    }

    pub(super) fn enqueue_publish_request(
        &mut self,
        now: &DateTimeUtc,
        now_instant: Instant,
        mut request: PendingPublish,
    ) {
        if self.publish_request_queue.len() >= self.max_publish_requests() {
            // Tick first, that may answer a request and make space
            self.tick(now, now_instant, TickReason::ReceivePublishRequest);
        }
        if self.publish_request_queue.len() >= self.max_publish_requests() {
            if let Some(oldest) = self.publish_request_queue.pop_front() {
                debug!("Too many publish requests, rejecting the oldest");
                // A failed send only means the connection is gone
                let _ = oldest.response.send(
                    ServiceFault::new(
                        &oldest.request.request_header,
                        StatusCode::BadTooManyPublishRequests,
                    )
                    .into(),
                );
            }
        }

        request.ack_results = self.process_subscription_acks(&request.request);
        // A publish request is client activity for every subscription of the session
        for subscription in self.subscriptions.values_mut() {
            subscription.reset_lifetime();
        }
        self.publish_request_queue.push_back(request);
        self.tick(now, now_instant, TickReason::ReceivePublishRequest);
    }

    /// Answers every waiting publish request with a fault
    pub(super) fn cancel_publish_requests(&mut self, status: StatusCode) {
        for publish_request in self.publish_request_queue.drain(..) {
            let _ = publish_request
                .response
                .send(ServiceFault::new(&publish_request.request.request_header, status).into());
        }
    }

    /// Runs the subscriptions and pairs their notifications with waiting publish requests.
    /// Returns the ids of subscriptions that expired and were removed.
    pub(super) fn tick(
        &mut self,
        now: &DateTimeUtc,
        now_instant: Instant,
        tick_reason: TickReason,
    ) -> Vec<u32> {
        self.remove_expired_publish_requests(now_instant);

        let mut responses = Vec::new();
        while !self.publish_request_queue.is_empty() {
            let Some(status_change) = self.status_changes.pop_front() else {
                break;
            };
            if let Some(publish_request) = self.publish_request_queue.pop_front() {
                responses.push((
                    publish_request,
                    status_change.message,
                    status_change.subscription_id,
                    false,
                ));
            }
        }

        if self.subscriptions.is_empty() {
            if self.status_changes.is_empty() {
                for publish_request in self.publish_request_queue.drain(..) {
                    let _ = publish_request.response.send(
                        ServiceFault::new(
                            &publish_request.request.request_header,
                            StatusCode::BadNoSubscription,
                        )
                        .into(),
                    );
                }
            }
            self.send_responses(now, responses, false);
            return Vec::new();
        }

        // Highest priority first
        let mut subscription_ids = self
            .subscriptions
            .values()
            .map(|s| (s.id(), s.priority()))
            .collect::<Vec<_>>();
        subscription_ids.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut more_notifications = false;
        let mut expired = Vec::new();

        for (subscription_id, _) in subscription_ids {
            let publishing_req_queued = !self.publish_request_queue.is_empty();
            let Some(subscription) = self.subscriptions.get_mut(&subscription_id) else {
                continue;
            };
            subscription.tick(now, now_instant, tick_reason, publishing_req_queued);
            if subscription.is_closed() {
                // The final status change goes out through the session queue
                for message in subscription.take_notifications() {
                    if self.detached {
                        continue;
                    }
                    match self.publish_request_queue.pop_front() {
                        Some(publish_request) => {
                            responses.push((publish_request, message, subscription_id, false))
                        }
                        None => self.status_changes.push_back(NonAckedPublish {
                            message,
                            subscription_id,
                        }),
                    }
                }
                expired.push(subscription_id);
                continue;
            }
            // Pair notifications with publish requests while there are any of either left
            while !self.publish_request_queue.is_empty() {
                let Some(message) = subscription.take_notification() else {
                    break;
                };
                if let Some(publish_request) = self.publish_request_queue.pop_front() {
                    let retransmit = !message.is_keep_alive();
                    responses.push((publish_request, message, subscription_id, retransmit));
                }
            }
            more_notifications |= subscription.more_notifications();
        }

        for subscription_id in &expired {
            self.subscriptions.remove(subscription_id);
            self.retransmission_queue
                .retain(|n| n.subscription_id != *subscription_id);
        }

        self.send_responses(now, responses, more_notifications);
        expired
    }

    fn send_responses(
        &mut self,
        now: &DateTimeUtc,
        responses: Vec<(PendingPublish, NotificationMessage, u32, bool)>,
        more_notifications: bool,
    ) {
        let num_responses = responses.len();
        for (idx, (publish_request, message, subscription_id, retransmit)) in
            responses.into_iter().enumerate()
        {
            let is_last = idx + 1 == num_responses;
            if retransmit {
                if self.retransmission_queue.len() >= self.max_publish_requests() * 2 {
                    self.retransmission_queue.pop_front();
                }
                self.retransmission_queue.push_back(NonAckedPublish {
                    message: message.clone(),
                    subscription_id,
                });
            }
            let available_sequence_numbers = self.available_sequence_numbers(subscription_id);
            let _ = publish_request.response.send(
                PublishResponse {
                    response_header: ResponseHeader::with_timestamp(
                        DateTime::from(*now),
                        publish_request.request.request_header.request_handle,
                        StatusCode::Good,
                    ),
                    subscription_id,
                    available_sequence_numbers,
                    // Only set more_notifications on the last publish response
                    more_notifications: is_last && more_notifications,
                    notification_message: message,
                    results: publish_request.ack_results,
                    diagnostic_infos: None,
                }
                .into(),
            );
        }
    }

    fn find_notification_message(
        &self,
        subscription_id: u32,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        if !self.subscriptions.contains_key(&subscription_id) {
            return Err(StatusCode::BadSubscriptionIdInvalid);
        }
        self.retransmission_queue
            .iter()
            .find(|n| {
                n.subscription_id == subscription_id
                    && n.message.sequence_number == sequence_number
            })
            .map(|n| n.message.clone())
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    fn remove_expired_publish_requests(&mut self, now: Instant) {
        let (expired, waiting): (Vec<_>, Vec<_>) = self
            .publish_request_queue
            .drain(..)
            .partition(|p| p.deadline < now);
        self.publish_request_queue = waiting.into();
        for publish_request in expired {
            debug!(
                "Publish request {} timed out",
                publish_request.request.request_header.request_handle
            );
            let _ = publish_request.response.send(
                ServiceFault::new(&publish_request.request.request_header, StatusCode::BadTimeout)
                    .into(),
            );
        }
    }

    fn process_subscription_acks(&mut self, request: &PublishRequest) -> Option<Vec<StatusCode>> {
        let acks = request.subscription_acknowledgements.as_ref()?;
        if acks.is_empty() {
            return None;
        }
        Some(
            acks.iter()
                .map(|ack| {
                    if !self.subscriptions.contains_key(&ack.subscription_id) {
                        StatusCode::BadSubscriptionIdInvalid
                    } else if let Some(idx) = self.retransmission_queue.iter().position(|n| {
                        n.subscription_id == ack.subscription_id
                            && n.message.sequence_number == ack.sequence_number
                    }) {
                        self.retransmission_queue.remove(idx);
                        StatusCode::Good
                    } else {
                        StatusCode::BadSequenceNumberUnknown
                    }
                })
                .collect(),
        )
    }

    /// Returns the sequence numbers in the retransmission queue for the subscription
    pub(super) fn available_sequence_numbers(&self, subscription_id: u32) -> Option<Vec<u32>> {
        let sequence_numbers = self
            .retransmission_queue
            .iter()
            .filter(|n| n.subscription_id == subscription_id)
            .map(|n| n.message.sequence_number)
            .collect::<Vec<_>>();
        if sequence_numbers.is_empty() {
            None
        } else {
            Some(sequence_numbers)
        }
    }

    pub(super) fn notify_data_changes(&mut self, values: &[MonitoredItemHandle], value: &DataValue) {
        for handle in values {
            if let Some(subscription) = self.subscriptions.get_mut(&handle.subscription_id) {
                subscription.notify_data_value(&handle.monitored_item_id, value.clone());
            }
        }
    }
}
