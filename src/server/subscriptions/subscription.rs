// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::{Duration, Instant},
};

use crate::{
    core::handle::Handle,
    types::{DataValue, DateTime, DateTimeUtc, NotificationMessage, StatusCode},
};

use super::monitored_item::MonitoredItem;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SubscriptionState {
    Closed,
    Creating,
    Normal,
    Late,
    KeepAlive,
}

/// Identifies a monitored item across the whole server
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MonitoredItemHandle {
    pub subscription_id: u32,
    pub monitored_item_id: u32,
}

/// Revised values of a CreateSubscription or ModifySubscription request
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SubscriptionSettings {
    pub publishing_interval_ms: f64,
    pub max_keep_alive_count: u32,
    pub lifetime_count: u32,
    pub priority: u8,
    /// 0 for no limit
    pub max_notifications_per_publish: usize,
}

impl SubscriptionSettings {
    fn publishing_interval(&self) -> Duration {
        Duration::from_micros((self.publishing_interval_ms * 1000.0) as u64)
    }
}

#[derive(Debug)]
pub(super) struct SubscriptionStateParams {
    pub notifications_available: bool,
    pub more_notifications: bool,
    pub publishing_req_queued: bool,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) enum UpdateStateAction {
    None,
    ReturnKeepAlive,
    ReturnNotifications,
    SubscriptionCreated,
    /// No client activity for the whole lifetime
    SubscriptionExpired,
}

/// The state table rows of OPC UA Part 4 5.13.1.2, numbered as in the table.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) enum HandledState {
    None0 = 0,
    Create3 = 3,
    Normal4 = 4,
    Normal5 = 5,
    IntervalElapsed6 = 6,
    IntervalElapsed7 = 7,
    IntervalElapsed8 = 8,
    IntervalElapsed9 = 9,
    Late10 = 10,
    Late11 = 11,
    Late12 = 12,
    KeepAlive13 = 13,
    KeepAlive14 = 14,
    KeepAlive15 = 15,
    KeepAlive16 = 16,
    KeepAlive17 = 17,
    Closed27 = 27,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum TickReason {
    ReceivePublishRequest,
    TickTimerFired,
}

#[derive(Debug)]
pub struct Subscription {
    id: u32,
    settings: SubscriptionSettings,
    publishing_interval: Duration,
    publishing_enabled: bool,
    state: SubscriptionState,
    monitored_items: HashMap<u32, MonitoredItem>,
    /// Items that queued something since the last publishing cycle
    notified_monitored_items: HashSet<u32>,
    /// Cycles left without client activity before the subscription expires
    lifetime_counter: u32,
    /// Cycles left without notifications before a keep alive goes out
    keep_alive_counter: u32,
    /// False until the first notification or keep alive was queued
    first_message_sent: bool,
    /// Report the latest value of every item in the next cycle
    resend_data: bool,
    sequence_number: Handle,
    /// Sequence number of the last data or status message queued
    last_sequence_number: u32,
    last_cycle: Instant,
    /// Messages waiting for a publish request, oldest first
    notifications: VecDeque<NotificationMessage>,
    max_queued_notifications: usize,
}

impl Subscription {
    pub fn new(
        id: u32,
        publishing_enabled: bool,
        settings: SubscriptionSettings,
        max_queued_notifications: usize,
    ) -> Self {
        Self {
            id,
            publishing_interval: settings.publishing_interval(),
            lifetime_counter: settings.lifetime_count,
            keep_alive_counter: settings.max_keep_alive_count,
            settings,
            publishing_enabled,
            state: SubscriptionState::Creating,
            monitored_items: HashMap::new(),
            notified_monitored_items: HashSet::new(),
            first_message_sent: false,
            resend_data: false,
            sequence_number: Handle::new(1),
            last_sequence_number: 0,
            last_cycle: Instant::now(),
            notifications: VecDeque::new(),
            max_queued_notifications: max_queued_notifications.max(1),
        }
    }

    /// Takes over the settings of a ModifySubscription request. Both counters start over.
    pub(super) fn apply_settings(&mut self, settings: SubscriptionSettings) {
        self.publishing_interval = settings.publishing_interval();
        self.settings = settings;
        self.reset_lifetime();
        self.reset_keep_alive();
    }

    /// SetPublishingMode counts as client activity
    pub(super) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
        self.reset_lifetime();
    }

    pub fn len(&self) -> usize {
        self.monitored_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitored_items.is_empty()
    }

    pub fn get(&self, id: &u32) -> Option<&MonitoredItem> {
        self.monitored_items.get(id)
    }

    pub(super) fn get_mut(&mut self, id: &u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(id)
    }

    pub fn contains_key(&self, id: &u32) -> bool {
        self.monitored_items.contains_key(id)
    }

    pub(super) fn insert(&mut self, item: MonitoredItem) {
        if item.has_notifications() {
            self.notified_monitored_items.insert(item.id());
        }
        self.monitored_items.insert(item.id(), item);
    }

    pub(super) fn remove(&mut self, id: &u32) -> Option<MonitoredItem> {
        self.notified_monitored_items.remove(id);
        self.monitored_items.remove(id)
    }

    pub(super) fn monitored_items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.monitored_items.values()
    }

    /// Looks at the item in the next cycle even if it queued nothing new
    pub(super) fn mark_notified(&mut self, id: u32) {
        self.notified_monitored_items.insert(id);
    }

    pub(super) fn set_resend_data(&mut self) {
        self.resend_data = true;
    }

    pub fn notify_data_value(&mut self, id: &u32, value: DataValue) {
        let queued = self
            .monitored_items
            .get_mut(id)
            .map_or(false, |item| item.notify_data_value(value));
        if queued {
            self.notified_monitored_items.insert(*id);
        }
    }

    /// Server ids and client handles of the monitored items, ordered by server id
    pub fn monitored_item_handles(&self) -> (Vec<u32>, Vec<u32>) {
        let mut items = self
            .monitored_items
            .iter()
            .map(|(id, item)| (*id, item.client_handle()))
            .collect::<Vec<_>>();
        items.sort_unstable_by_key(|(id, _)| *id);
        items.into_iter().unzip()
    }

    /// True once per publishing interval
    fn publishing_interval_elapsed(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_cycle) < self.publishing_interval {
            return false;
        }
        self.last_cycle = now;
        true
    }

    fn get_state_transition(
        &self,
        tick_reason: TickReason,
        p: SubscriptionStateParams,
    ) -> HandledState {
        // The layout follows the state table of Part 4 5.13.1 row for row, keep it that way.
        // Row 27 is checked first so any state without client activity can expire.
        match (self.state, tick_reason) {
            (SubscriptionState::Creating, _) => HandledState::Create3,
            (
                SubscriptionState::Normal | SubscriptionState::Late | SubscriptionState::KeepAlive,
                TickReason::TickTimerFired,
            ) if self.lifetime_counter <= 1 && !p.publishing_req_queued => HandledState::Closed27,
            (SubscriptionState::Normal, TickReason::ReceivePublishRequest)
                if !self.publishing_enabled || !p.more_notifications =>
            {
                HandledState::Normal4
            }
            (SubscriptionState::Normal, TickReason::ReceivePublishRequest)
                if self.publishing_enabled && p.more_notifications =>
            {
                HandledState::Normal5
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if p.publishing_req_queued
                    && self.publishing_enabled
                    && p.notifications_available =>
            {
                HandledState::IntervalElapsed6
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if p.publishing_req_queued
                    && !self.first_message_sent
                    && (!self.publishing_enabled || !p.notifications_available) =>
            {
                HandledState::IntervalElapsed7
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if !p.publishing_req_queued
                    && (!self.first_message_sent
                        || self.publishing_enabled && p.notifications_available) =>
            {
                HandledState::IntervalElapsed8
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if self.first_message_sent
                    && (!self.publishing_enabled || !p.notifications_available) =>
            {
                HandledState::IntervalElapsed9
            }
            (SubscriptionState::Late, TickReason::ReceivePublishRequest)
                if self.publishing_enabled
                    && (p.notifications_available || p.more_notifications) =>
            {
                HandledState::Late10
            }
            (SubscriptionState::Late, TickReason::ReceivePublishRequest) => HandledState::Late11,
            (SubscriptionState::Late, TickReason::TickTimerFired) => HandledState::Late12,
            (SubscriptionState::KeepAlive, TickReason::ReceivePublishRequest) => {
                HandledState::KeepAlive13
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if self.publishing_enabled
                    && p.notifications_available
                    && p.publishing_req_queued =>
            {
                HandledState::KeepAlive14
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if p.publishing_req_queued
                    && self.keep_alive_counter <= 1
                    && (!self.publishing_enabled || !p.notifications_available) =>
            {
                HandledState::KeepAlive15
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if self.keep_alive_counter > 1
                    && (!self.publishing_enabled || !p.notifications_available) =>
            {
                HandledState::KeepAlive16
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if !p.publishing_req_queued
                    && (self.keep_alive_counter <= 1
                        || self.publishing_enabled && p.notifications_available) =>
            {
                HandledState::KeepAlive17
            }
            _ => HandledState::None0,
        }
    }

    fn handle_state_transition(&mut self, transition: HandledState) -> UpdateStateAction {
        match transition {
            HandledState::None0 => UpdateStateAction::None,
            HandledState::Create3 => {
                self.state = SubscriptionState::Normal;
                self.first_message_sent = false;
                UpdateStateAction::SubscriptionCreated
            }
            // The publish request is queued at session level
            HandledState::Normal4 | HandledState::KeepAlive13 => UpdateStateAction::None,
            HandledState::Normal5 => {
                self.reset_lifetime();
                UpdateStateAction::ReturnNotifications
            }
            HandledState::IntervalElapsed6 => {
                self.reset_lifetime();
                self.count_down_lifetime();
                self.first_message_sent = true;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::IntervalElapsed7 => {
                self.reset_lifetime();
                self.count_down_lifetime();
                self.first_message_sent = true;
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::IntervalElapsed8 => {
                self.count_down_lifetime();
                self.state = SubscriptionState::Late;
                UpdateStateAction::None
            }
            HandledState::IntervalElapsed9 => {
                self.count_down_lifetime();
                self.reset_keep_alive();
                self.state = SubscriptionState::KeepAlive;
                UpdateStateAction::None
            }
            HandledState::Late10 => {
                self.reset_lifetime();
                self.first_message_sent = true;
                self.state = SubscriptionState::Normal;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::Late11 => {
                self.reset_lifetime();
                self.first_message_sent = true;
                self.state = SubscriptionState::KeepAlive;
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::Late12 => {
                self.count_down_lifetime();
                UpdateStateAction::None
            }
            HandledState::KeepAlive14 => {
                self.reset_lifetime();
                self.count_down_lifetime();
                self.first_message_sent = true;
                self.state = SubscriptionState::Normal;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::KeepAlive15 => {
                self.reset_lifetime();
                self.count_down_lifetime();
                self.reset_keep_alive();
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::KeepAlive16 => {
                self.count_down_lifetime();
                self.keep_alive_counter = self.keep_alive_counter.saturating_sub(1);
                UpdateStateAction::None
            }
            HandledState::KeepAlive17 => {
                self.count_down_lifetime();
                self.state = SubscriptionState::Late;
                UpdateStateAction::None
            }
            HandledState::Closed27 => {
                self.state = SubscriptionState::Closed;
                UpdateStateAction::SubscriptionExpired
            }
        }
    }

    /// Sampling items keep their queue until they report, so only reporting items count
    fn notifications_available(&self) -> bool {
        let reporting = |item: &&MonitoredItem| item.is_reporting();
        self.notified_monitored_items
            .iter()
            .filter_map(|id| self.monitored_items.get(id))
            .filter(reporting)
            .any(|item| item.has_notifications())
            || self.resend_data
                && self
                    .monitored_items
                    .values()
                    .filter(reporting)
                    .any(|item| item.has_last_value())
    }

    /// Samples the items that are due. On a timer tick the publishing cycle runs only when
    /// the interval has elapsed, a publish request runs it straight away.
    pub(crate) fn tick(
        &mut self,
        now: &DateTimeUtc,
        now_instant: Instant,
        tick_reason: TickReason,
        publishing_req_queued: bool,
    ) {
        if self.is_closed() {
            return;
        }
        if tick_reason == TickReason::TickTimerFired {
            self.sample_monitored_items(now_instant);
            let due = self.state == SubscriptionState::Creating
                || self.publishing_interval_elapsed(now_instant);
            if !due {
                return;
            }
        }

        let params = SubscriptionStateParams {
            notifications_available: self.notifications_available(),
            more_notifications: self.more_notifications(),
            publishing_req_queued,
        };
        let transition = self.get_state_transition(tick_reason, params);
        trace!(
            "Subscription {} in state {:?} takes transition {:?}",
            self.id,
            self.state,
            transition
        );
        let publish_time = DateTime::from(*now);
        match self.handle_state_transition(transition) {
            UpdateStateAction::None | UpdateStateAction::SubscriptionCreated => {}
            UpdateStateAction::ReturnKeepAlive => self.enqueue_keep_alive(publish_time),
            UpdateStateAction::ReturnNotifications => {
                let resend_data = std::mem::take(&mut self.resend_data);
                let messages = self.collect_notifications(now, resend_data);
                if messages.is_empty() {
                    // Messages of an earlier cycle still waiting answer the client instead
                    if self.notifications.is_empty() {
                        self.enqueue_keep_alive(publish_time);
                    }
                } else {
                    messages
                        .into_iter()
                        .for_each(|message| self.enqueue_notification(message));
                }
            }
            UpdateStateAction::SubscriptionExpired => {
                info!("Subscription {} expired, it will be deleted", self.id);
                self.monitored_items.clear();
                self.notified_monitored_items.clear();
                let message = NotificationMessage::status_change(
                    self.sequence_number.next(),
                    publish_time,
                    StatusCode::BadTimeout,
                );
                self.enqueue_notification(message);
            }
        }
    }

    fn sample_monitored_items(&mut self, now: Instant) {
        let notified = &mut self.notified_monitored_items;
        self.monitored_items
            .iter_mut()
            .filter_map(|(id, item)| item.tick(now).then_some(*id))
            .for_each(|id| {
                notified.insert(id);
            });
    }

    /// A keep alive carries the next sequence number without using it up
    fn enqueue_keep_alive(&mut self, publish_time: DateTime) {
        let message = NotificationMessage::keep_alive(self.sequence_number.peek(), publish_time);
        self.enqueue_notification(message);
    }

    fn enqueue_notification(&mut self, message: NotificationMessage) {
        if !message.is_keep_alive() {
            let expected = self.sequence_number.successor(self.last_sequence_number);
            if message.sequence_number != expected {
                error!(
                    "Subscription {} queued sequence number {} out of order, expected {}",
                    self.id, message.sequence_number, expected
                );
            }
            self.last_sequence_number = message.sequence_number;
        }
        if self.notifications.len() >= self.max_queued_notifications {
            warn!(
                "Subscription {} has too many queued notifications, dropping the oldest",
                self.id
            );
            self.notifications.pop_front();
        }
        self.notifications.push_back(message);
    }

    /// Makes a status change message for this subscription, consuming a sequence number
    pub(super) fn make_status_change(
        &mut self,
        now: &DateTimeUtc,
        status: StatusCode,
    ) -> NotificationMessage {
        self.last_sequence_number = self.sequence_number.next();
        NotificationMessage::status_change(self.last_sequence_number, DateTime::from(*now), status)
    }

    pub(super) fn take_notification(&mut self) -> Option<NotificationMessage> {
        self.notifications.pop_front()
    }

    pub(super) fn take_notifications(&mut self) -> Vec<NotificationMessage> {
        self.notifications.drain(..).collect()
    }

    pub(super) fn more_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub(super) fn is_closed(&self) -> bool {
        self.state == SubscriptionState::Closed
    }

    /// Drains the queues of the reporting items into data change messages, in item id
    /// order. A resend visits every item and starts with its latest value.
    fn collect_notifications(
        &mut self,
        now: &DateTimeUtc,
        resend_data: bool,
    ) -> Vec<NotificationMessage> {
        let mut ids = if resend_data {
            self.notified_monitored_items.clear();
            self.monitored_items.keys().copied().collect::<Vec<_>>()
        } else {
            self.notified_monitored_items.drain().collect::<Vec<_>>()
        };
        ids.sort_unstable();

        let limit = self.settings.max_notifications_per_publish;
        let mut messages = Vec::new();
        let mut batch = Vec::new();
        for id in ids {
            let Some(item) = self.monitored_items.get_mut(&id) else {
                continue;
            };
            if !item.is_reporting() {
                continue;
            }
            if resend_data {
                item.add_current_value_to_queue();
            }
            while let Some(notification) = item.pop_notification() {
                batch.push(notification);
                if limit > 0 && batch.len() >= limit {
                    messages.push(NotificationMessage::data_change(
                        self.sequence_number.next(),
                        DateTime::from(*now),
                        std::mem::take(&mut batch),
                    ));
                }
            }
        }
        if !batch.is_empty() {
            messages.push(NotificationMessage::data_change(
                self.sequence_number.next(),
                DateTime::from(*now),
                batch,
            ));
        }
        messages
    }

    pub(super) fn reset_keep_alive(&mut self) {
        self.keep_alive_counter = self.settings.max_keep_alive_count;
    }

    /// Client activity, e.g. a publish request or a message sent to the client
    pub(super) fn reset_lifetime(&mut self) {
        self.lifetime_counter = self.settings.lifetime_count;
    }

    /// One more publishing cycle went by
    fn count_down_lifetime(&mut self) {
        self.lifetime_counter = self.lifetime_counter.saturating_sub(1);
        trace!(
            "Subscription {} has {} cycles of lifetime left",
            self.id,
            self.lifetime_counter
        );
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn priority(&self) -> u8 {
        self.settings.priority
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn lifetime_counter(&self) -> u32 {
        self.lifetime_counter
    }

    pub fn keep_alive_counter(&self) -> u32 {
        self.keep_alive_counter
    }

    pub fn publishing_interval_ms(&self) -> f64 {
        self.settings.publishing_interval_ms
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        server::config::SubscriptionLimits,
        types::{
            service_types::{
                MonitoredItemCreateRequest, MonitoringMode, MonitoringParameters, ReadValueId,
                TimestampsToReturn,
            },
            DecodingOptions, ExtensionObject, NodeId, Variant,
        },
    };

    fn settings(lifetime: u32, keep_alive: u32) -> SubscriptionSettings {
        SubscriptionSettings {
            publishing_interval_ms: 1000.0,
            max_keep_alive_count: keep_alive,
            lifetime_count: lifetime,
            priority: 0,
            max_notifications_per_publish: 0,
        }
    }

    fn make_subscription(lifetime: u32, keep_alive: u32) -> Subscription {
        Subscription::new(1, true, settings(lifetime, keep_alive), 10)
    }

    fn add_item(subscription: &mut Subscription, id: u32) {
        let request = MonitoredItemCreateRequest {
            item_to_monitor: ReadValueId::from(NodeId::new(2, "Line1/Count")),
            monitoring_mode: MonitoringMode::Reporting,
            requested_parameters: MonitoringParameters {
                client_handle: id,
                sampling_interval: 0.0,
                filter: ExtensionObject::null(),
                queue_size: 10,
                discard_oldest: true,
            },
        };
        let item = MonitoredItem::new(
            id,
            &request,
            TimestampsToReturn::Both,
            &SubscriptionLimits::default(),
            1000.0,
            &DecodingOptions::default(),
            DataValue::new_now(0i32),
        )
        .unwrap();
        subscription.insert(item);
    }

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn creating_moves_to_normal() {
        let mut s = make_subscription(30, 10);
        assert_eq!(s.state(), SubscriptionState::Creating);
        let now = chrono::Utc::now();
        s.tick(&now, Instant::now(), TickReason::TickTimerFired, false);
        assert_eq!(s.state(), SubscriptionState::Normal);
        assert!(!s.more_notifications());
    }

    #[test]
    fn expires_without_publish_requests() {
        let mut s = make_subscription(3, 1);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, false);
        s.tick(&now, at(start, 1001), TickReason::TickTimerFired, false);
        assert_eq!(s.state(), SubscriptionState::Late);
        assert_eq!(s.lifetime_counter(), 2);
        s.tick(&now, at(start, 2002), TickReason::TickTimerFired, false);
        assert_eq!(s.lifetime_counter(), 1);
        assert!(!s.is_closed());
        s.tick(&now, at(start, 3003), TickReason::TickTimerFired, false);
        assert!(s.is_closed());
        let message = s.take_notification().unwrap();
        let status_changes = message.status_changes(&DecodingOptions::default());
        assert_eq!(status_changes.len(), 1);
        assert_eq!(status_changes[0].status, StatusCode::BadTimeout);
        // Further ticks do nothing
        s.tick(&now, at(start, 4004), TickReason::TickTimerFired, false);
        assert!(!s.more_notifications());
    }

    #[test]
    fn first_cycle_sends_initial_values() {
        let mut s = make_subscription(30, 10);
        add_item(&mut s, 1);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, true);
        s.tick(&now, at(start, 1001), TickReason::TickTimerFired, true);
        let message = s.take_notification().unwrap();
        assert_eq!(message.sequence_number, 1);
        let changes = message.data_changes(&DecodingOptions::default());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].monitored_items.as_ref().unwrap().len(), 1);
        assert_eq!(s.state(), SubscriptionState::Normal);
    }

    #[test]
    fn late_subscription_answers_next_publish() {
        let mut s = make_subscription(30, 10);
        add_item(&mut s, 1);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, false);
        s.tick(&now, at(start, 1001), TickReason::TickTimerFired, false);
        assert_eq!(s.state(), SubscriptionState::Late);
        assert!(!s.more_notifications());
        s.tick(&now, at(start, 1100), TickReason::ReceivePublishRequest, true);
        assert_eq!(s.state(), SubscriptionState::Normal);
        let message = s.take_notification().unwrap();
        assert!(!message.is_keep_alive());
    }

    #[test]
    fn keep_alive_sent_when_counter_runs_out() {
        let mut s = make_subscription(30, 3);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, true);
        // The first cycle always sends something
        s.tick(&now, at(start, 1000), TickReason::TickTimerFired, true);
        let first = s.take_notification().unwrap();
        assert!(first.is_keep_alive());
        assert_eq!(first.sequence_number, 1);
        s.tick(&now, at(start, 2000), TickReason::TickTimerFired, true);
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
        s.tick(&now, at(start, 3000), TickReason::TickTimerFired, true);
        s.tick(&now, at(start, 4000), TickReason::TickTimerFired, true);
        assert!(!s.more_notifications());
        s.tick(&now, at(start, 5000), TickReason::TickTimerFired, true);
        let keep_alive = s.take_notification().unwrap();
        assert!(keep_alive.is_keep_alive());
        // Keep alives do not consume sequence numbers
        assert_eq!(keep_alive.sequence_number, 1);
    }

    #[test]
    fn data_change_leaves_keep_alive() {
        let mut s = make_subscription(30, 3);
        add_item(&mut s, 1);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, true);
        s.tick(&now, at(start, 1000), TickReason::TickTimerFired, true);
        assert_eq!(s.take_notification().unwrap().sequence_number, 1);
        s.tick(&now, at(start, 2000), TickReason::TickTimerFired, true);
        assert_eq!(s.state(), SubscriptionState::KeepAlive);
        s.notify_data_value(&1, DataValue::new_now(42i32));
        s.tick(&now, at(start, 3000), TickReason::TickTimerFired, true);
        assert_eq!(s.state(), SubscriptionState::Normal);
        let message = s.take_notification().unwrap();
        assert_eq!(message.sequence_number, 2);
        let changes = message.data_changes(&DecodingOptions::default());
        let items = changes[0].monitored_items.as_ref().unwrap();
        assert_eq!(items[0].value.value, Some(Variant::Int32(42)));
    }

    #[test]
    fn notifications_split_by_limit() {
        let settings = SubscriptionSettings {
            max_notifications_per_publish: 2,
            ..settings(30, 10)
        };
        let mut s = Subscription::new(1, true, settings, 10);
        for id in 1..=5 {
            add_item(&mut s, id);
        }
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, true);
        s.tick(&now, at(start, 1000), TickReason::TickTimerFired, true);
        let messages = s.take_notifications();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages.iter().map(|m| m.sequence_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn apply_settings_restarts_counters() {
        let mut s = make_subscription(30, 10);
        let now = chrono::Utc::now();
        let start = Instant::now();
        s.tick(&now, start, TickReason::TickTimerFired, false);
        s.tick(&now, at(start, 1000), TickReason::TickTimerFired, false);
        assert_eq!(s.lifetime_counter(), 29);
        s.apply_settings(SubscriptionSettings {
            publishing_interval_ms: 250.0,
            priority: 5,
            ..settings(60, 20)
        });
        assert_eq!(s.lifetime_counter(), 60);
        assert_eq!(s.keep_alive_counter(), 20);
        assert_eq!(s.priority(), 5);
        // The shorter interval is due after 250ms
        s.tick(&now, at(start, 1250), TickReason::TickTimerFired, false);
        assert_eq!(s.lifetime_counter(), 59);
    }

    #[test]
    fn monitored_item_handles_in_order() {
        let mut s = make_subscription(30, 10);
        add_item(&mut s, 7);
        add_item(&mut s, 3);
        assert_eq!(s.monitored_item_handles(), (vec![3, 7], vec![3, 7]));
        assert!(s.remove(&3).is_some());
        assert_eq!(s.len(), 1);
    }
}
