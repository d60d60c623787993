// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use crate::{
    server::{address_space::variable::IndexRange, config::SubscriptionLimits},
    types::{
        service_types::{
            DataChangeFilter, DataChangeTrigger, MonitoredItemCreateRequest,
            MonitoredItemModifyRequest, MonitoringMode, MonitoringParameters, ReadValueId,
            TimestampsToReturn,
        },
        AttributeId, DataValue, DecodingOptions, ExtensionObject, MonitoredItemNotification,
        ObjectId, StatusCode,
    },
};

/// The kind of change that causes a monitored item to report. Deadbands are not supported.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum FilterType {
    None,
    DataChangeFilter(DataChangeTrigger),
}

impl FilterType {
    pub fn from_filter(
        filter: &ExtensionObject,
        decoding_options: &DecodingOptions,
    ) -> Result<FilterType, StatusCode> {
        if filter.is_null() {
            // No data filter was passed, so just a value and status comparison
            return Ok(FilterType::None);
        }
        match filter.object_id() {
            Ok(ObjectId::DataChangeFilter_Encoding_DefaultBinary) => {
                let filter = filter
                    .decode_inner::<DataChangeFilter>(decoding_options)
                    .map_err(|_| StatusCode::BadMonitoredItemFilterInvalid)?;
                if filter.deadband_type != 0 {
                    error!(
                        "Deadband filters are not supported, deadband type {}",
                        filter.deadband_type
                    );
                    Err(StatusCode::BadMonitoredItemFilterUnsupported)
                } else {
                    Ok(FilterType::DataChangeFilter(filter.trigger))
                }
            }
            _ => {
                error!(
                    "Requested data filter type is not supported, {:?}",
                    filter.node_id
                );
                Err(StatusCode::BadFilterNotAllowed)
            }
        }
    }

    /// Tests if `new` differs from `old` in a way the filter reports
    fn is_changed(&self, old: &DataValue, new: &DataValue) -> bool {
        let trigger = match self {
            FilterType::None => DataChangeTrigger::StatusValue,
            FilterType::DataChangeFilter(trigger) => *trigger,
        };
        let status_changed = old.status() != new.status();
        match trigger {
            DataChangeTrigger::Status => status_changed,
            DataChangeTrigger::StatusValue => status_changed || old.value != new.value,
            DataChangeTrigger::StatusValueTimestamp => {
                status_changed
                    || old.value != new.value
                    || old.source_timestamp != new.source_timestamp
            }
        }
    }
}

/// Takes the requested sampling interval value supplied by client and ensures it is within
/// the range supported by the server. Zero means the item reports every change, a negative
/// value means the publishing interval of the subscription.
pub(super) fn sanitize_sampling_interval(
    limits: &SubscriptionLimits,
    requested_sampling_interval: f64,
    publishing_interval_ms: f64,
) -> f64 {
    if requested_sampling_interval.is_nan() || requested_sampling_interval < 0.0 {
        publishing_interval_ms
    } else if requested_sampling_interval == 0.0 {
        0.0
    } else if requested_sampling_interval < limits.min_sampling_interval_ms {
        limits.min_sampling_interval_ms
    } else {
        requested_sampling_interval
    }
}

/// Takes the requested queue size and ensures it is within the range supported by the server
pub(super) fn sanitize_queue_size(limits: &SubscriptionLimits, requested_queue_size: usize) -> usize {
    if requested_queue_size <= 1 {
        1
    } else if requested_queue_size > limits.max_monitored_item_queue_size {
        limits.max_monitored_item_queue_size
    } else {
        requested_queue_size
    }
}

#[derive(Debug)]
pub struct MonitoredItem {
    id: u32,
    item_to_monitor: ReadValueId,
    index_range: IndexRange,
    monitoring_mode: MonitoringMode,
    client_handle: u32,
    sampling_interval: f64,
    filter: FilterType,
    discard_oldest: bool,
    queue_size: usize,
    notification_queue: VecDeque<MonitoredItemNotification>,
    queue_overflow: bool,
    timestamps_to_return: TimestampsToReturn,
    /// The value most recently queued for reporting
    last_data_value: Option<DataValue>,
    /// The newest value seen and not yet sampled
    latest_sample: Option<DataValue>,
    last_sample_time: Instant,
}

impl MonitoredItem {
    /// Creates the item. `initial_value` is the value of the monitored attribute at creation,
    /// read from the address space, and becomes the first notification.
    pub fn new(
        id: u32,
        request: &MonitoredItemCreateRequest,
        timestamps_to_return: TimestampsToReturn,
        limits: &SubscriptionLimits,
        publishing_interval_ms: f64,
        decoding_options: &DecodingOptions,
        initial_value: DataValue,
    ) -> Result<MonitoredItem, StatusCode> {
        let params = &request.requested_parameters;
        let filter = FilterType::from_filter(&params.filter, decoding_options)?;
        if filter != FilterType::None
            && request.item_to_monitor.attribute_id != AttributeId::Value as u32
        {
            // Data change filters only make sense on values
            return Err(StatusCode::BadFilterNotAllowed);
        }
        let index_range = IndexRange::parse(&request.item_to_monitor.index_range)?;
        let mut item = MonitoredItem {
            id,
            item_to_monitor: request.item_to_monitor.clone(),
            index_range,
            monitoring_mode: request.monitoring_mode,
            client_handle: params.client_handle,
            sampling_interval: sanitize_sampling_interval(
                limits,
                params.sampling_interval,
                publishing_interval_ms,
            ),
            filter,
            discard_oldest: params.discard_oldest,
            queue_size: sanitize_queue_size(limits, params.queue_size as usize),
            notification_queue: VecDeque::new(),
            queue_overflow: false,
            timestamps_to_return,
            last_data_value: None,
            latest_sample: None,
            last_sample_time: Instant::now(),
        };
        if item.monitoring_mode == MonitoringMode::Disabled {
            item.latest_sample = Some(initial_value);
        } else {
            item.sample(initial_value);
        }
        Ok(item)
    }

    /// Modifies the existing item with the values of the modify request.
    pub fn modify(
        &mut self,
        request: &MonitoredItemModifyRequest,
        timestamps_to_return: TimestampsToReturn,
        limits: &SubscriptionLimits,
        publishing_interval_ms: f64,
        decoding_options: &DecodingOptions,
    ) -> Result<(), StatusCode> {
        let params: &MonitoringParameters = &request.requested_parameters;
        self.filter = FilterType::from_filter(&params.filter, decoding_options)?;
        self.timestamps_to_return = timestamps_to_return;
        self.sampling_interval =
            sanitize_sampling_interval(limits, params.sampling_interval, publishing_interval_ms);
        self.queue_size = sanitize_queue_size(limits, params.queue_size as usize);
        self.client_handle = params.client_handle;
        self.discard_oldest = params.discard_oldest;

        // Shrink the notification queue to the new size
        while self.notification_queue.len() > self.queue_size {
            if self.discard_oldest {
                self.notification_queue.pop_front();
            } else {
                self.notification_queue.pop_back();
            }
            self.queue_overflow = true;
        }
        self.notification_queue.shrink_to_fit();
        Ok(())
    }

    fn sampling_duration(&self) -> Duration {
        Duration::from_micros((self.sampling_interval * 1000f64) as u64)
    }

    /// Called for each change of the monitored value. Items reporting every change sample
    /// straight away, the others keep the newest value until their next sample is due.
    /// Returns true if a notification was queued.
    pub fn notify_data_value(&mut self, value: DataValue) -> bool {
        let value = self.apply_index_range(value);
        if self.monitoring_mode == MonitoringMode::Disabled || self.sampling_interval > 0.0 {
            self.latest_sample = Some(value);
            false
        } else {
            self.sample(value)
        }
    }

    /// Samples the newest value if the sampling interval has elapsed. Returns true if a
    /// notification was queued.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.monitoring_mode == MonitoringMode::Disabled || self.sampling_interval <= 0.0 {
            return false;
        }
        if now.saturating_duration_since(self.last_sample_time) < self.sampling_duration() {
            return false;
        }
        let Some(value) = self.latest_sample.take() else {
            return false;
        };
        self.last_sample_time = now;
        self.sample(value)
    }

    fn apply_index_range(&self, mut value: DataValue) -> DataValue {
        if self.index_range == IndexRange::None {
            return value;
        }
        let result = match value.value.as_ref() {
            Some(v) => self.index_range.apply(v),
            None => Err(StatusCode::BadIndexRangeNoData),
        };
        match result {
            Ok(v) => value.value = Some(v),
            Err(status) => {
                value.value = None;
                value.status = Some(status);
            }
        }
        value
    }

    /// Compares the sample with the last reported value and queues it if it changed
    fn sample(&mut self, value: DataValue) -> bool {
        let changed = match self.last_data_value {
            Some(ref last_value) => self.filter.is_changed(last_value, &value),
            None => true,
        };
        if !changed {
            return false;
        }
        let notification = MonitoredItemNotification {
            client_handle: self.client_handle,
            value: value.filtered(self.timestamps_to_return),
        };
        self.last_data_value = Some(value);
        self.enqueue_notification(notification);
        true
    }

    fn enqueue_notification(&mut self, notification: MonitoredItemNotification) {
        if self.notification_queue.len() < self.queue_size {
            self.notification_queue.push_back(notification);
            return;
        }
        self.queue_overflow = true;
        // A queue of one always holds the newest value and never reports an overflow
        let report_overflow = self.queue_size > 1;
        if self.discard_oldest {
            self.notification_queue.pop_front();
            self.notification_queue.push_back(notification);
            if report_overflow {
                if let Some(oldest) = self.notification_queue.front_mut() {
                    Self::set_overflow(oldest);
                }
            }
        } else {
            self.notification_queue.pop_back();
            let mut notification = notification;
            if report_overflow {
                Self::set_overflow(&mut notification);
            }
            self.notification_queue.push_back(notification);
        }
    }

    fn set_overflow(notification: &mut MonitoredItemNotification) {
        notification.value.status = Some(notification.value.status().with_overflow());
    }

    /// Queues the last reported value again unless it is already the newest queued value
    pub fn add_current_value_to_queue(&mut self) {
        let Some(value) = self.last_data_value.as_ref() else {
            return;
        };
        let value = value.filtered(self.timestamps_to_return);
        if let Some(newest) = self.notification_queue.back() {
            if newest.value == value {
                return;
            }
        }
        let notification = MonitoredItemNotification {
            client_handle: self.client_handle,
            value,
        };
        self.enqueue_notification(notification);
    }

    pub fn pop_notification(&mut self) -> Option<MonitoredItemNotification> {
        self.notification_queue.pop_front()
    }

    pub fn has_notifications(&self) -> bool {
        !self.notification_queue.is_empty()
    }

    pub fn has_last_value(&self) -> bool {
        self.last_data_value.is_some()
    }

    /// Changes the monitoring mode. Disabling discards the queue, enabling samples the newest
    /// value seen while disabled. Returns true if a notification was queued.
    pub fn set_monitoring_mode(&mut self, monitoring_mode: MonitoringMode) -> bool {
        let old_mode = self.monitoring_mode;
        self.monitoring_mode = monitoring_mode;
        if monitoring_mode == MonitoringMode::Disabled {
            self.notification_queue.clear();
            self.queue_overflow = false;
            false
        } else if old_mode == MonitoringMode::Disabled {
            match self.latest_sample.take() {
                Some(value) => self.sample(value),
                None => false,
            }
        } else {
            false
        }
    }

    pub fn is_reporting(&self) -> bool {
        matches!(self.monitoring_mode, MonitoringMode::Reporting)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn sampling_interval(&self) -> f64 {
        self.sampling_interval
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn queue_overflow(&self) -> bool {
        self.queue_overflow
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    /// True if the item follows changes to a variable's value
    pub fn monitors_value(&self) -> bool {
        self.item_to_monitor.attribute_id == AttributeId::Value as u32
    }
}
