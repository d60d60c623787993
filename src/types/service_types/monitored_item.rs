// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    request_header::RequestHeader, response_header::ResponseHeader,
    service_types::{attribute::ReadValueId, enums::*},
    status_code::StatusCode,
};

ua_struct! {
    pub struct MonitoringParameters {
        pub client_handle: u32,
        /// Sampling interval in milliseconds. 0 means as fast as possible, -1 means use the
        /// publishing interval of the subscription.
        pub sampling_interval: f64,
        pub filter: ExtensionObject,
        pub queue_size: u32,
        pub discard_oldest: bool,
    }
}

ua_struct! {
    pub struct DataChangeFilter [DataChangeFilter_Encoding_DefaultBinary] {
        pub trigger: DataChangeTrigger,
        pub deadband_type: u32,
        pub deadband_value: f64,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateRequest {
        pub item_to_monitor: ReadValueId,
        pub monitoring_mode: MonitoringMode,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    pub struct MonitoredItemCreateResult {
        pub status_code: StatusCode,
        pub monitored_item_id: u32,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsRequest [CreateMonitoredItemsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: TimestampsToReturn,
        pub items_to_create: Option<Vec<MonitoredItemCreateRequest>>,
    }
}

ua_struct! {
    pub struct CreateMonitoredItemsResponse [CreateMonitoredItemsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<MonitoredItemCreateResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct MonitoredItemModifyRequest {
        pub monitored_item_id: u32,
        pub requested_parameters: MonitoringParameters,
    }
}

ua_struct! {
    pub struct MonitoredItemModifyResult {
        pub status_code: StatusCode,
        pub revised_sampling_interval: f64,
        pub revised_queue_size: u32,
        pub filter_result: ExtensionObject,
    }
}

ua_struct! {
    pub struct ModifyMonitoredItemsRequest [ModifyMonitoredItemsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub timestamps_to_return: TimestampsToReturn,
        pub items_to_modify: Option<Vec<MonitoredItemModifyRequest>>,
    }
}

ua_struct! {
    pub struct ModifyMonitoredItemsResponse [ModifyMonitoredItemsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<MonitoredItemModifyResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct SetMonitoringModeRequest [SetMonitoringModeRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitoring_mode: MonitoringMode,
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct SetMonitoringModeResponse [SetMonitoringModeResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsRequest [DeleteMonitoredItemsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub monitored_item_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct DeleteMonitoredItemsResponse [DeleteMonitoredItemsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
