// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    diagnostic_info::DiagnosticInfo, notification_message::NotificationMessage,
    request_header::RequestHeader, response_header::ResponseHeader, status_code::StatusCode,
};

ua_struct! {
    pub struct CreateSubscriptionRequest [CreateSubscriptionRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        /// Requested publishing interval in milliseconds
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub publishing_enabled: bool,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct CreateSubscriptionResponse [CreateSubscriptionResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct ModifySubscriptionRequest [ModifySubscriptionRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub requested_publishing_interval: f64,
        pub requested_lifetime_count: u32,
        pub requested_max_keep_alive_count: u32,
        pub max_notifications_per_publish: u32,
        pub priority: u8,
    }
}

ua_struct! {
    pub struct ModifySubscriptionResponse [ModifySubscriptionResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub revised_publishing_interval: f64,
        pub revised_lifetime_count: u32,
        pub revised_max_keep_alive_count: u32,
    }
}

ua_struct! {
    pub struct SetPublishingModeRequest [SetPublishingModeRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub publishing_enabled: bool,
        pub subscription_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct SetPublishingModeResponse [SetPublishingModeResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsRequest [DeleteSubscriptionsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_ids: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct DeleteSubscriptionsResponse [DeleteSubscriptionsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct TransferSubscriptionsRequest [TransferSubscriptionsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_ids: Option<Vec<u32>>,
        pub send_initial_values: bool,
    }
}

ua_struct! {
    pub struct TransferResult {
        pub status_code: StatusCode,
        pub available_sequence_numbers: Option<Vec<u32>>,
    }
}

ua_struct! {
    pub struct TransferSubscriptionsResponse [TransferSubscriptionsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<TransferResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct SubscriptionAcknowledgement {
        pub subscription_id: u32,
        pub sequence_number: u32,
    }
}

ua_struct! {
    pub struct PublishRequest [PublishRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
    }
}

ua_struct! {
    pub struct PublishResponse [PublishResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub subscription_id: u32,
        pub available_sequence_numbers: Option<Vec<u32>>,
        pub more_notifications: bool,
        pub notification_message: NotificationMessage,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct RepublishRequest [RepublishRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub subscription_id: u32,
        pub retransmit_sequence_number: u32,
    }
}

ua_struct! {
    pub struct RepublishResponse [RepublishResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub notification_message: NotificationMessage,
    }
}
