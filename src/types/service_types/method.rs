// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    date_time::DateTime, diagnostic_info::DiagnosticInfo, localized_text::LocalizedText,
    node_id::NodeId, request_header::RequestHeader, response_header::ResponseHeader,
    service_types::enums::ServerState, status_code::StatusCode, string::UAString,
    variant::Variant,
};

ua_struct! {
    /// Describes an input or output argument of a method
    pub struct Argument [Argument_Encoding_DefaultBinary] {
        pub name: UAString,
        pub data_type: NodeId,
        pub value_rank: i32,
        pub array_dimensions: Option<Vec<u32>>,
        pub description: LocalizedText,
    }
}

ua_struct! {
    pub struct CallMethodRequest {
        pub object_id: NodeId,
        pub method_id: NodeId,
        pub input_arguments: Option<Vec<Variant>>,
    }
}

ua_struct! {
    pub struct CallMethodResult {
        pub status_code: StatusCode,
        pub input_argument_results: Option<Vec<StatusCode>>,
        pub input_argument_diagnostic_infos: Option<Vec<DiagnosticInfo>>,
        pub output_arguments: Option<Vec<Variant>>,
    }
}

impl From<StatusCode> for CallMethodResult {
    fn from(status_code: StatusCode) -> Self {
        CallMethodResult {
            status_code,
            input_argument_results: None,
            input_argument_diagnostic_infos: None,
            output_arguments: None,
        }
    }
}

ua_struct! {
    pub struct CallRequest [CallRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub methods_to_call: Option<Vec<CallMethodRequest>>,
    }
}

ua_struct! {
    pub struct CallResponse [CallResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<CallMethodResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct BuildInfo [BuildInfo_Encoding_DefaultBinary] {
        pub product_uri: UAString,
        pub manufacturer_name: UAString,
        pub product_name: UAString,
        pub software_version: UAString,
        pub build_number: UAString,
        pub build_date: DateTime,
    }
}

ua_struct! {
    /// The value of the Server.ServerStatus variable
    pub struct ServerStatusDataType [ServerStatusDataType_Encoding_DefaultBinary] {
        pub start_time: DateTime,
        pub current_time: DateTime,
        pub state: ServerState,
        pub build_info: BuildInfo,
        pub seconds_till_shutdown: u32,
        pub shutdown_reason: LocalizedText,
    }
}
