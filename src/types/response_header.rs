// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    date_time::DateTime, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    request_header::RequestHeader, status_code::StatusCode, string::UAString,
};

ua_struct! {
    /// Leads every response. `request_handle` echoes the handle of the request being
    /// answered so pipelined responses can be matched up.
    pub struct ResponseHeader {
        pub timestamp: DateTime,
        pub request_handle: u32,
        pub service_result: StatusCode,
        pub service_diagnostics: DiagnosticInfo,
        pub string_table: Option<Vec<UAString>>,
        pub additional_header: ExtensionObject,
    }
}

impl ResponseHeader {
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        Self::new_service_result(request_header, StatusCode::Good)
    }

    pub fn new_service_result(request_header: &RequestHeader, service_result: StatusCode) -> ResponseHeader {
        Self::with_timestamp(DateTime::now(), request_header.request_handle, service_result)
    }

    /// A header for a response that has no request header to hand, such as a fault for a
    /// request whose header could not be decoded, or a publish answered later.
    pub fn with_timestamp(timestamp: DateTime, request_handle: u32, service_result: StatusCode) -> ResponseHeader {
        ResponseHeader {
            timestamp,
            request_handle,
            service_result,
            service_diagnostics: DiagnosticInfo::default(),
            string_table: None,
            additional_header: ExtensionObject::null(),
        }
    }
}
