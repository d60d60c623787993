// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The service request / response structures and the structures and enumerations they carry,
//! grouped by service set. Field order of every structure follows Part 4.

mod attribute;
mod discovery;
mod enums;
mod method;
mod monitored_item;
mod secure_channel;
mod session;
mod subscription;
mod view;

pub use self::{
    attribute::*, discovery::*, enums::*, method::*, monitored_item::*, secure_channel::*,
    session::*, subscription::*, view::*,
};

use crate::types::{response_header::ResponseHeader, status_code::StatusCode};

ua_struct! {
    /// The response returned by all services when there is a service level error.
    pub struct ServiceFault [ServiceFault_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
    }
}

impl ServiceFault {
    pub fn new(request_header: &crate::types::RequestHeader, service_result: StatusCode) -> Self {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(request_header, service_result),
        }
    }

    /// A fault for a request of which only the handle is known
    pub fn for_request_handle(request_handle: u32, service_result: StatusCode) -> Self {
        ServiceFault {
            response_header: ResponseHeader::with_timestamp(
                crate::types::DateTime::now(),
                request_handle,
                service_result,
            ),
        }
    }
}
