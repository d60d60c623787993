// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    date_time::DateTime, extension_object::ExtensionObject, node_id::NodeId, string::UAString,
};

ua_struct! {
    /// The `RequestHeader` contains information common to every request from a client to the server.
    pub struct RequestHeader {
        /// The secret session identifier used to verify that the request is associated with
        /// the session. The SessionAuthenticationToken type is defined in 7.31.
        pub authentication_token: NodeId,
        /// The time the Client sent the request. The parameter is only used for diagnostic and
        /// logging purposes in the server.
        pub timestamp: DateTime,
        /// A requestHandle associated with the request. This client defined handle can be used
        /// to cancel the request. It is also returned in the response.
        pub request_handle: u32,
        /// A bit mask that identifies the types of vendor-specific diagnostics to be returned in
        /// diagnosticInfo response parameters.
        pub return_diagnostics: u32,
        /// An identifier that identifies the Client's security audit log entry associated with
        /// this request.
        pub audit_entry_id: UAString,
        /// This timeout in milliseconds is used in the Client side Communication Stack to set the
        /// timeout on a per-call base. For a server it is a hint of when the client gives up.
        pub timeout_hint: u32,
        /// Reserved for future use.
        pub additional_header: ExtensionObject,
    }
}

impl RequestHeader {
    pub fn new(authentication_token: &NodeId, timestamp: &DateTime, request_handle: u32) -> Self {
        Self {
            authentication_token: authentication_token.clone(),
            timestamp: *timestamp,
            request_handle,
            return_diagnostics: 0,
            audit_entry_id: UAString::null(),
            timeout_hint: 0,
            additional_header: ExtensionObject::null(),
        }
    }

    pub fn dummy() -> Self {
        Self::new(&NodeId::null(), &DateTime::now(), 1)
    }
}
