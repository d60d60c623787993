// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    byte_string::ByteString, date_time::DateTime, request_header::RequestHeader,
    response_header::ResponseHeader, service_types::enums::*,
};

ua_struct! {
    pub struct ChannelSecurityToken {
        pub channel_id: u32,
        pub token_id: u32,
        pub created_at: DateTime,
        /// Lifetime of the token in milliseconds
        pub revised_lifetime: u32,
    }
}

ua_struct! {
    pub struct OpenSecureChannelRequest [OpenSecureChannelRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub client_protocol_version: u32,
        pub request_type: SecurityTokenRequestType,
        pub security_mode: MessageSecurityMode,
        pub client_nonce: ByteString,
        pub requested_lifetime: u32,
    }
}

ua_struct! {
    pub struct OpenSecureChannelResponse [OpenSecureChannelResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub server_protocol_version: u32,
        pub security_token: ChannelSecurityToken,
        pub server_nonce: ByteString,
    }
}

ua_struct! {
    pub struct CloseSecureChannelRequest [CloseSecureChannelRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
    }
}

ua_struct! {
    pub struct CloseSecureChannelResponse [CloseSecureChannelResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
    }
}
