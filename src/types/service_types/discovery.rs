// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    byte_string::ByteString, localized_text::LocalizedText, request_header::RequestHeader,
    response_header::ResponseHeader, service_types::enums::*, string::UAString,
};

ua_struct! {
    pub struct ApplicationDescription {
        pub application_uri: UAString,
        pub product_uri: UAString,
        pub application_name: LocalizedText,
        pub application_type: ApplicationType,
        pub gateway_server_uri: UAString,
        pub discovery_profile_uri: UAString,
        pub discovery_urls: Option<Vec<UAString>>,
    }
}

ua_struct! {
    pub struct UserTokenPolicy {
        pub policy_id: UAString,
        pub token_type: UserTokenType,
        pub issued_token_type: UAString,
        pub issuer_endpoint_url: UAString,
        pub security_policy_uri: UAString,
    }
}

impl UserTokenPolicy {
    pub fn anonymous() -> UserTokenPolicy {
        UserTokenPolicy {
            policy_id: UAString::from("anonymous"),
            token_type: UserTokenType::Anonymous,
            issued_token_type: UAString::null(),
            issuer_endpoint_url: UAString::null(),
            security_policy_uri: UAString::null(),
        }
    }
}

ua_struct! {
    pub struct EndpointDescription {
        pub endpoint_url: UAString,
        pub server: ApplicationDescription,
        pub server_certificate: ByteString,
        pub security_mode: MessageSecurityMode,
        pub security_policy_uri: UAString,
        pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        pub transport_profile_uri: UAString,
        pub security_level: u8,
    }
}

ua_struct! {
    pub struct GetEndpointsRequest [GetEndpointsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub endpoint_url: UAString,
        pub locale_ids: Option<Vec<UAString>>,
        pub profile_uris: Option<Vec<UAString>>,
    }
}

ua_struct! {
    pub struct GetEndpointsResponse [GetEndpointsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub endpoints: Option<Vec<EndpointDescription>>,
    }
}

ua_struct! {
    pub struct FindServersRequest [FindServersRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub endpoint_url: UAString,
        pub locale_ids: Option<Vec<UAString>>,
        pub server_uris: Option<Vec<UAString>>,
    }
}

ua_struct! {
    pub struct FindServersResponse [FindServersResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub servers: Option<Vec<ApplicationDescription>>,
    }
}
