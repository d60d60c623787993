// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    byte_string::ByteString, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    node_id::NodeId, request_header::RequestHeader, response_header::ResponseHeader,
    service_types::discovery::*, status_code::StatusCode, string::UAString,
};

ua_struct! {
    #[derive(Default)]
    pub struct SignatureData {
        pub algorithm: UAString,
        pub signature: ByteString,
    }
}

ua_struct! {
    pub struct SignedSoftwareCertificate {
        pub certificate_data: ByteString,
        pub signature: ByteString,
    }
}

ua_struct! {
    pub struct CreateSessionRequest [CreateSessionRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub client_description: ApplicationDescription,
        pub server_uri: UAString,
        pub endpoint_url: UAString,
        pub session_name: UAString,
        pub client_nonce: ByteString,
        pub client_certificate: ByteString,
        /// Requested session timeout in milliseconds
        pub requested_session_timeout: f64,
        pub max_response_message_size: u32,
    }
}

ua_struct! {
    pub struct CreateSessionResponse [CreateSessionResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub session_id: NodeId,
        pub authentication_token: NodeId,
        pub revised_session_timeout: f64,
        pub server_nonce: ByteString,
        pub server_certificate: ByteString,
        pub server_endpoints: Option<Vec<EndpointDescription>>,
        pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub server_signature: SignatureData,
        pub max_request_message_size: u32,
    }
}

ua_struct! {
    pub struct ActivateSessionRequest [ActivateSessionRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub client_signature: SignatureData,
        pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        pub locale_ids: Option<Vec<UAString>>,
        pub user_identity_token: ExtensionObject,
        pub user_token_signature: SignatureData,
    }
}

ua_struct! {
    pub struct ActivateSessionResponse [ActivateSessionResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub server_nonce: ByteString,
        pub results: Option<Vec<StatusCode>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct CloseSessionRequest [CloseSessionRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub delete_subscriptions: bool,
    }
}

ua_struct! {
    pub struct CloseSessionResponse [CloseSessionResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
    }
}

ua_struct! {
    pub struct AnonymousIdentityToken [AnonymousIdentityToken_Encoding_DefaultBinary] {
        pub policy_id: UAString,
    }
}

ua_struct! {
    pub struct UserNameIdentityToken [UserNameIdentityToken_Encoding_DefaultBinary] {
        pub policy_id: UAString,
        pub user_name: UAString,
        /// The password. Only plaintext passwords are accepted since the channel is never
        /// encrypted.
        pub password: ByteString,
        pub encryption_algorithm: UAString,
    }
}

impl UserNameIdentityToken {
    /// Returns the plaintext password or an error if the token carries an encrypted secret or
    /// something that is not UTF-8
    pub fn plaintext_password(&self) -> Result<String, StatusCode> {
        if !self.encryption_algorithm.is_empty() {
            error!(
                "Password is encrypted with {} which is not supported",
                self.encryption_algorithm
            );
            return Err(StatusCode::BadIdentityTokenInvalid);
        }
        match self.password.value {
            Some(ref password) => String::from_utf8(password.clone()).map_err(|_| {
                error!("Password is not valid UTF-8");
                StatusCode::BadIdentityTokenInvalid
            }),
            None => Ok(String::new()),
        }
    }
}
