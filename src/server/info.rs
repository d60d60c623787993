// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! State shared by every connection: the configuration, the server state, the
//! authenticator and the id generators of subscriptions and monitored items.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::core::handle::AtomicHandle;
use crate::core::prelude::*;
use crate::types::{
    constants::TRANSPORT_PROFILE_URI_BINARY,
    service_types::{
        ApplicationDescription, BuildInfo, EndpointDescription, ServerState as ServerStateType,
        UserTokenPolicy, UserTokenType,
    },
    status_code::StatusCode,
};

use super::{
    authenticator::{AuthManager, UserToken},
    config::{ServerConfig, ServerEndpoint},
};

/// Policy id of the anonymous user token policy
pub const POLICY_ID_ANONYMOUS: &str = "anonymous";
/// Policy id of the user name token policy, passwords are sent in the clear
pub const POLICY_ID_USER_PASS_NONE: &str = "userpass_none";

/// Namespace of the tags loaded from the manifest
pub const FACTORY_NAMESPACE_URI: &str = "urn:vbl:digital-factory:tags";

pub struct ServerInfo {
    pub config: Arc<ServerConfig>,
    pub start_time: ArcSwap<DateTime>,
    pub state: ArcSwap<ServerStateType>,
    pub authenticator: Arc<dyn AuthManager>,
    pub subscription_id_handle: AtomicHandle,
    pub monitored_item_id_handle: AtomicHandle,
}

impl ServerInfo {
    pub fn new(config: Arc<ServerConfig>, authenticator: Arc<dyn AuthManager>) -> Self {
        Self {
            config,
            start_time: ArcSwap::new(Arc::new(DateTime::now())),
            state: ArcSwap::new(Arc::new(ServerStateType::Shutdown)),
            authenticator,
            subscription_id_handle: AtomicHandle::new(1),
            monitored_item_id_handle: AtomicHandle::new(1),
        }
    }

    /// Namespace uris, the index in the list is the namespace index
    pub fn namespaces(&self) -> Vec<String> {
        vec![
            "http://opcfoundation.org/UA/".to_string(),
            self.config.application_uri.clone(),
            FACTORY_NAMESPACE_URI.to_string(),
        ]
    }

    /// Answers GetEndpoints. Returns `None` if the client named transport profiles and
    /// UA binary is not among them, an empty list of profiles counts as no filter.
    pub fn endpoints(
        &self,
        endpoint_url: &UAString,
        transport_profile_uris: &Option<Vec<UAString>>,
    ) -> Option<Vec<EndpointDescription>> {
        if let Some(profiles) = transport_profile_uris.as_deref() {
            let binary = profiles
                .iter()
                .any(|uri| uri.as_ref() == TRANSPORT_PROFILE_URI_BINARY);
            if !profiles.is_empty() && !binary {
                error!("GetEndpoints asked only for transports {:?}", profiles);
                return None;
            }
        }

        let endpoints = match hostname_from_url(endpoint_url.as_ref()) {
            Ok(hostname) => {
                if !hostname.eq_ignore_ascii_case(&self.config.tcp_config.host) {
                    debug!(
                        "GetEndpoints url {} names host {}, the server listens on {}",
                        endpoint_url, hostname, self.config.tcp_config.host
                    );
                }
                self.config
                    .endpoints
                    .values()
                    .map(|e| self.new_endpoint_description(e, true))
                    .collect()
            }
            Err(_) => {
                warn!(
                    "GetEndpoints url {} cannot be parsed, answering with the default endpoint",
                    endpoint_url
                );
                self.config
                    .default_endpoint()
                    .map(|e| self.new_endpoint_description(e, true))
                    .into_iter()
                    .collect()
            }
        };
        Some(endpoints)
    }

    pub fn endpoint_exists(
        &self,
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> bool {
        self.find_endpoint(endpoint_url, security_policy, security_mode)
            .is_some()
    }

    fn find_endpoint(
        &self,
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
    ) -> Option<&ServerEndpoint> {
        self.config.find_endpoint(
            endpoint_url,
            &self.config.base_endpoint_url(),
            security_policy,
            security_mode,
        )
    }

    /// The urls a hello may name
    pub fn endpoint_urls(&self) -> Vec<String> {
        let base = self.config.base_endpoint_url();
        self.config
            .endpoints
            .values()
            .map(|e| e.endpoint_url(&base))
            .collect()
    }

    /// The endpoints CreateSession returns for `endpoint_url`, ignoring its host. `None`
    /// if no endpoint has that path.
    pub fn new_endpoint_descriptions(
        &self,
        endpoint_url: &str,
    ) -> Option<Vec<EndpointDescription>> {
        let base = self.config.base_endpoint_url();
        let endpoints = self
            .config
            .endpoints
            .values()
            .filter(|e| url_matches_except_host(&e.endpoint_url(&base), endpoint_url))
            .map(|e| self.new_endpoint_description(e, false))
            .collect::<Vec<_>>();
        (!endpoints.is_empty()).then_some(endpoints)
    }

    fn user_identity_tokens(&self, endpoint: &ServerEndpoint) -> Vec<UserTokenPolicy> {
        let policy = |policy_id: &str, token_type| UserTokenPolicy {
            policy_id: UAString::from(policy_id),
            token_type,
            issued_token_type: UAString::null(),
            issuer_endpoint_url: UAString::null(),
            security_policy_uri: UAString::null(),
        };
        let mut policies = Vec::with_capacity(2);
        if endpoint.supports_anonymous() {
            policies.push(policy(POLICY_ID_ANONYMOUS, UserTokenType::Anonymous));
        }
        if endpoint.supports_user_pass(&self.config.user_tokens) {
            policies.push(policy(POLICY_ID_USER_PASS_NONE, UserTokenType::UserName));
        }
        if policies.is_empty() {
            debug!("Endpoint {} accepts no user tokens", endpoint.path);
        }
        policies
    }

    /// GetEndpoints describes the server in full, CreateSession leaves out its uris and name
    fn new_endpoint_description(
        &self,
        endpoint: &ServerEndpoint,
        full_server: bool,
    ) -> EndpointDescription {
        let mut server = self.application_description();
        if !full_server {
            server.application_uri = UAString::null();
            server.product_uri = UAString::null();
            server.application_name = LocalizedText::null();
        }
        EndpointDescription {
            endpoint_url: endpoint
                .endpoint_url(&self.config.base_endpoint_url())
                .into(),
            server,
            server_certificate: ByteString::null(),
            security_mode: endpoint.message_security_mode(),
            security_policy_uri: UAString::from(endpoint.security_policy().to_uri()),
            user_identity_tokens: Some(self.user_identity_tokens(endpoint)),
            transport_profile_uri: UAString::from(TRANSPORT_PROFILE_URI_BINARY),
            security_level: endpoint.security_level,
        }
    }

    pub fn application_description(&self) -> ApplicationDescription {
        self.config.application_description()
    }

    pub fn state(&self) -> ServerStateType {
        **self.state.load()
    }

    pub fn set_state(&self, state: ServerStateType) {
        self.state.store(Arc::new(state));
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerStateType::Running
    }

    pub fn start_time(&self) -> DateTime {
        **self.start_time.load()
    }

    pub fn build_info(&self) -> BuildInfo {
        BuildInfo {
            product_uri: UAString::from(&self.config.product_uri),
            manufacturer_name: UAString::from("VBL"),
            product_name: UAString::from(&self.config.application_name),
            software_version: UAString::from(env!("CARGO_PKG_VERSION")),
            build_number: UAString::from("1"),
            build_date: self.start_time(),
        }
    }

    /// Checks the identity token of ActivateSession against the endpoint the session was
    /// created on. Fails with `BadTcpEndpointUrlInvalid` if no endpoint matches.
    pub fn authenticate_endpoint(
        &self,
        endpoint_url: &str,
        security_policy: SecurityPolicy,
        security_mode: MessageSecurityMode,
        user_identity_token: &ExtensionObject,
    ) -> Result<UserToken, StatusCode> {
        let Some(endpoint) = self.find_endpoint(endpoint_url, security_policy, security_mode)
        else {
            error!(
                "No endpoint at {} with policy {:?} and mode {:?}",
                endpoint_url, security_policy, security_mode
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        };
        self.authenticator
            .authenticate(endpoint, user_identity_token, &self.decoding_options())
    }

    pub fn decoding_options(&self) -> DecodingOptions {
        self.config.decoding_options()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::authenticator::DefaultAuthenticator;

    use super::*;

    fn server_info() -> ServerInfo {
        let config = Arc::new(ServerConfig::factory());
        let authenticator = Arc::new(DefaultAuthenticator::new(config.user_tokens.clone()));
        ServerInfo::new(config, authenticator)
    }

    #[test]
    fn endpoints_describe_factory_endpoint() {
        let info = server_info();
        let endpoints = info
            .endpoints(&UAString::from("opc.tcp://localhost:4842/vblfactory"), &None)
            .unwrap();
        assert_eq!(endpoints.len(), 1);
        let endpoint = &endpoints[0];
        assert_eq!(
            endpoint.endpoint_url.as_ref(),
            "opc.tcp://0.0.0.0:4842/vblfactory"
        );
        assert_eq!(endpoint.security_mode, MessageSecurityMode::None);
        assert_eq!(
            endpoint.security_policy_uri.as_ref(),
            SecurityPolicy::None.to_uri()
        );
        let tokens = endpoint.user_identity_tokens.as_ref().unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token_type, UserTokenType::Anonymous);
        assert_eq!(
            endpoint.server.application_uri.as_ref(),
            "urn:vbl:digital-factory:opcua-server"
        );
    }

    #[test]
    fn endpoints_reject_foreign_transport() {
        let info = server_info();
        let profiles = Some(vec![UAString::from(
            "http://opcfoundation.org/UA-Profile/Transport/https-uabinary",
        )]);
        assert!(info
            .endpoints(&UAString::from("opc.tcp://localhost:4842/vblfactory"), &profiles)
            .is_none());
        let profiles = Some(vec![]);
        assert!(info
            .endpoints(&UAString::from("opc.tcp://localhost:4842/vblfactory"), &profiles)
            .is_some());
    }

    #[test]
    fn endpoint_lookup_by_url() {
        let info = server_info();
        assert!(info.endpoint_exists(
            "opc.tcp://factory-host:4842/vblfactory",
            SecurityPolicy::None,
            MessageSecurityMode::None
        ));
        assert!(info
            .new_endpoint_descriptions("opc.tcp://factory-host:4842/elsewhere")
            .is_none());
        assert_eq!(
            info.endpoint_urls(),
            vec!["opc.tcp://0.0.0.0:4842/vblfactory".to_string()]
        );
    }

    #[test]
    fn state_and_namespaces() {
        let info = server_info();
        assert!(!info.is_running());
        info.set_state(ServerStateType::Running);
        assert!(info.is_running());
        let namespaces = info.namespaces();
        assert_eq!(namespaces.len(), 3);
        assert_eq!(namespaces[2], FACTORY_NAMESPACE_URI);
    }

    #[test]
    fn authenticate_unknown_endpoint() {
        let info = server_info();
        assert_eq!(
            info.authenticate_endpoint(
                "opc.tcp://localhost:4842/nowhere",
                SecurityPolicy::None,
                MessageSecurityMode::None,
                &ExtensionObject::null()
            ),
            Err(StatusCode::BadTcpEndpointUrlInvalid)
        );
        assert!(info
            .authenticate_endpoint(
                "opc.tcp://localhost:4842/vblfactory",
                SecurityPolicy::None,
                MessageSecurityMode::None,
                &ExtensionObject::null()
            )
            .unwrap()
            .is_anonymous());
    }
}
