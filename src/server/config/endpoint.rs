// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
};

use crate::{core::comms::security_policy::SecurityPolicy, types::MessageSecurityMode};

use super::server::{ServerUserToken, ANONYMOUS_USER_TOKEN_ID};

/// An endpoint offered below the server's base url. Channels to this server are never
/// signed or encrypted, so the policy and mode are both `None` in a valid endpoint.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerEndpoint {
    /// Appended to the base url, e.g. `/vblfactory`
    pub path: String,
    pub security_policy: String,
    pub security_mode: String,
    /// Advertised to clients choosing between endpoints
    #[serde(default)]
    pub security_level: u8,
    /// Ids of the user tokens allowed to activate sessions on the endpoint
    pub user_token_ids: BTreeSet<String>,
}

impl ServerEndpoint {
    pub fn new_none<T>(path: T, user_token_ids: &[String]) -> Self
    where
        T: Into<String>,
    {
        let mode: &'static str = MessageSecurityMode::None.into();
        ServerEndpoint {
            path: path.into(),
            security_policy: SecurityPolicy::None.to_string(),
            security_mode: mode.to_string(),
            security_level: 0,
            user_token_ids: user_token_ids.iter().cloned().collect(),
        }
    }

    pub fn is_valid(&self, id: &str, user_tokens: &BTreeMap<String, ServerUserToken>) -> bool {
        let unknown_tokens = self
            .user_token_ids
            .iter()
            .filter(|t| *t != ANONYMOUS_USER_TOKEN_ID && !user_tokens.contains_key(*t))
            .inspect(|t| error!("Endpoint {} refers to user token {} which does not exist", id, t))
            .count();

        let policy_ok = match (self.security_policy(), self.message_security_mode()) {
            (SecurityPolicy::None, MessageSecurityMode::None) => true,
            (SecurityPolicy::Unknown, _) => {
                error!(
                    "Endpoint {} has an unknown security policy \"{}\"",
                    id, self.security_policy
                );
                false
            }
            (policy, mode) => {
                error!(
                    "Endpoint {} asks for policy {} with mode {:?}, only None / None is available",
                    id, policy, mode
                );
                false
            }
        };
        unknown_tokens == 0 && policy_ok
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        SecurityPolicy::from_str(&self.security_policy).unwrap_or(SecurityPolicy::Unknown)
    }

    pub fn message_security_mode(&self) -> MessageSecurityMode {
        MessageSecurityMode::from(self.security_mode.as_ref())
    }

    pub fn endpoint_url(&self, base_endpoint: &str) -> String {
        format!("{}{}", base_endpoint, self.path)
    }

    pub fn supports_anonymous(&self) -> bool {
        self.user_token_ids.contains(ANONYMOUS_USER_TOKEN_ID)
    }

    /// True if any configured user name / password token may use the endpoint
    pub fn supports_user_pass(&self, server_tokens: &BTreeMap<String, ServerUserToken>) -> bool {
        self.user_token_ids
            .iter()
            .any(|id| id != ANONYMOUS_USER_TOKEN_ID && server_tokens.contains_key(id))
    }
}
