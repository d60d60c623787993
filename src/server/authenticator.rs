// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Authentication of the identity tokens supplied with ActivateSession.

use std::{collections::BTreeMap, fmt::Debug};

use crate::types::{
    service_types::{AnonymousIdentityToken, UserNameIdentityToken},
    DecodingOptions, ExtensionObject, ObjectId, StatusCode,
};

use super::config::{ServerEndpoint, ServerUserToken, ANONYMOUS_USER_TOKEN_ID};

pub struct Password(String);

/// The identity a session was activated with, the id of a configured user token or
/// `ANONYMOUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken(pub String);

impl Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"****").finish()
    }
}

impl UserToken {
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_USER_TOKEN_ID.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_USER_TOKEN_ID
    }
}

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

/// Decides who may activate a session on an endpoint. Implementations must be cheap since
/// they are called while the session is being activated.
#[allow(unused)]
pub trait AuthManager: Send + Sync + 'static {
    fn authenticate_anonymous_token(
        &self,
        endpoint: &ServerEndpoint,
    ) -> Result<UserToken, StatusCode> {
        Err(StatusCode::BadIdentityTokenRejected)
    }

    fn authenticate_username_identity_token(
        &self,
        endpoint: &ServerEndpoint,
        username: &str,
        password: &Password,
    ) -> Result<UserToken, StatusCode> {
        Err(StatusCode::BadIdentityTokenRejected)
    }

    /// Decodes the identity token of an ActivateSession request and authenticates it. A null
    /// token is treated as anonymous.
    fn authenticate(
        &self,
        endpoint: &ServerEndpoint,
        user_identity_token: &ExtensionObject,
        decoding_options: &DecodingOptions,
    ) -> Result<UserToken, StatusCode> {
        if user_identity_token.is_null() {
            return self.authenticate_anonymous_token(endpoint);
        }
        match user_identity_token.object_id() {
            Ok(ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary) => {
                let _token = user_identity_token
                    .decode_inner::<AnonymousIdentityToken>(decoding_options)
                    .map_err(|_| StatusCode::BadIdentityTokenInvalid)?;
                self.authenticate_anonymous_token(endpoint)
            }
            Ok(ObjectId::UserNameIdentityToken_Encoding_DefaultBinary) => {
                let token = user_identity_token
                    .decode_inner::<UserNameIdentityToken>(decoding_options)
                    .map_err(|_| StatusCode::BadIdentityTokenInvalid)?;
                if token.user_name.is_empty() {
                    error!("User name identity token has no user name");
                    return Err(StatusCode::BadIdentityTokenInvalid);
                }
                let password = Password::new(token.plaintext_password()?);
                self.authenticate_username_identity_token(
                    endpoint,
                    token.user_name.as_ref(),
                    &password,
                )
            }
            _ => {
                error!(
                    "Identity token of type {:?} is not supported",
                    user_identity_token.node_id
                );
                Err(StatusCode::BadIdentityTokenInvalid)
            }
        }
    }
}

/// Authenticates against the user tokens of the server configuration
pub struct DefaultAuthenticator {
    users: BTreeMap<String, ServerUserToken>,
}

impl DefaultAuthenticator {
    pub fn new(users: BTreeMap<String, ServerUserToken>) -> Self {
        Self { users }
    }
}

impl AuthManager for DefaultAuthenticator {
    fn authenticate_anonymous_token(
        &self,
        endpoint: &ServerEndpoint,
    ) -> Result<UserToken, StatusCode> {
        if !endpoint.supports_anonymous() {
            error!(
                "Endpoint \"{}\" does not support anonymous authentication",
                endpoint.path
            );
            return Err(StatusCode::BadIdentityTokenRejected);
        }
        Ok(UserToken::anonymous())
    }

    fn authenticate_username_identity_token(
        &self,
        endpoint: &ServerEndpoint,
        username: &str,
        password: &Password,
    ) -> Result<UserToken, StatusCode> {
        if !endpoint.supports_user_pass(&self.users) {
            error!(
                "Endpoint \"{}\" does not support user name authentication",
                endpoint.path
            );
            return Err(StatusCode::BadIdentityTokenRejected);
        }
        let token_password = password.get();
        for user_token_id in &endpoint.user_token_ids {
            if let Some(server_user_token) = self.users.get(user_token_id) {
                if server_user_token.user == username {
                    // Password compared as UTF-8 bytes, a missing one only matches empty
                    let server_password = server_user_token.pass.as_deref().unwrap_or("");
                    return if server_password.as_bytes() == token_password.as_bytes() {
                        Ok(UserToken(user_token_id.clone()))
                    } else {
                        error!(
                            "Cannot authenticate \"{}\", password is invalid",
                            server_user_token.user
                        );
                        Err(StatusCode::BadUserAccessDenied)
                    };
                }
            }
        }
        error!(
            "Cannot authenticate \"{}\", user not found for endpoint",
            username
        );
        Err(StatusCode::BadUserAccessDenied)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{ByteString, UAString};

    use super::*;

    fn authenticator() -> (DefaultAuthenticator, ServerEndpoint) {
        let mut users = BTreeMap::new();
        users.insert(
            "operator".to_string(),
            ServerUserToken::user_pass("op", "secret"),
        );
        let endpoint = ServerEndpoint::new_none(
            "/vblfactory",
            &["operator".to_string(), ANONYMOUS_USER_TOKEN_ID.to_string()],
        );
        (DefaultAuthenticator::new(users), endpoint)
    }

    fn user_name_token(user: &str, pass: &str) -> ExtensionObject {
        ExtensionObject::from_message(&UserNameIdentityToken {
            policy_id: UAString::from("username"),
            user_name: UAString::from(user),
            password: ByteString::from(pass.as_bytes().to_vec()),
            encryption_algorithm: UAString::null(),
        })
    }

    #[test]
    fn anonymous_tokens() {
        let (auth, endpoint) = authenticator();
        let options = DecodingOptions::test();
        let token = auth
            .authenticate(&endpoint, &ExtensionObject::null(), &options)
            .unwrap();
        assert!(token.is_anonymous());

        let anonymous = ExtensionObject::from_message(&AnonymousIdentityToken {
            policy_id: UAString::from("anonymous"),
        });
        assert!(auth
            .authenticate(&endpoint, &anonymous, &options)
            .unwrap()
            .is_anonymous());

        let no_anonymous = ServerEndpoint::new_none("/vblfactory", &["operator".to_string()]);
        assert_eq!(
            auth.authenticate(&no_anonymous, &anonymous, &options),
            Err(StatusCode::BadIdentityTokenRejected)
        );
    }

    #[test]
    fn user_name_tokens() {
        let (auth, endpoint) = authenticator();
        let options = DecodingOptions::test();
        assert_eq!(
            auth.authenticate(&endpoint, &user_name_token("op", "secret"), &options),
            Ok(UserToken("operator".to_string()))
        );
        assert_eq!(
            auth.authenticate(&endpoint, &user_name_token("op", "wrong"), &options),
            Err(StatusCode::BadUserAccessDenied)
        );
        assert_eq!(
            auth.authenticate(&endpoint, &user_name_token("nobody", "secret"), &options),
            Err(StatusCode::BadUserAccessDenied)
        );
        assert_eq!(
            auth.authenticate(&endpoint, &user_name_token("", "secret"), &options),
            Err(StatusCode::BadIdentityTokenInvalid)
        );
    }

    #[test]
    fn unknown_token_type_is_invalid() {
        let (auth, endpoint) = authenticator();
        let token = ExtensionObject::from_encodable(
            ObjectId::ServiceFault_Encoding_DefaultBinary,
            &UAString::from("junk"),
        );
        assert_eq!(
            auth.authenticate(&endpoint, &token, &DecodingOptions::test()),
            Err(StatusCode::BadIdentityTokenInvalid)
        );
    }
}
