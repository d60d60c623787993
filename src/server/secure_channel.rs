// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Secure channel state. One connection carries exactly one secure channel, which is opened by
//! an OpenSecureChannel issue request, renewed with further requests and dropped on close or
//! when the connection goes away.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    core::{
        comms::{
            message_chunk::MessageChunkType,
            security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
            security_policy::SecurityPolicy,
        },
        handle::{AtomicHandle, Handle},
    },
    sync::RwLock,
    types::{
        service_types::{
            ChannelSecurityToken, MessageSecurityMode, OpenSecureChannelRequest,
            SecurityTokenRequestType,
        },
        ByteString, DateTime, StatusCode,
    },
};

use super::config::ChannelConfig;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecureChannelState {
    /// Not open, or closed for good
    Closed,
    /// The connection is established and waits for an issue request
    OpenPending,
    Open,
    /// A new token was issued and the client has not used it yet
    Renewing,
}

#[derive(Debug, Clone)]
struct ChannelToken {
    token_id: u32,
    created_at: DateTime,
    lifetime_ms: u32,
    expires_at: Instant,
}

impl ChannelToken {
    fn has_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct SecureChannel {
    secure_channel_id: u32,
    state: SecureChannelState,
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    current_token: Option<ChannelToken>,
    /// The token replaced by the last renew, accepted until its own expiry or until the client
    /// switches to the current one.
    previous_token: Option<ChannelToken>,
    token_ids: Handle,
}

impl SecureChannel {
    pub fn new(secure_channel_id: u32) -> SecureChannel {
        SecureChannel {
            secure_channel_id,
            state: SecureChannelState::OpenPending,
            security_policy: SecurityPolicy::Unknown,
            security_mode: MessageSecurityMode::Invalid,
            current_token: None,
            previous_token: None,
            token_ids: Handle::new(1),
        }
    }

    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    pub fn state(&self) -> SecureChannelState {
        self.state
    }

    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            SecureChannelState::Open | SecureChannelState::Renewing
        )
    }

    /// The id of the token responses are sent with
    pub fn token_id(&self) -> u32 {
        self.current_token.as_ref().map_or(0, |t| t.token_id)
    }

    /// Handles an OpenSecureChannel request, either issuing the first token or renewing it.
    pub fn process_open_request(
        &mut self,
        request: &OpenSecureChannelRequest,
        security_header: &AsymmetricSecurityHeader,
        hello_protocol_version: u32,
        config: &ChannelConfig,
        now: Instant,
    ) -> Result<ChannelSecurityToken, StatusCode> {
        if request.client_protocol_version != hello_protocol_version {
            error!(
                "Client sent a different protocol version ({}) than it did in the HELLO ({})",
                request.client_protocol_version, hello_protocol_version
            );
            return Err(StatusCode::BadProtocolVersionUnsupported);
        }
        match request.request_type {
            SecurityTokenRequestType::Issue => self.open(request, security_header, config, now),
            SecurityTokenRequestType::Renew => self.renew(request, security_header, config, now),
        }
    }

    /// Opens the channel with its first token.
    pub fn open(
        &mut self,
        request: &OpenSecureChannelRequest,
        security_header: &AsymmetricSecurityHeader,
        config: &ChannelConfig,
        now: Instant,
    ) -> Result<ChannelSecurityToken, StatusCode> {
        if !matches!(
            self.state,
            SecureChannelState::Closed | SecureChannelState::OpenPending
        ) {
            error!(
                "Secure channel {} is already open, cannot issue",
                self.secure_channel_id
            );
            return Err(StatusCode::BadUnexpectedError);
        }

        let security_policy = Self::security_policy_from_header(security_header)?;
        if request.security_mode == MessageSecurityMode::Invalid
            || (security_policy == SecurityPolicy::None)
                != (request.security_mode == MessageSecurityMode::None)
        {
            error!(
                "Security mode {:?} is not acceptable with policy {}",
                request.security_mode, security_policy
            );
            return Err(StatusCode::BadSecurityModeRejected);
        }

        self.security_policy = security_policy;
        self.security_mode = request.security_mode;
        self.current_token = Some(self.issue_token(request.requested_lifetime, config, now));
        self.previous_token = None;
        self.state = SecureChannelState::Open;

        info!(
            "Secure channel {} opened, policy {}, mode {:?}",
            self.secure_channel_id, self.security_policy, self.security_mode
        );
        Ok(self.security_token())
    }

    /// Issues a new token for an open channel. The token being replaced stays valid until
    /// it expires. Renewing again before the new token is used replaces the pending token.
    pub fn renew(
        &mut self,
        request: &OpenSecureChannelRequest,
        security_header: &AsymmetricSecurityHeader,
        config: &ChannelConfig,
        now: Instant,
    ) -> Result<ChannelSecurityToken, StatusCode> {
        if !self.is_open() || self.current_token.is_none() {
            error!(
                "Secure channel {} cannot be renewed in state {:?}",
                self.secure_channel_id, self.state
            );
            return Err(StatusCode::BadUnexpectedError);
        }
        if Self::security_policy_from_header(security_header)? != self.security_policy {
            error!("Renew request asks for a different security policy");
            return Err(StatusCode::BadSecurityPolicyRejected);
        }
        if request.security_mode != self.security_mode {
            error!("Renew request asks for a different security mode");
            return Err(StatusCode::BadSecurityModeRejected);
        }

        let token = self.issue_token(request.requested_lifetime, config, now);
        if self.state == SecureChannelState::Renewing {
            // The client never used the pending token, the one it does use stays valid
            self.current_token = Some(token);
        } else {
            self.previous_token = self.current_token.replace(token);
            self.state = SecureChannelState::Renewing;
        }
        debug!(
            "Secure channel {} renewed, token id {}",
            self.secure_channel_id,
            self.token_id()
        );
        Ok(self.security_token())
    }

    /// Checks that a message addressed with the channel and token id may be processed.
    pub fn validate_message(
        &mut self,
        secure_channel_id: u32,
        token_id: u32,
        now: Instant,
    ) -> Result<(), StatusCode> {
        if !self.is_open() {
            error!(
                "Message for secure channel {} which is not open",
                secure_channel_id
            );
            return Err(StatusCode::BadSecureChannelIdInvalid);
        }
        if secure_channel_id != self.secure_channel_id {
            error!(
                "Message is for secure channel {} but the connection is secure channel {}",
                secure_channel_id, self.secure_channel_id
            );
            return Err(StatusCode::BadSecureChannelIdInvalid);
        }

        match self.current_token {
            Some(ref token) if token.token_id == token_id => {
                if token.has_expired(now) {
                    error!(
                        "Token {} of secure channel {} has expired",
                        token_id, self.secure_channel_id
                    );
                    return Err(StatusCode::BadSecureChannelTokenUnknown);
                }
                if self.state == SecureChannelState::Renewing {
                    // The client has switched to the new token
                    self.previous_token = None;
                    self.state = SecureChannelState::Open;
                }
                return Ok(());
            }
            _ => {}
        }

        match self.previous_token {
            Some(ref token) if token.token_id == token_id && !token.has_expired(now) => Ok(()),
            _ => {
                error!(
                    "Token {} is not valid for secure channel {}",
                    token_id, self.secure_channel_id
                );
                Err(StatusCode::BadSecureChannelTokenUnknown)
            }
        }
    }

    /// True when the channel was opened and every token it handed out has expired
    pub fn has_expired(&self, now: Instant) -> bool {
        self.is_open()
            && self
                .current_token
                .iter()
                .chain(self.previous_token.iter())
                .all(|t| t.has_expired(now))
    }

    /// When the current token expires, if there is one
    pub fn token_expiry(&self) -> Option<Instant> {
        self.current_token.as_ref().map(|t| t.expires_at)
    }

    pub fn close(&mut self) {
        if self.state != SecureChannelState::Closed {
            info!("Secure channel {} closed", self.secure_channel_id);
        }
        self.state = SecureChannelState::Closed;
        self.current_token = None;
        self.previous_token = None;
    }

    /// Nonces are only exchanged for policies that sign or encrypt
    pub fn server_nonce(&self) -> ByteString {
        ByteString::null()
    }

    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none())
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id(),
            }),
        }
    }

    fn security_policy_from_header(
        security_header: &AsymmetricSecurityHeader,
    ) -> Result<SecurityPolicy, StatusCode> {
        let security_policy = if security_header.is_security_policy_none() {
            SecurityPolicy::None
        } else {
            SecurityPolicy::from_uri(security_header.security_policy_uri.as_ref())
        };
        if !security_policy.is_supported() {
            error!(
                "Security policy \"{}\" is unknown or unsupported",
                security_header.security_policy_uri
            );
            return Err(StatusCode::BadSecurityPolicyRejected);
        }
        Ok(security_policy)
    }

    fn issue_token(
        &mut self,
        requested_lifetime: u32,
        config: &ChannelConfig,
        now: Instant,
    ) -> ChannelToken {
        let lifetime_ms = config.revise_token_lifetime(requested_lifetime);
        ChannelToken {
            token_id: self.token_ids.next(),
            created_at: DateTime::now(),
            lifetime_ms,
            expires_at: now + Duration::from_millis(lifetime_ms as u64),
        }
    }

    fn security_token(&self) -> ChannelSecurityToken {
        let (token_id, created_at, revised_lifetime) = match self.current_token {
            Some(ref token) => (token.token_id, token.created_at, token.lifetime_ms),
            None => (0, DateTime::now(), 0),
        };
        ChannelSecurityToken {
            channel_id: self.secure_channel_id,
            token_id,
            created_at,
            revised_lifetime,
        }
    }
}

/// Allocates secure channel ids and keeps track of the live channels.
pub struct SecureChannelManager {
    channel_ids: AtomicHandle,
    channels: RwLock<HashMap<u32, Arc<RwLock<SecureChannel>>>>,
}

impl Default for SecureChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureChannelManager {
    pub fn new() -> Self {
        Self {
            channel_ids: AtomicHandle::new(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a channel for a newly established connection
    pub fn create_channel(&self) -> Arc<RwLock<SecureChannel>> {
        let id = self.channel_ids.next();
        let channel = Arc::new(RwLock::new(SecureChannel::new(id)));
        trace_write_lock!(self.channels).insert(id, channel.clone());
        channel
    }

    pub fn get(&self, secure_channel_id: u32) -> Option<Arc<RwLock<SecureChannel>>> {
        trace_read_lock!(self.channels)
            .get(&secure_channel_id)
            .cloned()
    }

    /// Closes and forgets the channel
    pub fn remove(&self, secure_channel_id: u32) {
        let channel = trace_write_lock!(self.channels).remove(&secure_channel_id);
        if let Some(channel) = channel {
            trace_write_lock!(channel).close();
        }
    }

    pub fn len(&self) -> usize {
        trace_read_lock!(self.channels).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::types::RequestHeader;

    use super::*;

    fn open_request(request_type: SecurityTokenRequestType, lifetime: u32) -> OpenSecureChannelRequest {
        OpenSecureChannelRequest {
            request_header: RequestHeader::dummy(),
            client_protocol_version: 0,
            request_type,
            security_mode: MessageSecurityMode::None,
            client_nonce: ByteString::null(),
            requested_lifetime: lifetime,
        }
    }

    fn open_channel(now: Instant) -> (SecureChannel, ChannelConfig) {
        let config = ChannelConfig::default();
        let mut channel = SecureChannel::new(7);
        let token = channel
            .process_open_request(
                &open_request(SecurityTokenRequestType::Issue, 20_000),
                &AsymmetricSecurityHeader::none(),
                0,
                &config,
                now,
            )
            .unwrap();
        assert_eq!(token.channel_id, 7);
        assert_eq!(token.token_id, 1);
        assert_eq!(token.revised_lifetime, 20_000);
        (channel, config)
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Instant::now();
        let (mut channel, _) = open_channel(now);
        assert_eq!(channel.state(), SecureChannelState::Open);
        assert!(channel.validate_message(7, 1, now).is_ok());
        assert!(channel
            .validate_message(7, 1, now + Duration::from_millis(19_999))
            .is_ok());

        let later = now + Duration::from_millis(20_000);
        assert_eq!(
            channel.validate_message(7, 1, later),
            Err(StatusCode::BadSecureChannelTokenUnknown)
        );
        assert!(channel.has_expired(later));
    }

    #[test]
    fn renewed_token_overlaps_previous() {
        let now = Instant::now();
        let (mut channel, config) = open_channel(now);

        let renew_at = now + Duration::from_millis(15_000);
        let token = channel
            .process_open_request(
                &open_request(SecurityTokenRequestType::Renew, 20_000),
                &AsymmetricSecurityHeader::none(),
                0,
                &config,
                renew_at,
            )
            .unwrap();
        assert_eq!(token.token_id, 2);
        assert_eq!(channel.state(), SecureChannelState::Renewing);

        // The old token is still good until it expires
        assert!(channel.validate_message(7, 1, renew_at).is_ok());
        assert_eq!(channel.state(), SecureChannelState::Renewing);

        // First use of the new token retires the old one
        assert!(channel.validate_message(7, 2, renew_at).is_ok());
        assert_eq!(channel.state(), SecureChannelState::Open);
        assert_eq!(
            channel.validate_message(7, 1, renew_at),
            Err(StatusCode::BadSecureChannelTokenUnknown)
        );
        assert!(!channel.has_expired(now + Duration::from_millis(25_000)));
    }

    #[test]
    fn renew_twice_replaces_pending_token() {
        let now = Instant::now();
        let (mut channel, config) = open_channel(now);
        let renew = |channel: &mut SecureChannel| {
            channel
                .process_open_request(
                    &open_request(SecurityTokenRequestType::Renew, 20_000),
                    &AsymmetricSecurityHeader::none(),
                    0,
                    &config,
                    now,
                )
                .unwrap()
        };
        assert_eq!(renew(&mut channel).token_id, 2);
        assert_eq!(renew(&mut channel).token_id, 3);
        assert_eq!(channel.state(), SecureChannelState::Renewing);

        // The token in use still works, the abandoned one does not
        assert!(channel.validate_message(7, 1, now).is_ok());
        assert_eq!(
            channel.validate_message(7, 2, now),
            Err(StatusCode::BadSecureChannelTokenUnknown)
        );
        assert!(channel.validate_message(7, 3, now).is_ok());
        assert_eq!(channel.state(), SecureChannelState::Open);
    }

    #[test]
    fn renew_before_issue_fails() {
        let config = ChannelConfig::default();
        let mut channel = SecureChannel::new(1);
        assert_eq!(
            channel.process_open_request(
                &open_request(SecurityTokenRequestType::Renew, 0),
                &AsymmetricSecurityHeader::none(),
                0,
                &config,
                Instant::now(),
            ),
            Err(StatusCode::BadUnexpectedError)
        );
    }

    #[test]
    fn bad_open_requests() {
        let config = ChannelConfig::default();
        let now = Instant::now();

        let mut channel = SecureChannel::new(1);
        assert_eq!(
            channel.process_open_request(
                &open_request(SecurityTokenRequestType::Issue, 0),
                &AsymmetricSecurityHeader::none(),
                1,
                &config,
                now,
            ),
            Err(StatusCode::BadProtocolVersionUnsupported)
        );

        let mut header = AsymmetricSecurityHeader::none();
        header.security_policy_uri =
            "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256".into();
        assert_eq!(
            channel.open(
                &open_request(SecurityTokenRequestType::Issue, 0),
                &header,
                &config,
                now
            ),
            Err(StatusCode::BadSecurityPolicyRejected)
        );

        let mut request = open_request(SecurityTokenRequestType::Issue, 0);
        request.security_mode = MessageSecurityMode::Invalid;
        assert_eq!(
            channel.open(&request, &AsymmetricSecurityHeader::none(), &config, now),
            Err(StatusCode::BadSecurityModeRejected)
        );

        // A lifetime of 0 takes the default
        let token = channel
            .open(
                &open_request(SecurityTokenRequestType::Issue, 0),
                &AsymmetricSecurityHeader::none(),
                &config,
                now,
            )
            .unwrap();
        assert_eq!(token.revised_lifetime, config.default_token_lifetime_ms);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let now = Instant::now();
        let (mut channel, _) = open_channel(now);
        assert_eq!(
            channel.validate_message(8, 1, now),
            Err(StatusCode::BadSecureChannelIdInvalid)
        );
        assert_eq!(
            channel.validate_message(7, 5, now),
            Err(StatusCode::BadSecureChannelTokenUnknown)
        );
        channel.close();
        assert_eq!(
            channel.validate_message(7, 1, now),
            Err(StatusCode::BadSecureChannelIdInvalid)
        );
    }

    #[test]
    fn manager_allocates_unique_ids() {
        let manager = SecureChannelManager::new();
        let a = manager.create_channel();
        let b = manager.create_channel();
        let a_id = a.read().secure_channel_id();
        let b_id = b.read().secure_channel_id();
        assert!(b_id > a_id);
        assert_eq!(manager.len(), 2);
        manager.remove(a_id);
        assert!(manager.get(a_id).is_none());
        assert_eq!(a.read().state(), SecureChannelState::Closed);
        assert!(manager.get(b_id).is_some());
    }
}
