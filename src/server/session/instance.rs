// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;

use super::continuation_points::BrowseContinuationPoint;
use super::manager::next_session_id;
use crate::server::authenticator::UserToken;
use crate::server::secure_channel::SecureChannel;
use crate::types::{
    service_types::{ApplicationDescription, CreateSessionRequest, MessageSecurityMode},
    ByteString, NodeId, StatusCode, UAString,
};

/// A client session. It is created on one secure channel, may outlive it, and is only
/// usable for services once a user has activated it.
pub struct Session {
    session_id: NodeId,
    session_id_numeric: u32,
    /// `None` after the channel it was bound to closed
    secure_channel_id: Option<u32>,
    pub(super) authentication_token: NodeId,
    /// Last nonce handed to the client, replaced on every activation
    session_nonce: ByteString,
    session_name: UAString,
    endpoint_url: UAString,
    client: ApplicationDescription,
    security_mode: MessageSecurityMode,
    session_timeout: Duration,
    /// Updated by every service call that passes `validate_timed_out`
    last_seen: ArcSwap<Instant>,
    max_browse_continuation_points: usize,
    browse_continuation_points: HashMap<ByteString, BrowseContinuationPoint>,
    user_token: Option<UserToken>,
    is_closed: bool,
}

impl Session {
    /// Builds the session a CreateSession request asks for. The caller has already
    /// revised the timeout and checked the endpoint url.
    pub(crate) fn create(
        channel: &SecureChannel,
        request: &CreateSessionRequest,
        authentication_token: NodeId,
        session_nonce: ByteString,
        session_timeout_ms: f64,
        max_browse_continuation_points: usize,
        now: Instant,
    ) -> Self {
        let (session_id, session_id_numeric) = next_session_id();
        Self {
            session_id,
            session_id_numeric,
            secure_channel_id: Some(channel.secure_channel_id()),
            authentication_token,
            session_nonce,
            session_name: request.session_name.clone(),
            endpoint_url: request.endpoint_url.clone(),
            client: request.client_description.clone(),
            security_mode: channel.security_mode(),
            session_timeout: Duration::from_millis(session_timeout_ms as u64),
            last_seen: ArcSwap::new(Arc::new(now)),
            max_browse_continuation_points,
            browse_continuation_points: HashMap::new(),
            user_token: None,
            is_closed: false,
        }
    }

    /// Fails with `BadSessionIdInvalid` once the timeout has passed since the last call,
    /// otherwise records `now` as the last call.
    pub(crate) fn validate_timed_out(&self, now: Instant) -> Result<(), StatusCode> {
        let idle = now.saturating_duration_since(**self.last_seen.load());
        if idle > self.session_timeout {
            // Removed by the next sweep
            error!(
                "Session {} timed out, no service call for {}ms",
                self.session_id,
                idle.as_millis()
            );
            return Err(StatusCode::BadSessionIdInvalid);
        }
        self.last_seen.store(Arc::new(now));
        Ok(())
    }

    /// The instant after which the session counts as timed out
    pub fn deadline(&self) -> Instant {
        **self.last_seen.load() + self.session_timeout
    }

    pub(crate) fn validate_activated(&self) -> Result<&UserToken, StatusCode> {
        // A handle to the session can outlive its removal from the manager
        if self.is_closed {
            return Err(StatusCode::BadSessionClosed);
        }
        self.user_token
            .as_ref()
            .ok_or(StatusCode::BadSessionNotActivated)
    }

    pub(crate) fn validate_secure_channel_id(
        &self,
        secure_channel_id: u32,
    ) -> Result<(), StatusCode> {
        match self.secure_channel_id {
            Some(id) if id == secure_channel_id => Ok(()),
            _ => Err(StatusCode::BadSecureChannelIdInvalid),
        }
    }

    /// Binds the session to the channel the activation arrived on.
    pub(crate) fn activate(
        &mut self,
        secure_channel_id: u32,
        security_mode: MessageSecurityMode,
        server_nonce: ByteString,
        user_token: UserToken,
    ) {
        self.secure_channel_id = Some(secure_channel_id);
        self.security_mode = security_mode;
        self.session_nonce = server_nonce;
        self.user_token = Some(user_token);
    }

    /// The session's channel went away. It waits for activation on another channel
    /// or for its timeout.
    pub(crate) fn detach(&mut self) {
        self.secure_channel_id = None;
        self.browse_continuation_points.clear();
    }

    pub(crate) fn close(&mut self) {
        self.is_closed = true;
        self.browse_continuation_points.clear();
    }

    pub fn session_id(&self) -> &NodeId {
        &self.session_id
    }

    pub fn session_id_numeric(&self) -> u32 {
        self.session_id_numeric
    }

    pub fn session_name(&self) -> &str {
        self.session_name.as_ref()
    }

    pub fn endpoint_url(&self) -> &UAString {
        &self.endpoint_url
    }

    pub fn session_nonce(&self) -> &ByteString {
        &self.session_nonce
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    pub fn secure_channel_id(&self) -> Option<u32> {
        self.secure_channel_id
    }

    pub fn is_activated(&self) -> bool {
        !self.is_closed && self.user_token.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    pub fn user_token(&self) -> Option<&UserToken> {
        self.user_token.as_ref()
    }

    /// Description the client sent with CreateSession
    pub fn application_description(&self) -> &ApplicationDescription {
        &self.client
    }

    pub fn message_security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Stores `cp` unless the session already holds its limit of continuation points.
    /// A limit of 0 means no limit.
    pub(crate) fn add_browse_continuation_point(
        &mut self,
        cp: BrowseContinuationPoint,
    ) -> Result<(), ()> {
        let max = self.max_browse_continuation_points;
        if max > 0 && self.browse_continuation_points.len() >= max {
            return Err(());
        }
        self.browse_continuation_points.insert(cp.id.clone(), cp);
        Ok(())
    }

    pub(crate) fn remove_browse_continuation_point(
        &mut self,
        id: &ByteString,
    ) -> Option<BrowseContinuationPoint> {
        self.browse_continuation_points.remove(id)
    }

    pub fn browse_continuation_point_count(&self) -> usize {
        self.browse_continuation_points.len()
    }
}
