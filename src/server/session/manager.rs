// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Instant,
};

use crate::{
    server::{
        info::ServerInfo, secure_channel::SecureChannel, subscriptions::SubscriptionCache,
    },
    sync::RwLock,
    types::{
        service_types::{
            ActivateSessionRequest, ActivateSessionResponse, CloseSessionRequest,
            CloseSessionResponse, CreateSessionRequest, CreateSessionResponse, SignatureData,
        },
        ByteString, Guid, NodeId, ResponseHeader, StatusCode,
    },
};

use super::instance::Session;

lazy_static! {
    static ref NEXT_SESSION_ID: AtomicU32 = AtomicU32::new(1);
}

pub(super) fn next_session_id() -> (NodeId, u32) {
    // Session id will be a string identifier
    let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    (NodeId::new(1, format!("Session-{}", session_id)), session_id)
}

/// Length of the nonces handed out by CreateSession and ActivateSession
const SESSION_NONCE_LENGTH: usize = 32;

/// Manages all sessions on the server. Each session is behind its own lock, the manager
/// is only locked to look sessions up or to add and remove them.
pub struct SessionManager {
    sessions: HashMap<NodeId, Arc<RwLock<Session>>>,
    info: Arc<ServerInfo>,
    subscriptions: Arc<SubscriptionCache>,
}

impl SessionManager {
    pub(crate) fn new(info: Arc<ServerInfo>, subscriptions: Arc<SubscriptionCache>) -> Self {
        Self {
            sessions: HashMap::new(),
            info,
            subscriptions,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get a session by its authentication token.
    pub fn find_by_token(&self, authentication_token: &NodeId) -> Option<Arc<RwLock<Session>>> {
        self.sessions
            .values()
            .find(|s| &trace_read_lock!(s).authentication_token == authentication_token)
            .cloned()
    }

    pub fn get(&self, session_id: &NodeId) -> Option<Arc<RwLock<Session>>> {
        self.sessions.get(session_id).cloned()
    }

    pub(crate) fn create_session(
        &mut self,
        channel: &SecureChannel,
        request: &CreateSessionRequest,
        now: Instant,
    ) -> Result<CreateSessionResponse, StatusCode> {
        let config = &self.info.config;
        if self.sessions.len() >= config.session.max_sessions {
            error!(
                "Cannot create a session, the limit of {} sessions has been reached",
                config.session.max_sessions
            );
            return Err(StatusCode::BadTooManySessions);
        }

        if request.endpoint_url.is_null() {
            error!("Create session was passed an null endpoint url");
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }
        let Some(endpoints) = self
            .info
            .new_endpoint_descriptions(request.endpoint_url.as_ref())
        else {
            error!(
                "Create session endpoint url {} does not match any endpoint",
                request.endpoint_url
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        };

        let session_timeout = config
            .session
            .revise_session_timeout(request.requested_session_timeout);
        let max_request_message_size = config.limits.max_message_size as u32;
        let authentication_token = NodeId::new(0, Guid::new());
        let server_nonce = ByteString::random(SESSION_NONCE_LENGTH);

        let session = Session::create(
            channel,
            request,
            authentication_token.clone(),
            server_nonce.clone(),
            session_timeout,
            config.limits.max_browse_continuation_points,
            now,
        );

        let session_id = session.session_id().clone();
        info!(
            "Created session {} \"{}\" on secure channel {}, timeout {}ms",
            session_id,
            session.session_name(),
            channel.secure_channel_id(),
            session_timeout
        );
        self.sessions
            .insert(session_id.clone(), Arc::new(RwLock::new(session)));

        Ok(CreateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            session_id,
            authentication_token,
            revised_session_timeout: session_timeout,
            server_nonce,
            server_certificate: ByteString::null(),
            server_endpoints: Some(endpoints),
            server_software_certificates: None,
            server_signature: SignatureData::default(),
            max_request_message_size,
        })
    }

    pub(crate) fn activate_session(
        &self,
        channel: &SecureChannel,
        request: &ActivateSessionRequest,
        now: Instant,
    ) -> Result<ActivateSessionResponse, StatusCode> {
        let Some(session) = self.find_by_token(&request.request_header.authentication_token) else {
            return Err(StatusCode::BadSessionIdInvalid);
        };

        let mut session = trace_write_lock!(session);
        if session.is_closed() {
            return Err(StatusCode::BadSessionIdInvalid);
        }
        session.validate_timed_out(now)?;

        let security_policy = channel.security_policy();
        let security_mode = channel.security_mode();
        let secure_channel_id = channel.secure_channel_id();
        let endpoint_url = session.endpoint_url().as_ref().to_string();

        if !self
            .info
            .endpoint_exists(&endpoint_url, security_policy, security_mode)
        {
            error!(
                "activate_session, endpoint does not exist for requested url & mode {}, {:?} / {:?}",
                endpoint_url, security_policy, security_mode
            );
            return Err(StatusCode::BadTcpEndpointUrlInvalid);
        }

        let user_token = self.info.authenticate_endpoint(
            &endpoint_url,
            security_policy,
            security_mode,
            &request.user_identity_token,
        )?;

        if session.secure_channel_id() != Some(secure_channel_id) {
            if !session.is_activated() {
                error!(
                    "activate session, rejected secure channel id {} for inactive session, it was created on {:?}",
                    secure_channel_id,
                    session.secure_channel_id()
                );
                return Err(StatusCode::BadSecureChannelIdInvalid);
            }
            // Moving to another channel is only allowed for the same user
            if session.user_token() != Some(&user_token) {
                error!(
                    "activate session, user {} cannot take over session {} on secure channel {}",
                    user_token.0,
                    session.session_id(),
                    secure_channel_id
                );
                return Err(StatusCode::BadUserAccessDenied);
            }
            info!(
                "Session {} moves to secure channel {}",
                session.session_id(),
                secure_channel_id
            );
        }

        session.activate(
            secure_channel_id,
            security_mode,
            ByteString::random(SESSION_NONCE_LENGTH),
            user_token,
        );
        debug!("Activated session {}", session.session_id());

        Ok(ActivateSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            server_nonce: session.session_nonce().clone(),
            results: None,
            diagnostic_infos: None,
        })
    }

    /// Closes a session. Closing a session that is already gone succeeds.
    pub(crate) fn close_session(
        &mut self,
        secure_channel_id: u32,
        request: &CloseSessionRequest,
    ) -> Result<CloseSessionResponse, StatusCode> {
        let response = CloseSessionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
        };
        let Some(session) = self.find_by_token(&request.request_header.authentication_token) else {
            debug!("Close session for a session that does not exist, nothing to do");
            return Ok(response);
        };

        let session_id = {
            let session = trace_read_lock!(session);
            if session.secure_channel_id() != Some(secure_channel_id) {
                error!(
                    "close_session rejected, secure channel id {} is not the channel of session {}",
                    secure_channel_id,
                    session.session_id()
                );
                return Err(StatusCode::BadSecureChannelIdInvalid);
            }
            session.session_id().clone()
        };

        let delete_subscriptions = request.delete_subscriptions
            || !self.info.config.session.subscriptions_outlive_sessions;
        self.remove_session(&session_id, delete_subscriptions);
        Ok(response)
    }

    /// Closes every session idle for longer than its timeout. Returns the numeric ids of the
    /// sessions closed.
    pub(crate) fn sweep_expired(&mut self, now: Instant) -> Vec<u32> {
        let expired: Vec<NodeId> = self
            .sessions
            .iter()
            .filter(|(_, s)| trace_read_lock!(s).deadline() < now)
            .map(|(id, _)| id.clone())
            .collect();

        let delete_subscriptions = !self.info.config.session.subscriptions_outlive_sessions;
        expired
            .iter()
            .filter_map(|id| {
                info!("Session {} has expired", id);
                self.remove_session(id, delete_subscriptions)
            })
            .collect()
    }

    /// Detaches the sessions bound to a secure channel that has closed. Their publish
    /// requests can no longer be answered.
    pub(crate) fn detach_channel(&self, secure_channel_id: u32) {
        for session in self.sessions.values() {
            let mut session = trace_write_lock!(session);
            if session.secure_channel_id() == Some(secure_channel_id) {
                debug!(
                    "Session {} is detached from closed secure channel {}",
                    session.session_id(),
                    secure_channel_id
                );
                session.detach();
                self.subscriptions.cancel_publish_requests(
                    session.session_id_numeric(),
                    StatusCode::BadSecureChannelClosed,
                );
            }
        }
    }

    /// Closes every session, as the server shuts down
    pub(crate) fn close_all(&mut self) {
        let ids: Vec<NodeId> = self.sessions.keys().cloned().collect();
        for id in ids {
            self.remove_session(&id, true);
        }
    }

    fn remove_session(&mut self, session_id: &NodeId, delete_subscriptions: bool) -> Option<u32> {
        let session = self.sessions.remove(session_id)?;
        let numeric_id = {
            let mut session = trace_write_lock!(session);
            session.close();
            session.session_id_numeric()
        };
        info!(
            "Session {} closed, {} subscriptions",
            session_id,
            if delete_subscriptions {
                "deleting"
            } else {
                "detaching"
            }
        );
        self.subscriptions
            .close_session(numeric_id, delete_subscriptions);
        Some(numeric_id)
    }
}
