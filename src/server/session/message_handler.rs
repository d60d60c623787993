// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::{sync::Arc, time::Instant};

use chrono::Utc;

use crate::{
    server::{
        address_space::AddressSpace,
        authenticator::UserToken,
        config::OperationalLimits,
        info::ServerInfo,
        subscriptions::{PendingPublish, PersistentSessionKey, SubscriptionCache},
    },
    sync::RwLock,
    types::{
        service_types::{PublishRequest, ServiceFault},
        DateTime, ResponseHeader, StatusCode, SupportedMessage,
    },
};

use super::{controller::Response, instance::Session, services};

/// Routes the requests of activated sessions to the services.
pub(crate) struct MessageHandler {
    info: Arc<ServerInfo>,
    address_space: Arc<AddressSpace>,
    subscriptions: Arc<SubscriptionCache>,
}

pub(crate) enum HandleMessageResult {
    /// The publish response arrives later through the subscription cache
    PublishResponse(PendingPublishRequest),
    SyncMessage(Response),
}

pub(crate) struct PendingPublishRequest {
    request_id: u32,
    request_handle: u32,
    recv: tokio::sync::oneshot::Receiver<SupportedMessage>,
}

impl PendingPublishRequest {
    pub async fn recv(self) -> Response {
        match self.recv.await {
            Ok(msg) => Response {
                message: msg,
                request_id: self.request_id,
            },
            Err(_) => {
                // The subscription cache always answers a publish it has taken
                warn!("Failed to receive response to publish request, sender dropped.");
                Response {
                    message: ServiceFault::for_request_handle(
                        self.request_handle,
                        StatusCode::BadInternalError,
                    )
                    .into(),
                    request_id: self.request_id,
                }
            }
        }
    }
}

/// A request of an activated session, with everything a service needs to answer it.
pub(crate) struct Request<T> {
    pub request: Box<T>,
    pub request_id: u32,
    pub request_handle: u32,
    pub info: Arc<ServerInfo>,
    pub session: Arc<RwLock<Session>>,
    pub token: UserToken,
    pub address_space: Arc<AddressSpace>,
    pub subscriptions: Arc<SubscriptionCache>,
    pub session_id: u32,
}

macro_rules! service_fault {
    ($req:ident, $status:expr) => {
        $crate::server::session::controller::Response {
            message: $crate::types::service_types::ServiceFault::for_request_handle(
                $req.request_handle,
                $status,
            )
            .into(),
            request_id: $req.request_id,
        }
    };
}

/// Takes the operations of a request, answering with a fault when there are none or more than
/// the limit allows. A limit of 0 means no limit.
macro_rules! take_service_items {
    ($req:ident, $items:expr, $limit:expr) => {{
        let Some(items) = $items else {
            return service_fault!($req, $crate::types::StatusCode::BadNothingToDo);
        };
        if items.is_empty() {
            return service_fault!($req, $crate::types::StatusCode::BadNothingToDo);
        }
        let limit: usize = $limit;
        if limit > 0 && items.len() > limit {
            return service_fault!($req, $crate::types::StatusCode::BadTooManyOperations);
        }
        items
    }};
}

/// Checks the operations of a request without taking them, see `take_service_items`.
macro_rules! check_service_items {
    ($req:ident, $items:expr, $limit:expr) => {{
        let len = $items.as_ref().map(|items| items.len()).unwrap_or(0);
        if len == 0 {
            return service_fault!($req, $crate::types::StatusCode::BadNothingToDo);
        }
        let limit: usize = $limit;
        if limit > 0 && len > limit {
            return service_fault!($req, $crate::types::StatusCode::BadTooManyOperations);
        }
    }};
}

impl<T> Request<T> {
    /// The identity that owns the subscriptions of the session
    pub fn session_key(&self) -> PersistentSessionKey {
        let session = trace_read_lock!(self.session);
        PersistentSessionKey::new(
            &self.token,
            session.message_security_mode(),
            session.application_description().application_uri.as_ref(),
        )
    }

    pub fn response_header(&self) -> ResponseHeader {
        ResponseHeader::with_timestamp(
            DateTime::now(),
            self.request_handle,
            StatusCode::Good,
        )
    }

    pub fn operational_limits(&self) -> &OperationalLimits {
        &self.info.config.limits.operational
    }
}

/// The session a request was validated against
pub(crate) struct RequestData {
    pub request_id: u32,
    pub request_handle: u32,
    pub session: Arc<RwLock<Session>>,
    pub token: UserToken,
    pub session_id: u32,
}

macro_rules! service_call {
    ($m:path, $slf:ident, $req:ident, $r:ident) => {
        HandleMessageResult::SyncMessage($m($slf.request($req, $r)))
    };
}

impl MessageHandler {
    pub fn new(
        info: Arc<ServerInfo>,
        address_space: Arc<AddressSpace>,
        subscriptions: Arc<SubscriptionCache>,
    ) -> Self {
        Self {
            info,
            address_space,
            subscriptions,
        }
    }

    fn request<T>(&self, request: Box<T>, data: RequestData) -> Request<T> {
        Request {
            request,
            request_id: data.request_id,
            request_handle: data.request_handle,
            info: self.info.clone(),
            session: data.session,
            token: data.token,
            address_space: self.address_space.clone(),
            subscriptions: self.subscriptions.clone(),
            session_id: data.session_id,
        }
    }

    pub fn handle_message(&self, message: SupportedMessage, data: RequestData) -> HandleMessageResult {
        // Secure channel, session and discovery requests are handled by the controller.
        match message {
            SupportedMessage::ReadRequest(request) => {
                service_call!(services::read, self, request, data)
            }

            SupportedMessage::WriteRequest(request) => {
                service_call!(services::write, self, request, data)
            }

            SupportedMessage::BrowseRequest(request) => {
                service_call!(services::browse, self, request, data)
            }

            SupportedMessage::BrowseNextRequest(request) => {
                service_call!(services::browse_next, self, request, data)
            }

            SupportedMessage::TranslateBrowsePathsToNodeIdsRequest(request) => {
                service_call!(services::translate_browse_paths, self, request, data)
            }

            SupportedMessage::CallRequest(request) => {
                service_call!(services::call, self, request, data)
            }

            SupportedMessage::CreateSubscriptionRequest(request) => {
                service_call!(services::create_subscription, self, request, data)
            }

            SupportedMessage::ModifySubscriptionRequest(request) => {
                service_call!(services::modify_subscription, self, request, data)
            }

            SupportedMessage::SetPublishingModeRequest(request) => {
                service_call!(services::set_publishing_mode, self, request, data)
            }

            SupportedMessage::DeleteSubscriptionsRequest(request) => {
                service_call!(services::delete_subscriptions, self, request, data)
            }

            SupportedMessage::TransferSubscriptionsRequest(request) => {
                service_call!(services::transfer_subscriptions, self, request, data)
            }

            SupportedMessage::RepublishRequest(request) => {
                service_call!(services::republish, self, request, data)
            }

            SupportedMessage::CreateMonitoredItemsRequest(request) => {
                service_call!(services::create_monitored_items, self, request, data)
            }

            SupportedMessage::ModifyMonitoredItemsRequest(request) => {
                service_call!(services::modify_monitored_items, self, request, data)
            }

            SupportedMessage::SetMonitoringModeRequest(request) => {
                service_call!(services::set_monitoring_mode, self, request, data)
            }

            SupportedMessage::DeleteMonitoredItemsRequest(request) => {
                service_call!(services::delete_monitored_items, self, request, data)
            }

            SupportedMessage::PublishRequest(request) => self.publish(request, data),

            message => {
                debug!(
                    "Message handler does not handle this kind of message {:?}",
                    message
                );
                HandleMessageResult::SyncMessage(Response {
                    message: ServiceFault::for_request_handle(
                        data.request_handle,
                        StatusCode::BadServiceUnsupported,
                    )
                    .into(),
                    request_id: data.request_id,
                })
            }
        }
    }

    fn publish(&self, request: Box<PublishRequest>, data: RequestData) -> HandleMessageResult {
        let now = Utc::now();
        let now_instant = Instant::now();
        let (send, recv) = tokio::sync::oneshot::channel();
        let timeout = request.request_header.timeout_hint;
        let timeout = if timeout == 0 {
            self.info.config.publish_timeout_default_ms
        } else {
            timeout.into()
        };

        let req = PendingPublish {
            response: send,
            request,
            ack_results: None,
            deadline: now_instant + std::time::Duration::from_millis(timeout),
        };
        self.subscriptions
            .enqueue_publish_request(data.session_id, &now, now_instant, req);
        HandleMessageResult::PublishResponse(PendingPublishRequest {
            request_id: data.request_id,
            request_handle: data.request_handle,
            recv,
        })
    }
}
