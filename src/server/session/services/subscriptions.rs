// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    server::session::{controller::Response, message_handler::Request},
    types::{
        CreateSubscriptionRequest, DeleteSubscriptionsRequest, DeleteSubscriptionsResponse,
        ModifySubscriptionRequest, RepublishRequest, SetPublishingModeRequest,
        TransferSubscriptionsRequest,
    },
};

pub fn create_subscription(request: Request<CreateSubscriptionRequest>) -> Response {
    let key = request.session_key();
    match request.subscriptions.create_subscription(
        request.session_id,
        &key,
        &request.request,
        &request.info,
    ) {
        Ok(response) => Response {
            message: response.into(),
            request_id: request.request_id,
        },
        Err(status_code) => service_fault!(request, status_code),
    }
}

pub fn modify_subscription(request: Request<ModifySubscriptionRequest>) -> Response {
    match request
        .subscriptions
        .modify_subscription(request.session_id, &request.request)
    {
        Ok(response) => Response {
            message: response.into(),
            request_id: request.request_id,
        },
        Err(status_code) => service_fault!(request, status_code),
    }
}

pub fn set_publishing_mode(request: Request<SetPublishingModeRequest>) -> Response {
    check_service_items!(
        request,
        request.request.subscription_ids,
        request.operational_limits().max_subscriptions_per_call
    );
    match request
        .subscriptions
        .set_publishing_mode(request.session_id, &request.request)
    {
        Ok(response) => Response {
            message: response.into(),
            request_id: request.request_id,
        },
        Err(status_code) => service_fault!(request, status_code),
    }
}

pub fn delete_subscriptions(mut request: Request<DeleteSubscriptionsRequest>) -> Response {
    let limit = request.operational_limits().max_subscriptions_per_call;
    let ids = take_service_items!(request, request.request.subscription_ids.take(), limit);
    match request
        .subscriptions
        .delete_subscriptions(request.session_id, &ids)
    {
        Ok(results) => Response {
            message: DeleteSubscriptionsResponse {
                response_header: request.response_header(),
                results: Some(results),
                diagnostic_infos: None,
            }
            .into(),
            request_id: request.request_id,
        },
        Err(status_code) => service_fault!(request, status_code),
    }
}

pub fn transfer_subscriptions(request: Request<TransferSubscriptionsRequest>) -> Response {
    check_service_items!(
        request,
        request.request.subscription_ids,
        request.operational_limits().max_subscriptions_per_call
    );
    let key = request.session_key();
    let response = request
        .subscriptions
        .transfer(&request.request, request.session_id, &key);
    Response {
        message: response.into(),
        request_id: request.request_id,
    }
}

pub fn republish(request: Request<RepublishRequest>) -> Response {
    match request
        .subscriptions
        .republish(request.session_id, &request.request)
    {
        Ok(response) => Response {
            message: response.into(),
            request_id: request.request_id,
        },
        Err(status_code) => service_fault!(request, status_code),
    }
}
