// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    server::session::{controller::Response, message_handler::Request},
    types::{
        CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, DeleteMonitoredItemsRequest,
        DeleteMonitoredItemsResponse, ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse,
        SetMonitoringModeRequest, SetMonitoringModeResponse,
    },
};

pub fn create_monitored_items(request: Request<CreateMonitoredItemsRequest>) -> Response {
    check_service_items!(
        request,
        request.request.items_to_create,
        request.operational_limits().max_monitored_items_per_call
    );
    match request.subscriptions.create_monitored_items(
        request.session_id,
        &request.request,
        &request.info,
        &request.address_space,
    ) {
        Ok(results) => Response {
            message: CreateMonitoredItemsResponse {
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

pub fn modify_monitored_items(request: Request<ModifyMonitoredItemsRequest>) -> Response {
    check_service_items!(
        request,
        request.request.items_to_modify,
        request.operational_limits().max_monitored_items_per_call
    );
    match request
        .subscriptions
        .modify_monitored_items(request.session_id, &request.request, &request.info)
    {
        Ok(results) => Response {
            message: ModifyMonitoredItemsResponse {
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

pub fn set_monitoring_mode(mut request: Request<SetMonitoringModeRequest>) -> Response {
    let limit = request.operational_limits().max_monitored_items_per_call;
    let ids = take_service_items!(request, request.request.monitored_item_ids.take(), limit);
    match request.subscriptions.set_monitoring_mode(
        request.session_id,
        request.request.subscription_id,
        request.request.monitoring_mode,
        &ids,
    ) {
        Ok(results) => Response {
            message: SetMonitoringModeResponse {
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

pub fn delete_monitored_items(mut request: Request<DeleteMonitoredItemsRequest>) -> Response {
    let limit = request.operational_limits().max_monitored_items_per_call;
    let ids = take_service_items!(request, request.request.monitored_item_ids.take(), limit);
    match request.subscriptions.delete_monitored_items(
        request.session_id,
        request.request.subscription_id,
        &ids,
    ) {
        Ok(results) => Response {
            message: DeleteMonitoredItemsResponse {
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
