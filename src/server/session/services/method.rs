// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    server::session::{controller::Response, message_handler::Request},
    types::{
        CallMethodRequest, CallMethodResult, CallRequest, CallResponse, MethodId, NodeId, ObjectId,
        StatusCode, Variant,
    },
};

pub fn call(mut request: Request<CallRequest>) -> Response {
    let limit = request.operational_limits().max_nodes_per_method_call;
    let methods_to_call =
        take_service_items!(request, request.request.methods_to_call.take(), limit);

    let results = methods_to_call
        .iter()
        .map(|method| call_method(&request, method))
        .collect();

    Response {
        message: CallResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

fn call_method(request: &Request<CallRequest>, method: &CallMethodRequest) -> CallMethodResult {
    if !request.address_space.node_exists(&method.object_id) {
        return StatusCode::BadNodeIdUnknown.into();
    }
    let get_monitored_items: NodeId = MethodId::Server_GetMonitoredItems.into();
    let server: NodeId = ObjectId::Server.into();
    if method.method_id == get_monitored_items && method.object_id == server {
        get_monitored_items_method(request, method)
    } else {
        debug!(
            "Call of method {} on object {} has no handler",
            method.method_id, method.object_id
        );
        StatusCode::BadMethodInvalid.into()
    }
}

/// Server.GetMonitoredItems(SubscriptionId) -> (ServerHandles, ClientHandles)
fn get_monitored_items_method(
    request: &Request<CallRequest>,
    method: &CallMethodRequest,
) -> CallMethodResult {
    let arguments = method.input_arguments.as_deref().unwrap_or_default();
    let subscription_id = match arguments {
        [] => return StatusCode::BadArgumentsMissing.into(),
        [Variant::UInt32(id)] => *id,
        [_] => {
            return CallMethodResult {
                status_code: StatusCode::BadInvalidArgument,
                input_argument_results: Some(vec![StatusCode::BadTypeMismatch]),
                input_argument_diagnostic_infos: None,
                output_arguments: None,
            }
        }
        _ => return StatusCode::BadTooManyArguments.into(),
    };

    match request
        .subscriptions
        .get_monitored_items(request.session_id, subscription_id)
    {
        Ok((server_handles, client_handles)) => CallMethodResult {
            status_code: StatusCode::Good,
            input_argument_results: Some(vec![StatusCode::Good]),
            input_argument_diagnostic_infos: None,
            output_arguments: Some(vec![server_handles.into(), client_handles.into()]),
        },
        Err(status_code) => status_code.into(),
    }
}
