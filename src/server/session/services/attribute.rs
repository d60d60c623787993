// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::{
    server::session::{controller::Response, message_handler::Request},
    types::{ReadRequest, ReadResponse, StatusCode, TimestampsToReturn, WriteRequest, WriteResponse},
};

pub fn read(mut request: Request<ReadRequest>) -> Response {
    let limit = request.operational_limits().max_nodes_per_read;
    let nodes_to_read = take_service_items!(request, request.request.nodes_to_read.take(), limit);
    if request.request.max_age < 0.0 {
        error!("Read request max age is less than zero");
        return service_fault!(request, StatusCode::BadMaxAgeInvalid);
    }
    let timestamps_to_return = request.request.timestamps_to_return;
    if timestamps_to_return == TimestampsToReturn::Invalid {
        error!("Read request has an invalid timestamps to return");
        return service_fault!(request, StatusCode::BadTimestampsToReturnInvalid);
    }

    let results = nodes_to_read
        .iter()
        .map(|node_to_read| request.address_space.read(node_to_read, timestamps_to_return))
        .collect();

    Response {
        message: ReadResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub fn write(mut request: Request<WriteRequest>) -> Response {
    let limit = request.operational_limits().max_nodes_per_write;
    let nodes_to_write =
        take_service_items!(request, request.request.nodes_to_write.take(), limit);

    let results = nodes_to_write
        .iter()
        .map(|node_to_write| {
            let status = request.address_space.write(node_to_write);
            if status.is_bad() {
                debug!(
                    "Write of node {} attribute {} failed with {}",
                    node_to_write.node_id, node_to_write.attribute_id, status
                );
            }
            status
        })
        .collect();

    Response {
        message: WriteResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}
