// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::VecDeque;

use crate::{
    server::session::{
        continuation_points::BrowseContinuationPoint, controller::Response,
        message_handler::Request,
    },
    types::{
        BrowseNextRequest, BrowseNextResponse, BrowsePathResult, BrowsePathTarget, BrowseRequest,
        BrowseResponse, BrowseResult, ByteString, StatusCode, TranslateBrowsePathsToNodeIdsRequest,
        TranslateBrowsePathsToNodeIdsResponse,
    },
};

pub fn browse(mut request: Request<BrowseRequest>) -> Response {
    let limits = request.operational_limits().clone();
    let nodes_to_browse =
        take_service_items!(request, request.request.nodes_to_browse.take(), limits.max_nodes_per_browse);
    if !request.request.view.view_id.is_null() {
        // Views are not supported
        return service_fault!(request, StatusCode::BadViewIdUnknown);
    }

    let server_max = if limits.max_references_per_browse_node == 0 {
        usize::MAX
    } else {
        limits.max_references_per_browse_node
    };
    let requested_max = request.request.requested_max_references_per_node as usize;
    let max_references_per_node = if requested_max == 0 {
        server_max
    } else {
        requested_max.min(server_max)
    };

    let results = nodes_to_browse
        .iter()
        .map(|node_to_browse| {
            let references = match request.address_space.browse(node_to_browse, usize::MAX) {
                Ok(references) => references,
                Err(status_code) => return BrowseResult::from_status(status_code),
            };
            if references.len() <= max_references_per_node {
                return BrowseResult {
                    status_code: StatusCode::Good,
                    continuation_point: ByteString::null(),
                    references: Some(references),
                };
            }

            // What does not fit is handed out later by BrowseNext
            let mut remaining: VecDeque<_> = references.into();
            let first_page = remaining.drain(..max_references_per_node).collect();
            let continuation_point = BrowseContinuationPoint::new(
                &request.address_space,
                max_references_per_node,
                remaining,
            );
            let id = continuation_point.id.clone();
            let mut session = trace_write_lock!(request.session);
            if session.add_browse_continuation_point(continuation_point).is_err() {
                warn!(
                    "Browse of node {} needs a continuation point but the session has none left",
                    node_to_browse.node_id
                );
                return BrowseResult::from_status(StatusCode::BadNoContinuationPoints);
            }
            BrowseResult {
                status_code: StatusCode::Good,
                continuation_point: id,
                references: Some(first_page),
            }
        })
        .collect();

    Response {
        message: BrowseResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub fn browse_next(mut request: Request<BrowseNextRequest>) -> Response {
    let limit = request.operational_limits().max_nodes_per_browse;
    let continuation_points =
        take_service_items!(request, request.request.continuation_points.take(), limit);
    let release = request.request.release_continuation_points;

    let results = {
        let mut session = trace_write_lock!(request.session);
        continuation_points
            .iter()
            .map(|id| {
                let continuation_point = session.remove_browse_continuation_point(id);
                if release {
                    return BrowseResult::from_status(if continuation_point.is_some() {
                        StatusCode::Good
                    } else {
                        StatusCode::BadContinuationPointInvalid
                    });
                }
                let Some(mut continuation_point) = continuation_point else {
                    debug!("Browse next continuation point {:?} is unknown", id);
                    return BrowseResult::from_status(StatusCode::BadContinuationPointInvalid);
                };
                if !continuation_point.is_valid_browse_continuation_point(&request.address_space) {
                    debug!("Browse next continuation point is stale, the address space has changed");
                    return BrowseResult::from_status(StatusCode::BadContinuationPointInvalid);
                }
                let (references, done) = continuation_point.next_page();
                let continuation_point = if done {
                    ByteString::null()
                } else {
                    let id = continuation_point.id.clone();
                    // The point was removed above so there is always room to put it back
                    let _ = session.add_browse_continuation_point(continuation_point);
                    id
                };
                BrowseResult {
                    status_code: StatusCode::Good,
                    continuation_point,
                    references: Some(references),
                }
            })
            .collect()
    };

    Response {
        message: BrowseNextResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}

pub fn translate_browse_paths(mut request: Request<TranslateBrowsePathsToNodeIdsRequest>) -> Response {
    let limit = request
        .operational_limits()
        .max_nodes_per_translate_browse_paths_to_node_ids;
    let browse_paths = take_service_items!(request, request.request.browse_paths.take(), limit);

    let results = browse_paths
        .iter()
        .map(|browse_path| {
            match request
                .address_space
                .translate_browse_path(&browse_path.starting_node, &browse_path.relative_path)
            {
                Ok(nodes) if nodes.is_empty() => BrowsePathResult {
                    status_code: StatusCode::BadNoMatch,
                    targets: None,
                },
                Ok(nodes) => BrowsePathResult {
                    status_code: StatusCode::Good,
                    targets: Some(
                        nodes
                            .into_iter()
                            .map(|node_id| BrowsePathTarget {
                                target_id: node_id.into(),
                                remaining_path_index: u32::MAX,
                            })
                            .collect(),
                    ),
                },
                Err(status_code) => BrowsePathResult {
                    status_code,
                    targets: None,
                },
            }
        })
        .collect();

    Response {
        message: TranslateBrowsePathsToNodeIdsResponse {
            response_header: request.response_header(),
            results: Some(results),
            diagnostic_infos: None,
        }
        .into(),
        request_id: request.request_id,
    }
}
