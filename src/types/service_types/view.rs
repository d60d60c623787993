// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    byte_string::ByteString, date_time::DateTime, diagnostic_info::DiagnosticInfo,
    localized_text::LocalizedText, node_id::*, qualified_name::QualifiedName,
    request_header::RequestHeader, response_header::ResponseHeader, service_types::enums::*,
    status_code::StatusCode,
};

ua_struct! {
    #[derive(Default)]
    pub struct ViewDescription {
        pub view_id: NodeId,
        pub timestamp: DateTime,
        pub view_version: u32,
    }
}

ua_struct! {
    pub struct BrowseDescription {
        pub node_id: NodeId,
        pub browse_direction: BrowseDirection,
        pub reference_type_id: NodeId,
        pub include_subtypes: bool,
        pub node_class_mask: u32,
        pub result_mask: u32,
    }
}

bitflags! {
    /// The fields of a `ReferenceDescription` that a browse should fill in
    pub struct BrowseDescriptionResultMask: u32 {
        const RESULT_MASK_REFERENCE_TYPE = 1;
        const RESULT_MASK_IS_FORWARD = 1 << 1;
        const RESULT_MASK_NODE_CLASS = 1 << 2;
        const RESULT_MASK_BROWSE_NAME = 1 << 3;
        const RESULT_MASK_DISPLAY_NAME = 1 << 4;
        const RESULT_MASK_TYPE_DEFINITION = 1 << 5;
    }
}

ua_struct! {
    pub struct ReferenceDescription {
        pub reference_type_id: NodeId,
        pub is_forward: bool,
        pub node_id: ExpandedNodeId,
        pub browse_name: QualifiedName,
        pub display_name: LocalizedText,
        pub node_class: NodeClass,
        pub type_definition: ExpandedNodeId,
    }
}

ua_struct! {
    pub struct BrowseResult {
        pub status_code: StatusCode,
        pub continuation_point: ByteString,
        pub references: Option<Vec<ReferenceDescription>>,
    }
}

impl BrowseResult {
    pub fn from_status(status_code: StatusCode) -> BrowseResult {
        BrowseResult {
            status_code,
            continuation_point: ByteString::null(),
            references: None,
        }
    }
}

ua_struct! {
    pub struct BrowseRequest [BrowseRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub view: ViewDescription,
        /// 0 means no limit
        pub requested_max_references_per_node: u32,
        pub nodes_to_browse: Option<Vec<BrowseDescription>>,
    }
}

ua_struct! {
    pub struct BrowseResponse [BrowseResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowseResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct BrowseNextRequest [BrowseNextRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub release_continuation_points: bool,
        pub continuation_points: Option<Vec<ByteString>>,
    }
}

ua_struct! {
    pub struct BrowseNextResponse [BrowseNextResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowseResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct RelativePathElement {
        pub reference_type_id: NodeId,
        pub is_inverse: bool,
        pub include_subtypes: bool,
        pub target_name: QualifiedName,
    }
}

ua_struct! {
    pub struct RelativePath {
        pub elements: Option<Vec<RelativePathElement>>,
    }
}

ua_struct! {
    pub struct BrowsePath {
        pub starting_node: NodeId,
        pub relative_path: RelativePath,
    }
}

ua_struct! {
    pub struct BrowsePathTarget {
        pub target_id: ExpandedNodeId,
        pub remaining_path_index: u32,
    }
}

ua_struct! {
    pub struct BrowsePathResult {
        pub status_code: StatusCode,
        pub targets: Option<Vec<BrowsePathTarget>>,
    }
}

ua_struct! {
    pub struct TranslateBrowsePathsToNodeIdsRequest [TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary] {
        pub request_header: RequestHeader,
        pub browse_paths: Option<Vec<BrowsePath>>,
    }
}

ua_struct! {
    pub struct TranslateBrowsePathsToNodeIdsResponse [TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary] {
        pub response_header: ResponseHeader,
        pub results: Option<Vec<BrowsePathResult>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
