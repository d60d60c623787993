// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::HashSet;

use crate::types::{
    service_types::{NodeClass, RelativePath, RelativePathElement},
    NodeId, QualifiedName, StatusCode,
};

use super::address_space::AddressSpace;

impl AddressSpace {
    /// Given a browse path consisting of browse names, walk the hierarchical references from the
    /// parent until a single node is found. Every node on the path must be an object or variable.
    pub fn find_node_from_browse_path(
        &self,
        parent_node_id: &NodeId,
        browse_path: &[QualifiedName],
    ) -> Result<NodeId, StatusCode> {
        if browse_path.is_empty() {
            return Err(StatusCode::BadNotFound);
        }
        let mut parent_node_id = parent_node_id.clone();
        for browse_name in browse_path {
            let found_node_id = self
                .find_hierarchical_references(&parent_node_id)
                .into_iter()
                .find(|node_id| {
                    matches!(
                        self.node_class(node_id),
                        Some(NodeClass::Object) | Some(NodeClass::Variable)
                    ) && self.browse_name(node_id).as_ref() == Some(browse_name)
                });
            match found_node_id {
                Some(found_node_id) => parent_node_id = found_node_id,
                None => return Err(StatusCode::BadNotFound),
            }
        }
        Ok(parent_node_id)
    }

    /// Given a `RelativePath`, find all the nodes that match against it. Each element is
    /// followed one level from every node matched by the previous element.
    pub fn translate_browse_path(
        &self,
        node_id: &NodeId,
        relative_path: &RelativePath,
    ) -> Result<Vec<NodeId>, StatusCode> {
        if !self.node_exists(node_id) {
            trace!("translate_browse_path cannot find node {}", node_id);
            return Err(StatusCode::BadNodeIdUnknown);
        }
        let elements = match relative_path.elements {
            Some(ref elements) if !elements.is_empty() => elements,
            _ => {
                warn!("translate_browse_path elements are empty");
                return Err(StatusCode::BadNothingToDo);
            }
        };

        let mut matching_nodes = vec![node_id.clone()];
        for element in elements {
            if element.target_name.is_null() {
                warn!("translate_browse_path browse name is invalid (null)");
                return Err(StatusCode::BadBrowseNameInvalid);
            }
            let next_matching_nodes = matching_nodes
                .iter()
                .flat_map(|node_id| {
                    trace!("Following relative path on node {}", node_id);
                    self.follow_relative_path(node_id, element)
                })
                .collect::<Vec<_>>();
            if next_matching_nodes.is_empty() {
                warn!("translate_browse_path bad no match");
                return Err(StatusCode::BadNoMatch);
            }
            matching_nodes = next_matching_nodes;
        }
        Ok(matching_nodes)
    }

    fn follow_relative_path(&self, node_id: &NodeId, element: &RelativePathElement) -> Vec<NodeId> {
        let reference_filter = if element.reference_type_id.is_null() {
            None
        } else {
            Some((&element.reference_type_id, element.include_subtypes))
        };
        let references = if element.is_inverse {
            self.find_inverse_references(node_id, reference_filter)
        } else {
            self.find_references(node_id, reference_filter)
        };

        let mut found = HashSet::with_capacity(references.len());
        let mut result = Vec::with_capacity(references.len());
        for reference in references {
            if found.contains(&reference.target_node) {
                continue;
            }
            if self.browse_name(&reference.target_node).as_ref() == Some(&element.target_name) {
                found.insert(reference.target_node.clone());
                result.push(reference.target_node);
            }
        }
        result
    }
}
