// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The nodes served to clients. Nodes live in a map keyed by node id, each behind its own
//! lock, and references are kept apart from them as pairs of ids.

use crate::types::{DataValue, NodeId};

pub use self::address_space::AddressSpace;
pub use self::node::NodeType;

/// Receives every change to a variable value. The subscription engine implements this so
/// monitored items see writes and feed updates as they happen.
pub trait DataChangeListener: Send + Sync {
    fn data_changed(&self, node_id: &NodeId, value: &DataValue);
}

/// Adds the reference helpers shared by node builders. The builder type must hold the node
/// under construction in `node` and the pending references in `references`.
macro_rules! node_builder_impl {
    ( $builder:ident, $node:ident ) => {
        use $crate::server::address_space::{
            address_space::AddressSpace, references::ReferenceDirection,
        };
        use $crate::types::node_ids::ReferenceTypeId;

        pub struct $builder {
            node: $node,
            references: Vec<(NodeId, NodeId, ReferenceDirection)>,
        }

        impl $builder {
            fn link(mut self, other: NodeId, reference_type: ReferenceTypeId, direction: ReferenceDirection) -> Self {
                self.references.push((other, reference_type.into(), direction));
                self
            }

            /// The node is the target of an Organizes reference from `parent`
            pub fn organized_by(self, parent: impl Into<NodeId>) -> Self {
                self.link(parent.into(), ReferenceTypeId::Organizes, ReferenceDirection::Inverse)
            }

            pub fn component_of(self, parent: impl Into<NodeId>) -> Self {
                self.link(parent.into(), ReferenceTypeId::HasComponent, ReferenceDirection::Inverse)
            }

            pub fn property_of(self, parent: impl Into<NodeId>) -> Self {
                self.link(parent.into(), ReferenceTypeId::HasProperty, ReferenceDirection::Inverse)
            }

            pub fn has_type_definition(self, type_id: impl Into<NodeId>) -> Self {
                self.link(type_id.into(), ReferenceTypeId::HasTypeDefinition, ReferenceDirection::Forward)
            }

            /// Adds the node and its references, failing if the node id is taken
            pub fn insert(self, address_space: &AddressSpace) -> Result<(), $crate::types::StatusCode> {
                let references = self
                    .references
                    .iter()
                    .map(|(other, reference_type, direction)| (other, reference_type, *direction))
                    .collect::<Vec<_>>();
                address_space.insert(self.node, &references)
            }
        }
    };
}

#[macro_use]
pub mod node;

pub mod address_space;
pub mod references;
pub mod relative_path;
mod standard_nodes;
pub mod types;
pub mod variable;
