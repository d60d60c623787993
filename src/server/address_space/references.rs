// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::{HashMap, HashSet};

use crate::types::{node_ids::ReferenceTypeId, service_types::BrowseDirection, NodeId};

/// The `NodeId` is the target node. The reference is held in a list by the source node.
/// The target node does not need to exist.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct Reference {
    pub reference_type: NodeId,
    pub target_node: NodeId,
}

impl Reference {
    pub fn new<T>(reference_type: T, target_node: NodeId) -> Reference
    where
        T: Into<NodeId>,
    {
        Reference {
            reference_type: reference_type.into(),
            target_node,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReferenceDirection {
    Forward,
    Inverse,
}

/// The reference store. References are pairs of node ids kept apart from the nodes, so the
/// graph may contain cycles without nodes owning one another.
pub struct References {
    /// Forward references keyed by the source node
    references_map: HashMap<NodeId, Vec<Reference>>,
    /// Reverse lookup from a target node to the nodes that reference it
    referenced_by_map: HashMap<NodeId, HashSet<NodeId>>,
}

impl Default for References {
    fn default() -> Self {
        Self {
            references_map: HashMap::with_capacity(500),
            referenced_by_map: HashMap::with_capacity(500),
        }
    }
}

impl References {
    /// Inserts references from the source node, flipping the inverse ones around.
    pub fn insert(
        &mut self,
        source_node: &NodeId,
        references: &[(&NodeId, &NodeId, ReferenceDirection)],
    ) {
        references
            .iter()
            .for_each(|(node, reference_type, direction)| match direction {
                ReferenceDirection::Forward => {
                    self.insert_reference(source_node, node, *reference_type)
                }
                ReferenceDirection::Inverse => {
                    self.insert_reference(node, source_node, *reference_type)
                }
            });
    }

    pub fn insert_reference<T>(&mut self, source_node: &NodeId, target_node: &NodeId, reference_type: T)
    where
        T: Into<NodeId>,
    {
        if source_node == target_node {
            error!(
                "Reference from node {} to itself is not allowed and has been ignored",
                source_node
            );
            return;
        }

        let reference = Reference::new(reference_type, target_node.clone());
        let references = self
            .references_map
            .entry(source_node.clone())
            .or_insert_with(|| Vec::with_capacity(8));
        if !references.contains(&reference) {
            references.push(reference);
        }

        self.referenced_by_map
            .entry(target_node.clone())
            .or_default()
            .insert(source_node.clone());
    }

    /// Deletes the reference of the type between the source and the target. Returns true if
    /// it existed.
    pub fn delete_reference<T>(&mut self, source_node: &NodeId, target_node: &NodeId, reference_type: T) -> bool
    where
        T: Into<NodeId>,
    {
        let reference_type = reference_type.into();
        let (deleted, still_referenced, now_empty) =
            match self.references_map.get_mut(source_node) {
                Some(references) => {
                    let before = references.len();
                    references.retain(|r| {
                        r.reference_type != reference_type || r.target_node != *target_node
                    });
                    let still_referenced = references.iter().any(|r| r.target_node == *target_node);
                    (before != references.len(), still_referenced, references.is_empty())
                }
                None => (false, false, false),
            };
        if now_empty {
            self.references_map.remove(source_node);
        }
        if deleted && !still_referenced {
            self.remove_lookup(target_node, source_node);
        }
        deleted
    }

    /// Deletes every reference to and from the node.
    pub fn delete_node_references(&mut self, node: &NodeId) -> bool {
        let mut deleted = false;
        if let Some(references) = self.references_map.remove(node) {
            deleted = true;
            references
                .iter()
                .map(|r| r.target_node.clone())
                .collect::<HashSet<_>>()
                .iter()
                .for_each(|target| self.remove_lookup(target, node));
        }
        if let Some(sources) = self.referenced_by_map.remove(node) {
            deleted = true;
            for source in sources {
                let now_empty = match self.references_map.get_mut(&source) {
                    Some(references) => {
                        references.retain(|r| r.target_node != *node);
                        references.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.references_map.remove(&source);
                }
            }
        }
        deleted
    }

    fn remove_lookup(&mut self, target_node: &NodeId, source_node: &NodeId) {
        let now_empty = match self.referenced_by_map.get_mut(target_node) {
            Some(sources) => {
                sources.remove(source_node);
                sources.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.referenced_by_map.remove(target_node);
        }
    }

    pub fn has_reference<T>(&self, source_node: &NodeId, target_node: &NodeId, reference_type: T) -> bool
    where
        T: Into<NodeId>,
    {
        let reference = Reference::new(reference_type, target_node.clone());
        self.references_map
            .get(source_node)
            .map_or(false, |references| references.contains(&reference))
    }

    /// Tests if the node is mentioned anywhere in the store
    #[cfg(test)]
    pub fn reference_to_node_exists(&self, node_id: &NodeId) -> bool {
        self.referenced_by_map.contains_key(node_id)
            || self.references_map.contains_key(node_id)
            || self
                .references_map
                .values()
                .any(|v| v.iter().any(|r| r.target_node == *node_id))
            || self.referenced_by_map.values().any(|v| v.contains(node_id))
    }

    /// Finds forward references from the node, optionally filtered by a reference type and
    /// its subtypes.
    pub fn find_references(
        &self,
        source_node: &NodeId,
        reference_filter: Option<(&NodeId, bool)>,
    ) -> Vec<Reference> {
        self.references_map
            .get(source_node)
            .map(|references| self.filter_references_by_type(references, reference_filter))
            .unwrap_or_default()
    }

    /// Finds references pointing at the node. The returned references have the source node
    /// as their target.
    pub fn find_inverse_references(
        &self,
        target_node: &NodeId,
        reference_filter: Option<(&NodeId, bool)>,
    ) -> Vec<Reference> {
        let mut result = Vec::new();
        if let Some(sources) = self.referenced_by_map.get(target_node) {
            for source_node in sources {
                if let Some(references) = self.references_map.get(source_node) {
                    result.extend(
                        references
                            .iter()
                            .filter(|r| r.target_node == *target_node)
                            .filter(|r| self.matches_filter(&r.reference_type, reference_filter))
                            .map(|r| Reference {
                                reference_type: r.reference_type.clone(),
                                target_node: source_node.clone(),
                            }),
                    );
                }
            }
        }
        result
    }

    /// Finds references in the browse direction. The index returned is where the inverse
    /// references start in the list.
    pub fn find_references_by_direction(
        &self,
        node: &NodeId,
        browse_direction: BrowseDirection,
        reference_filter: Option<(&NodeId, bool)>,
    ) -> (Vec<Reference>, usize) {
        match browse_direction {
            BrowseDirection::Forward => {
                let references = self.find_references(node, reference_filter);
                let inverse_ref_idx = references.len();
                (references, inverse_ref_idx)
            }
            BrowseDirection::Inverse => (self.find_inverse_references(node, reference_filter), 0),
            BrowseDirection::Both => {
                let mut references = self.find_references(node, reference_filter);
                let inverse_ref_idx = references.len();
                references.extend(self.find_inverse_references(node, reference_filter));
                (references, inverse_ref_idx)
            }
            BrowseDirection::Invalid => {
                error!("BrowseDirection::Invalid passed to find_references_by_direction");
                (Vec::new(), 0)
            }
        }
    }

    fn filter_references_by_type(
        &self,
        references: &[Reference],
        reference_filter: Option<(&NodeId, bool)>,
    ) -> Vec<Reference> {
        references
            .iter()
            .filter(|r| self.matches_filter(&r.reference_type, reference_filter))
            .cloned()
            .collect()
    }

    fn matches_filter(&self, reference_type: &NodeId, reference_filter: Option<(&NodeId, bool)>) -> bool {
        match reference_filter {
            None => true,
            Some((filter_type, include_subtypes)) => {
                self.reference_type_matches(filter_type, reference_type, include_subtypes)
            }
        }
    }

    /// Tests if `ref_subtype` is `ref_type` or, when `include_subtypes` is set, one of its
    /// subtypes through any number of HasSubtype hops.
    pub fn reference_type_matches(&self, ref_type: &NodeId, ref_subtype: &NodeId, include_subtypes: bool) -> bool {
        if ref_type == ref_subtype {
            true
        } else if include_subtypes {
            self.is_subtype(ref_subtype, ref_type)
        } else {
            false
        }
    }

    /// Walks the HasSubtype tree down from the base type looking for the subtype. A type
    /// matches itself.
    pub fn is_subtype(&self, subtype_id: &NodeId, base_type_id: &NodeId) -> bool {
        let has_subtype: NodeId = ReferenceTypeId::HasSubtype.into();
        let mut visited = HashSet::new();
        let mut stack = vec![base_type_id.clone()];
        while let Some(current) = stack.pop() {
            if current == *subtype_id {
                return true;
            }
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(references) = self.references_map.get(&current) {
                stack.extend(
                    references
                        .iter()
                        .filter(|r| r.reference_type == has_subtype)
                        .map(|r| r.target_node.clone()),
                );
            }
        }
        false
    }

    /// The type definition of an object or variable
    pub fn get_type_id(&self, node: &NodeId) -> Option<NodeId> {
        self.references_map.get(node).and_then(|references| {
            references
                .iter()
                .find(|r| r.reference_type == ReferenceTypeId::HasTypeDefinition)
                .map(|r| r.target_node.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(id: &str) -> NodeId {
        NodeId::new(1, id)
    }

    #[test]
    fn forward_and_inverse() {
        let mut references = References::default();
        let organizes: NodeId = ReferenceTypeId::Organizes.into();
        references.insert(
            &n("folder"),
            &[
                (&n("a"), &organizes, ReferenceDirection::Forward),
                (&n("parent"), &organizes, ReferenceDirection::Inverse),
            ],
        );
        // Insert twice, no duplicate is made
        references.insert_reference(&n("folder"), &n("a"), ReferenceTypeId::Organizes);

        let forward = references.find_references(&n("folder"), None);
        assert_eq!(forward, vec![Reference::new(ReferenceTypeId::Organizes, n("a"))]);

        let inverse = references.find_inverse_references(&n("folder"), None);
        assert_eq!(
            inverse,
            vec![Reference::new(ReferenceTypeId::Organizes, n("parent"))]
        );

        let (both, inverse_idx) =
            references.find_references_by_direction(&n("folder"), BrowseDirection::Both, None);
        assert_eq!(both.len(), 2);
        assert_eq!(inverse_idx, 1);
    }

    #[test]
    fn cycles_and_self_references() {
        let mut references = References::default();
        references.insert_reference(&n("a"), &n("b"), ReferenceTypeId::Organizes);
        references.insert_reference(&n("b"), &n("a"), ReferenceTypeId::Organizes);
        references.insert_reference(&n("a"), &n("a"), ReferenceTypeId::Organizes);
        assert_eq!(references.find_references(&n("a"), None).len(), 1);
        assert_eq!(references.find_inverse_references(&n("a"), None).len(), 1);
    }

    #[test]
    fn subtype_filters() {
        let mut references = References::default();
        let refs: NodeId = ReferenceTypeId::References.into();
        let hierarchical: NodeId = ReferenceTypeId::HierarchicalReferences.into();
        let organizes: NodeId = ReferenceTypeId::Organizes.into();
        references.insert_reference(&refs, &hierarchical, ReferenceTypeId::HasSubtype);
        references.insert_reference(&hierarchical, &organizes, ReferenceTypeId::HasSubtype);
        references.insert_reference(&n("x"), &n("y"), ReferenceTypeId::Organizes);
        references.insert_reference(&n("x"), &n("z"), ReferenceTypeId::HasTypeDefinition);

        assert!(references.is_subtype(&organizes, &refs));
        assert!(!references.is_subtype(&refs, &organizes));
        assert_eq!(
            references
                .find_references(&n("x"), Some((&hierarchical, true)))
                .len(),
            1
        );
        assert!(references
            .find_references(&n("x"), Some((&hierarchical, false)))
            .is_empty());
        assert_eq!(references.get_type_id(&n("x")), Some(n("z")));
    }

    #[test]
    fn delete_references() {
        let mut references = References::default();
        references.insert_reference(&n("a"), &n("b"), ReferenceTypeId::Organizes);
        references.insert_reference(&n("a"), &n("b"), ReferenceTypeId::HasComponent);
        references.insert_reference(&n("c"), &n("a"), ReferenceTypeId::Organizes);

        assert!(references.delete_reference(&n("a"), &n("b"), ReferenceTypeId::Organizes));
        assert!(!references.delete_reference(&n("a"), &n("b"), ReferenceTypeId::Organizes));
        assert!(references.has_reference(&n("a"), &n("b"), ReferenceTypeId::HasComponent));
        assert_eq!(references.find_inverse_references(&n("b"), None).len(), 1);

        assert!(references.delete_node_references(&n("a")));
        assert!(!references.reference_to_node_exists(&n("a")));
        assert!(references.find_references(&n("c"), None).is_empty());
    }
}
