// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Implementation of `AddressSpace`.
use std::{collections::HashMap, convert::TryFrom, sync::Arc};

use arc_swap::ArcSwap;
use chrono::Utc;

use crate::{
    sync::RwLock,
    types::{
        node_ids::{ObjectId, ReferenceTypeId},
        service_types::{
            BrowseDescription, BrowseDescriptionResultMask, BrowseDirection, NodeClass,
            ReadValueId, ReferenceDescription, TimestampsToReturn, WriteValue,
        },
        AttributeId, DataValue, DateTime, DateTimeUtc, ExpandedNodeId, LocalizedText, NodeId,
        QualifiedName, StatusCode, UAString, Variant,
    },
};

use super::{
    node::{Node, NodeType},
    references::{Reference, ReferenceDirection, References},
    standard_nodes,
    types::Object,
    variable::IndexRange,
    DataChangeListener,
};

/// The address space holds references to other nodes in a separate store from the nodes.
/// The node map lock is only held to look a node up, insert or remove it. Every node has its
/// own lock so writes are serialized per node and readers of different nodes do not contend.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct AddressSpace {
    /// A map of all the nodes that are part of the address space
    #[derivative(Debug = "ignore")]
    node_map: RwLock<HashMap<NodeId, Arc<RwLock<NodeType>>>>,
    /// The references between nodes
    #[derivative(Debug = "ignore")]
    references: RwLock<References>,
    /// Namespaces, index 0 is always the OPC UA namespace
    namespaces: RwLock<Vec<String>>,
    /// Timestamp of last time the address space changed shape
    last_modified: ArcSwap<DateTimeUtc>,
    /// Told about every value change
    #[derivative(Debug = "ignore")]
    data_change_listener: RwLock<Option<Arc<dyn DataChangeListener>>>,
}

impl Default for AddressSpace {
    fn default() -> Self {
        AddressSpace {
            node_map: RwLock::new(HashMap::with_capacity(500)),
            references: RwLock::new(References::default()),
            namespaces: RwLock::new(vec!["http://opcfoundation.org/UA/".to_string()]),
            last_modified: ArcSwap::from_pointee(Utc::now()),
            data_change_listener: RwLock::new(None),
        }
    }
}

impl AddressSpace {
    /// Constructs a default address space consisting of the standard folders, types and the
    /// Server object.
    pub fn new() -> AddressSpace {
        let address_space = AddressSpace::default();
        standard_nodes::populate(&address_space);
        address_space
    }

    pub fn last_modified(&self) -> DateTimeUtc {
        **self.last_modified.load()
    }

    fn update_last_modified(&self) {
        self.last_modified.store(Arc::new(Utc::now()));
    }

    /// Registers a namespace, returning its index. Registering an existing namespace returns
    /// the index it already has.
    pub fn register_namespace(&self, namespace: &str) -> u16 {
        let index = {
            let mut namespaces = trace_write_lock!(self.namespaces);
            match namespaces.iter().position(|ns| ns == namespace) {
                Some(index) => index as u16,
                None => {
                    namespaces.push(namespace.to_string());
                    (namespaces.len() - 1) as u16
                }
            }
        };
        self.update_namespace_array();
        index
    }

    pub fn namespace_index(&self, namespace: &str) -> Option<u16> {
        trace_read_lock!(self.namespaces)
            .iter()
            .position(|ns| ns == namespace)
            .map(|index| index as u16)
    }

    pub fn namespaces(&self) -> Vec<String> {
        trace_read_lock!(self.namespaces).clone()
    }

    fn update_namespace_array(&self) {
        let namespaces = self
            .namespaces()
            .into_iter()
            .map(UAString::from)
            .collect::<Vec<_>>();
        if let Err(status) = self.set_variable_value(
            standard_nodes::namespace_array_id(),
            namespaces,
            None,
            StatusCode::Good,
        ) {
            error!("Cannot update the namespace array, {}", status);
        }
    }

    pub fn set_data_change_listener(&self, listener: Arc<dyn DataChangeListener>) {
        *trace_write_lock!(self.data_change_listener) = Some(listener);
    }

    /// Inserts a node with its references. A node id that is already in use is rejected with
    /// `BadNodeIdExists`.
    pub fn insert<T>(
        &self,
        node: T,
        references: &[(&NodeId, &NodeId, ReferenceDirection)],
    ) -> Result<(), StatusCode>
    where
        T: Into<NodeType>,
    {
        let node_type = node.into();
        let node_id = node_type.node_id();
        if node_id.is_null() {
            error!("Cannot insert a node with a null node id");
            return Err(StatusCode::BadNodeIdInvalid);
        }
        {
            let mut node_map = trace_write_lock!(self.node_map);
            if node_map.contains_key(&node_id) {
                error!("This node {} already exists", node_id);
                return Err(StatusCode::BadNodeIdExists);
            }
            node_map.insert(node_id.clone(), Arc::new(RwLock::new(node_type)));
        }
        if !references.is_empty() {
            trace_write_lock!(self.references).insert(&node_id, references);
        }
        self.update_last_modified();
        Ok(())
    }

    /// Adds a folder organized by the parent
    pub fn add_folder<R, S>(
        &self,
        node_id: &NodeId,
        browse_name: R,
        display_name: S,
        parent_node_id: &NodeId,
    ) -> Result<(), StatusCode>
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        let folder_type: NodeId = crate::types::node_ids::ObjectTypeId::FolderType.into();
        let organizes: NodeId = ReferenceTypeId::Organizes.into();
        let has_type_definition: NodeId = ReferenceTypeId::HasTypeDefinition.into();
        self.insert(
            Object::new(node_id, browse_name, display_name),
            &[
                (parent_node_id, &organizes, ReferenceDirection::Inverse),
                (&folder_type, &has_type_definition, ReferenceDirection::Forward),
            ],
        )
    }

    pub fn insert_reference<T>(&self, source_node: &NodeId, target_node: &NodeId, reference_type: T)
    where
        T: Into<NodeId>,
    {
        trace_write_lock!(self.references).insert_reference(source_node, target_node, reference_type);
        self.update_last_modified();
    }

    pub fn delete_reference<T>(&self, source_node: &NodeId, target_node: &NodeId, reference_type: T) -> bool
    where
        T: Into<NodeId>,
    {
        let deleted = trace_write_lock!(self.references).delete_reference(
            source_node,
            target_node,
            reference_type,
        );
        if deleted {
            self.update_last_modified();
        }
        deleted
    }

    pub fn has_reference<T>(&self, source_node: &NodeId, target_node: &NodeId, reference_type: T) -> bool
    where
        T: Into<NodeId>,
    {
        trace_read_lock!(self.references).has_reference(source_node, target_node, reference_type)
    }

    /// Deletes a node by its node id, and all of its properties and optionally any references
    /// that refer to it.
    pub fn delete(&self, node_id: &NodeId, delete_target_references: bool) -> bool {
        let removed = trace_write_lock!(self.node_map).remove(node_id).is_some();
        if removed {
            if delete_target_references {
                trace_write_lock!(self.references).delete_node_references(node_id);
            }
            self.update_last_modified();
        }
        removed
    }

    pub fn node_exists(&self, node_id: &NodeId) -> bool {
        trace_read_lock!(self.node_map).contains_key(node_id)
    }

    /// Finds a node. The map lock is released before the caller locks the node.
    pub fn get_node(&self, node_id: &NodeId) -> Option<Arc<RwLock<NodeType>>> {
        trace_read_lock!(self.node_map).get(node_id).cloned()
    }

    pub fn node_count(&self) -> usize {
        trace_read_lock!(self.node_map).len()
    }

    pub fn node_class(&self, node_id: &NodeId) -> Option<NodeClass> {
        self.get_node(node_id)
            .map(|node| trace_read_lock!(node).node_class())
    }

    pub fn browse_name(&self, node_id: &NodeId) -> Option<QualifiedName> {
        self.get_node(node_id)
            .map(|node| trace_read_lock!(node).as_node().browse_name().clone())
    }

    pub fn find_references(
        &self,
        node_id: &NodeId,
        reference_filter: Option<(&NodeId, bool)>,
    ) -> Vec<Reference> {
        trace_read_lock!(self.references).find_references(node_id, reference_filter)
    }

    pub fn find_inverse_references(
        &self,
        node_id: &NodeId,
        reference_filter: Option<(&NodeId, bool)>,
    ) -> Vec<Reference> {
        trace_read_lock!(self.references).find_inverse_references(node_id, reference_filter)
    }

    /// Finds the targets of hierarchical references from the parent node
    pub fn find_hierarchical_references(&self, parent_node: &NodeId) -> Vec<NodeId> {
        let hierarchical: NodeId = ReferenceTypeId::HierarchicalReferences.into();
        self.find_references(parent_node, Some((&hierarchical, true)))
            .into_iter()
            .map(|r| r.target_node)
            .collect()
    }

    /// Tests if a type is the base type or one of its subtypes
    pub fn is_subtype(&self, subtype_id: &NodeId, base_type_id: &NodeId) -> bool {
        trace_read_lock!(self.references).is_subtype(subtype_id, base_type_id)
    }

    /// Browses one hop from the node described. At most `max_references` references are
    /// returned.
    pub fn browse(
        &self,
        node_to_browse: &BrowseDescription,
        max_references: usize,
    ) -> Result<Vec<ReferenceDescription>, StatusCode> {
        let node_id = &node_to_browse.node_id;
        if node_id.is_null() || !self.node_exists(node_id) {
            return Err(StatusCode::BadNodeIdUnknown);
        }
        if node_to_browse.browse_direction == BrowseDirection::Invalid {
            return Err(StatusCode::BadBrowseDirectionInvalid);
        }

        // Request may wish to filter by a kind of reference
        let reference_type_id = &node_to_browse.reference_type_id;
        let reference_filter = if reference_type_id.is_null() {
            None
        } else if self.node_class(reference_type_id) == Some(NodeClass::ReferenceType) {
            Some((reference_type_id, node_to_browse.include_subtypes))
        } else {
            error!(
                "Browse of node {} asks for reference type {} which is not a reference type",
                node_id, reference_type_id
            );
            return Err(StatusCode::BadReferenceTypeIdInvalid);
        };

        let (references, inverse_ref_idx) = trace_read_lock!(self.references)
            .find_references_by_direction(
                node_id,
                node_to_browse.browse_direction,
                reference_filter,
            );

        let result_mask = BrowseDescriptionResultMask::from_bits_truncate(node_to_browse.result_mask);
        let node_class_mask = node_to_browse.node_class_mask;

        let mut reference_descriptions = Vec::with_capacity(references.len().min(max_references));
        for (idx, reference) in references.iter().enumerate() {
            if reference_descriptions.len() >= max_references {
                warn!(
                    "Browse of node {} has more than {} references, the rest are dropped",
                    node_id, max_references
                );
                break;
            }
            // Targets that are not in the address space are skipped
            let target_node = match self.get_node(&reference.target_node) {
                Some(target_node) => target_node,
                None => continue,
            };
            let (target_node_class, browse_name, display_name) = {
                let target_node = trace_read_lock!(target_node);
                let node = target_node.as_node();
                (
                    target_node.node_class(),
                    node.browse_name().clone(),
                    node.display_name().clone(),
                )
            };

            // Skip target nodes not required by the mask
            if node_class_mask != 0 && node_class_mask & (target_node_class as u32) == 0 {
                continue;
            }

            let reference_type_id =
                if result_mask.contains(BrowseDescriptionResultMask::RESULT_MASK_REFERENCE_TYPE) {
                    reference.reference_type.clone()
                } else {
                    NodeId::null()
                };
            let is_forward =
                if result_mask.contains(BrowseDescriptionResultMask::RESULT_MASK_IS_FORWARD) {
                    idx < inverse_ref_idx
                } else {
                    true
                };
            let node_class =
                if result_mask.contains(BrowseDescriptionResultMask::RESULT_MASK_NODE_CLASS) {
                    target_node_class
                } else {
                    NodeClass::Unspecified
                };
            let browse_name =
                if result_mask.contains(BrowseDescriptionResultMask::RESULT_MASK_BROWSE_NAME) {
                    browse_name
                } else {
                    QualifiedName::null()
                };
            let display_name =
                if result_mask.contains(BrowseDescriptionResultMask::RESULT_MASK_DISPLAY_NAME) {
                    display_name
                } else {
                    LocalizedText::null()
                };
            // Type definitions are only available for objects and variables
            let type_definition = if result_mask
                .contains(BrowseDescriptionResultMask::RESULT_MASK_TYPE_DEFINITION)
                && matches!(target_node_class, NodeClass::Object | NodeClass::Variable)
            {
                trace_read_lock!(self.references)
                    .get_type_id(&reference.target_node)
                    .map(ExpandedNodeId::from)
                    .unwrap_or_else(ExpandedNodeId::null)
            } else {
                ExpandedNodeId::null()
            };

            reference_descriptions.push(ReferenceDescription {
                reference_type_id,
                is_forward,
                node_id: ExpandedNodeId::from(&reference.target_node),
                browse_name,
                display_name,
                node_class,
                type_definition,
            });
        }
        Ok(reference_descriptions)
    }

    pub fn read(&self, node_to_read: &ReadValueId, timestamps_to_return: TimestampsToReturn) -> DataValue {
        self.read_attribute(
            &node_to_read.node_id,
            node_to_read.attribute_id,
            &node_to_read.index_range,
            &node_to_read.data_encoding,
            timestamps_to_return,
        )
    }

    /// Reads an attribute. Failures are returned as the status of the data value.
    pub fn read_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: u32,
        index_range: &UAString,
        data_encoding: &QualifiedName,
        timestamps_to_return: TimestampsToReturn,
    ) -> DataValue {
        let node = match self.get_node(node_id) {
            Some(node) => node,
            None => {
                debug!("Cannot read node {}, it does not exist", node_id);
                return DataValue::from_status(StatusCode::BadNodeIdUnknown);
            }
        };
        let attribute_id = match AttributeId::try_from(attribute_id) {
            Ok(attribute_id) => attribute_id,
            Err(_) => return DataValue::from_status(StatusCode::BadAttributeIdInvalid),
        };
        let index_range = match IndexRange::parse(index_range) {
            Ok(index_range) => index_range,
            Err(status) => return DataValue::from_status(status),
        };
        if !data_encoding.is_null() {
            if attribute_id != AttributeId::Value {
                return DataValue::from_status(StatusCode::BadDataEncodingInvalid);
            }
            if data_encoding.namespace_index != 0 || data_encoding.name != "Default Binary" {
                return DataValue::from_status(StatusCode::BadDataEncodingUnsupported);
            }
        }

        let node = trace_read_lock!(node);
        match (attribute_id, &*node) {
            (AttributeId::Value, NodeType::Variable(variable)) => {
                if variable.is_readable() {
                    variable.value(timestamps_to_return, &index_range)
                } else {
                    DataValue::from_status(StatusCode::BadNotReadable)
                }
            }
            _ => {
                if index_range != IndexRange::None {
                    return DataValue::from_status(StatusCode::BadIndexRangeNoData);
                }
                match node.as_node().get_attribute(attribute_id) {
                    Some(data_value) => data_value.filtered(timestamps_to_return),
                    None => DataValue::from_status(StatusCode::BadAttributeIdInvalid),
                }
            }
        }
    }

    /// Writes the Value attribute of a variable that the client may write
    pub fn write(&self, node_to_write: &WriteValue) -> StatusCode {
        self.write_attribute(
            &node_to_write.node_id,
            node_to_write.attribute_id,
            &node_to_write.index_range,
            &node_to_write.value,
        )
    }

    pub fn write_attribute(
        &self,
        node_id: &NodeId,
        attribute_id: u32,
        index_range: &UAString,
        value: &DataValue,
    ) -> StatusCode {
        if !self.node_exists(node_id) {
            return StatusCode::BadNodeIdUnknown;
        }
        match AttributeId::try_from(attribute_id) {
            Ok(AttributeId::Value) => {}
            Ok(attribute_id) => {
                debug!(
                    "Write of attribute {:?} on node {} is not supported",
                    attribute_id, node_id
                );
                return StatusCode::BadNotWritable;
            }
            Err(_) => return StatusCode::BadAttributeIdInvalid,
        }
        match IndexRange::parse(index_range) {
            Ok(IndexRange::None) => {}
            Ok(_) => return StatusCode::BadWriteNotSupported,
            Err(status) => return status,
        }
        let new_value = match value.value {
            Some(ref new_value) => new_value.clone(),
            None => return StatusCode::BadTypeMismatch,
        };
        match self.update_value(node_id, new_value, value.source_timestamp, StatusCode::Good, true) {
            Ok(()) => StatusCode::Good,
            Err(status) => status,
        }
    }

    /// Sets the value of a variable regardless of its access level. This is how the tag feed
    /// and the server itself update values.
    pub fn set_variable_value<N, V>(
        &self,
        node_id: N,
        value: V,
        source_timestamp: Option<DateTime>,
        status: StatusCode,
    ) -> Result<(), StatusCode>
    where
        N: Into<NodeId>,
        V: Into<Variant>,
    {
        self.update_value(&node_id.into(), value.into(), source_timestamp, status, false)
    }

    pub fn get_variable_value<N>(&self, node_id: N) -> Option<DataValue>
    where
        N: Into<NodeId>,
    {
        let node = self.get_node(&node_id.into())?;
        let node = trace_read_lock!(node);
        node.as_variable().map(|variable| variable.data_value().clone())
    }

    fn update_value(
        &self,
        node_id: &NodeId,
        value: Variant,
        source_timestamp: Option<DateTime>,
        status: StatusCode,
        check_access: bool,
    ) -> Result<(), StatusCode> {
        let node = self.get_node(node_id).ok_or(StatusCode::BadNodeIdUnknown)?;
        let mut node = trace_write_lock!(node);
        let variable = node.as_variable_mut().ok_or(StatusCode::BadNotWritable)?;
        if check_access && !variable.is_writable() {
            debug!("Variable {} is not writable", node_id);
            return Err(StatusCode::BadNotWritable);
        }
        let new_value = variable.set_value(value, status, source_timestamp, DateTime::now())?;
        // Listeners run under the node lock so changes to one node are reported in order.
        // They must not lock nodes themselves.
        let listener = trace_read_lock!(self.data_change_listener).clone();
        if let Some(listener) = listener {
            listener.data_changed(node_id, &new_value);
        }
        Ok(())
    }

    pub fn root_folder_id(&self) -> NodeId {
        ObjectId::RootFolder.into()
    }

    pub fn objects_folder_id(&self) -> NodeId {
        ObjectId::ObjectsFolder.into()
    }
}
