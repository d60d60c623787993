// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    service_types::NodeClass, AttributeId, DataValue, DateTime, LocalizedText, NodeId,
    QualifiedName, Variant,
};

use super::types::{
    DataType, Method, Object, ObjectType, ReferenceType, Variable, VariableType, View,
};

/// A `NodeType` is an enumeration holding every kind of node which can be hosted within the `AddressSpace`.
#[derive(Debug)]
pub enum NodeType {
    Object(Box<Object>),
    ObjectType(Box<ObjectType>),
    ReferenceType(Box<ReferenceType>),
    Variable(Box<Variable>),
    VariableType(Box<VariableType>),
    View(Box<View>),
    DataType(Box<DataType>),
    Method(Box<Method>),
}

impl NodeType {
    pub fn as_node(&self) -> &dyn Node {
        match self {
            NodeType::Object(value) => value.as_ref(),
            NodeType::ObjectType(value) => value.as_ref(),
            NodeType::ReferenceType(value) => value.as_ref(),
            NodeType::Variable(value) => value.as_ref(),
            NodeType::VariableType(value) => value.as_ref(),
            NodeType::View(value) => value.as_ref(),
            NodeType::DataType(value) => value.as_ref(),
            NodeType::Method(value) => value.as_ref(),
        }
    }

    pub fn as_mut_node(&mut self) -> &mut dyn Node {
        match self {
            NodeType::Object(value) => value.as_mut(),
            NodeType::ObjectType(value) => value.as_mut(),
            NodeType::ReferenceType(value) => value.as_mut(),
            NodeType::Variable(value) => value.as_mut(),
            NodeType::VariableType(value) => value.as_mut(),
            NodeType::View(value) => value.as_mut(),
            NodeType::DataType(value) => value.as_mut(),
            NodeType::Method(value) => value.as_mut(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.as_node().node_id().clone()
    }

    pub fn node_class(&self) -> NodeClass {
        match self {
            NodeType::Object(_) => NodeClass::Object,
            NodeType::ObjectType(_) => NodeClass::ObjectType,
            NodeType::ReferenceType(_) => NodeClass::ReferenceType,
            NodeType::Variable(_) => NodeClass::Variable,
            NodeType::VariableType(_) => NodeClass::VariableType,
            NodeType::View(_) => NodeClass::View,
            NodeType::DataType(_) => NodeClass::DataType,
            NodeType::Method(_) => NodeClass::Method,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            NodeType::Variable(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match self {
            NodeType::Variable(v) => Some(v.as_mut()),
            _ => None,
        }
    }
}

/// The attributes every node class has. Part 3, 5.2
#[derive(Debug, Clone)]
pub struct Base {
    node_id: NodeId,
    node_class: NodeClass,
    browse_name: QualifiedName,
    display_name: LocalizedText,
    description: Option<LocalizedText>,
    write_mask: u32,
    user_write_mask: u32,
}

impl Base {
    pub fn new<R, S>(node_class: NodeClass, node_id: &NodeId, browse_name: R, display_name: S) -> Base
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        Base {
            node_id: node_id.clone(),
            node_class,
            browse_name: browse_name.into(),
            display_name: display_name.into(),
            description: None,
            write_mask: 0,
            user_write_mask: 0,
        }
    }

    /// Finds a base attribute. Attributes a node class does not have yield `None`.
    pub fn get_attribute(&self, attribute_id: AttributeId) -> Option<Variant> {
        match attribute_id {
            AttributeId::NodeId => Some(self.node_id.clone().into()),
            AttributeId::NodeClass => Some(Variant::Int32(self.node_class as i32)),
            AttributeId::BrowseName => Some(self.browse_name.clone().into()),
            AttributeId::DisplayName => Some(self.display_name.clone().into()),
            AttributeId::Description => self.description.clone().map(Variant::from),
            AttributeId::WriteMask => Some(Variant::UInt32(self.write_mask)),
            AttributeId::UserWriteMask => Some(Variant::UInt32(self.user_write_mask)),
            _ => None,
        }
    }
}

/// Implemented by every node class. Functions returning `Option` do so because the attribute
/// is optional and not necessarily there.
pub trait Node: std::fmt::Debug + Send + Sync {
    fn base(&self) -> &Base;

    fn base_mut(&mut self) -> &mut Base;

    fn node_class(&self) -> NodeClass {
        self.base().node_class
    }

    fn node_id(&self) -> &NodeId {
        &self.base().node_id
    }

    fn browse_name(&self) -> &QualifiedName {
        &self.base().browse_name
    }

    fn display_name(&self) -> &LocalizedText {
        &self.base().display_name
    }

    fn set_display_name(&mut self, display_name: LocalizedText) {
        self.base_mut().display_name = display_name;
    }

    fn description(&self) -> Option<&LocalizedText> {
        self.base().description.as_ref()
    }

    fn set_description(&mut self, description: LocalizedText) {
        self.base_mut().description = Some(description);
    }

    /// Finds the value of a class specific attribute. The base attributes are handled by
    /// `get_attribute`.
    fn class_attribute(&self, attribute_id: AttributeId) -> Option<Variant>;

    /// Finds the attribute and returns it as a data value stamped with the server time. The
    /// Value attribute of a variable is overridden to carry its own timestamps and status.
    fn get_attribute(&self, attribute_id: AttributeId) -> Option<DataValue> {
        self.base()
            .get_attribute(attribute_id)
            .or_else(|| self.class_attribute(attribute_id))
            .map(|value| DataValue {
                value: Some(value),
                server_timestamp: Some(DateTime::now()),
                ..Default::default()
            })
    }
}

/// Implements `Node` for a node struct with a `base` field, mapping the class attributes to
/// the given closures.
macro_rules! node_impl {
    ( $node_ty:ident, |$this:ident, $attribute_id:ident| $body:expr ) => {
        impl $crate::server::address_space::node::Node for $node_ty {
            fn base(&self) -> &$crate::server::address_space::node::Base {
                &self.base
            }

            fn base_mut(&mut self) -> &mut $crate::server::address_space::node::Base {
                &mut self.base
            }

            fn class_attribute(
                &self,
                $attribute_id: $crate::types::AttributeId,
            ) -> Option<$crate::types::Variant> {
                let $this = self;
                $body
            }
        }

        impl From<$node_ty> for $crate::server::address_space::node::NodeType {
            fn from(value: $node_ty) -> Self {
                $crate::server::address_space::node::NodeType::$node_ty(Box::new(value))
            }
        }
    };
}
