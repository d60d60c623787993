// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The node classes other than Variable.

use crate::types::{
    node_ids::ObjectTypeId, service_types::NodeClass, AttributeId, LocalizedText, NodeId,
    QualifiedName, Variant,
};

use super::node::Base;

pub use super::variable::{Variable, VariableBuilder};

node_builder_impl!(ObjectBuilder, Object);

impl ObjectBuilder {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S) -> Self
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        Self {
            node: Object::new(node_id, browse_name, display_name),
            references: Vec::with_capacity(4),
        }
    }

    pub fn is_folder(self) -> Self {
        self.has_type_definition(ObjectTypeId::FolderType)
    }

    pub fn event_notifier(mut self, event_notifier: u8) -> Self {
        self.node.event_notifier = event_notifier;
        self
    }
}

#[derive(Debug)]
pub struct Object {
    base: Base,
    event_notifier: u8,
}

node_impl!(Object, |this, attribute_id| match attribute_id {
    AttributeId::EventNotifier => Some(Variant::Byte(this.event_notifier)),
    _ => None,
});

impl Object {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S) -> Object
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        Object {
            base: Base::new(NodeClass::Object, node_id, browse_name, display_name),
            event_notifier: 0,
        }
    }

    pub fn event_notifier(&self) -> u8 {
        self.event_notifier
    }
}

#[derive(Debug)]
pub struct ObjectType {
    base: Base,
    is_abstract: bool,
}

node_impl!(ObjectType, |this, attribute_id| match attribute_id {
    AttributeId::IsAbstract => Some(Variant::Boolean(this.is_abstract)),
    _ => None,
});

impl ObjectType {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S, is_abstract: bool) -> ObjectType
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        ObjectType {
            base: Base::new(NodeClass::ObjectType, node_id, browse_name, display_name),
            is_abstract,
        }
    }
}

#[derive(Debug)]
pub struct VariableType {
    base: Base,
    data_type: NodeId,
    value_rank: i32,
    is_abstract: bool,
}

node_impl!(VariableType, |this, attribute_id| match attribute_id {
    AttributeId::DataType => Some(this.data_type.clone().into()),
    AttributeId::ValueRank => Some(Variant::Int32(this.value_rank)),
    AttributeId::IsAbstract => Some(Variant::Boolean(this.is_abstract)),
    _ => None,
});

impl VariableType {
    pub fn new<R, S, T>(
        node_id: &NodeId,
        browse_name: R,
        display_name: S,
        data_type: T,
        is_abstract: bool,
    ) -> VariableType
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
        T: Into<NodeId>,
    {
        VariableType {
            base: Base::new(NodeClass::VariableType, node_id, browse_name, display_name),
            data_type: data_type.into(),
            value_rank: -2,
            is_abstract,
        }
    }
}

#[derive(Debug)]
pub struct ReferenceType {
    base: Base,
    symmetric: bool,
    is_abstract: bool,
    inverse_name: Option<LocalizedText>,
}

node_impl!(ReferenceType, |this, attribute_id| match attribute_id {
    AttributeId::Symmetric => Some(Variant::Boolean(this.symmetric)),
    AttributeId::IsAbstract => Some(Variant::Boolean(this.is_abstract)),
    AttributeId::InverseName => this.inverse_name.clone().map(Variant::from),
    _ => None,
});

impl ReferenceType {
    pub fn new<R, S>(
        node_id: &NodeId,
        browse_name: R,
        display_name: S,
        inverse_name: Option<&str>,
        symmetric: bool,
        is_abstract: bool,
    ) -> ReferenceType
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        ReferenceType {
            base: Base::new(NodeClass::ReferenceType, node_id, browse_name, display_name),
            symmetric,
            is_abstract,
            inverse_name: inverse_name.map(LocalizedText::from),
        }
    }
}

#[derive(Debug)]
pub struct DataType {
    base: Base,
    is_abstract: bool,
}

node_impl!(DataType, |this, attribute_id| match attribute_id {
    AttributeId::IsAbstract => Some(Variant::Boolean(this.is_abstract)),
    _ => None,
});

impl DataType {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S, is_abstract: bool) -> DataType
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        DataType {
            base: Base::new(NodeClass::DataType, node_id, browse_name, display_name),
            is_abstract,
        }
    }
}

#[derive(Debug)]
pub struct View {
    base: Base,
    event_notifier: u8,
    contains_no_loops: bool,
}

node_impl!(View, |this, attribute_id| match attribute_id {
    AttributeId::EventNotifier => Some(Variant::Byte(this.event_notifier)),
    AttributeId::ContainsNoLoops => Some(Variant::Boolean(this.contains_no_loops)),
    _ => None,
});

impl View {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S) -> View
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        View {
            base: Base::new(NodeClass::View, node_id, browse_name, display_name),
            event_notifier: 0,
            contains_no_loops: true,
        }
    }
}

#[derive(Debug)]
pub struct Method {
    base: Base,
    executable: bool,
    user_executable: bool,
}

node_impl!(Method, |this, attribute_id| match attribute_id {
    AttributeId::Executable => Some(Variant::Boolean(this.executable)),
    AttributeId::UserExecutable => Some(Variant::Boolean(this.user_executable)),
    _ => None,
});

impl Method {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S) -> Method
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        Method {
            base: Base::new(NodeClass::Method, node_id, browse_name, display_name),
            executable: true,
            user_executable: true,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.executable && self.user_executable
    }
}
