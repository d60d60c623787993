// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The subset of the namespace 0 nodes every address space starts with: the standard folders,
//! the reference type hierarchy, the built-in data types and the Server object.

use crate::types::{
    node_ids::{
        DataTypeId, MethodId, ObjectId, ObjectTypeId, ReferenceTypeId, VariableId, VariableTypeId,
    },
    service_types::{Argument, BuildInfo, ServerState, ServerStatusDataType},
    DateTime, ExtensionObject, LocalizedText, NodeId, QualifiedName, StatusCode, UAString,
    Variant,
};

use super::{
    address_space::AddressSpace,
    node::NodeType,
    references::ReferenceDirection,
    types::{DataType, Method, ObjectBuilder, ObjectType, ReferenceType, Variable, VariableBuilder, VariableType},
};

pub(super) fn namespace_array_id() -> NodeId {
    VariableId::Server_NamespaceArray.into()
}

fn insert<T>(address_space: &AddressSpace, node: T, references: &[(NodeId, ReferenceTypeId, ReferenceDirection)])
where
    T: Into<NodeType>,
{
    let references = references
        .iter()
        .map(|(node_id, reference_type_id, direction)| {
            (node_id.clone(), NodeId::from(*reference_type_id), *direction)
        })
        .collect::<Vec<_>>();
    let references = references
        .iter()
        .map(|(node_id, reference_type_id, direction)| (node_id, reference_type_id, *direction))
        .collect::<Vec<_>>();
    if let Err(status) = address_space.insert(node, &references) {
        error!("Cannot insert standard node, {}", status);
    }
}

fn folder(address_space: &AddressSpace, node_id: ObjectId, name: &str, parent: Option<ObjectId>) {
    let mut builder = ObjectBuilder::new(&node_id.into(), name, name).is_folder();
    if let Some(parent) = parent {
        builder = builder.organized_by(parent);
    }
    if let Err(status) = builder.insert(address_space) {
        error!("Cannot insert folder {}, {}", name, status);
    }
}

fn subtype_of<T>(base: T) -> (NodeId, ReferenceTypeId, ReferenceDirection)
where
    T: Into<NodeId>,
{
    (base.into(), ReferenceTypeId::HasSubtype, ReferenceDirection::Inverse)
}

fn reference_type(
    address_space: &AddressSpace,
    id: ReferenceTypeId,
    name: &str,
    inverse_name: Option<&str>,
    is_abstract: bool,
    base: Option<ReferenceTypeId>,
) {
    let node = ReferenceType::new(&id.into(), name, name, inverse_name, false, is_abstract);
    match base {
        Some(base) => insert(address_space, node, &[subtype_of(base)]),
        None => insert(address_space, node, &[(
            ObjectId::ReferenceTypesFolder.into(),
            ReferenceTypeId::Organizes,
            ReferenceDirection::Inverse,
        )]),
    }
}

fn data_type(address_space: &AddressSpace, id: DataTypeId, is_abstract: bool, base: Option<DataTypeId>) {
    let name = format!("{:?}", id);
    let node = DataType::new(&id.into(), name.as_str(), name.as_str(), is_abstract);
    match base {
        Some(base) => insert(address_space, node, &[subtype_of(base)]),
        None => insert(address_space, node, &[(
            ObjectId::DataTypesFolder.into(),
            ReferenceTypeId::Organizes,
            ReferenceDirection::Inverse,
        )]),
    }
}

pub(super) fn populate(address_space: &AddressSpace) {
    folder(address_space, ObjectId::RootFolder, "Root", None);
    folder(address_space, ObjectId::ObjectsFolder, "Objects", Some(ObjectId::RootFolder));
    folder(address_space, ObjectId::TypesFolder, "Types", Some(ObjectId::RootFolder));
    folder(address_space, ObjectId::ViewsFolder, "Views", Some(ObjectId::RootFolder));
    folder(address_space, ObjectId::ObjectTypesFolder, "ObjectTypes", Some(ObjectId::TypesFolder));
    folder(address_space, ObjectId::VariableTypesFolder, "VariableTypes", Some(ObjectId::TypesFolder));
    folder(address_space, ObjectId::DataTypesFolder, "DataTypes", Some(ObjectId::TypesFolder));
    folder(address_space, ObjectId::ReferenceTypesFolder, "ReferenceTypes", Some(ObjectId::TypesFolder));

    add_reference_types(address_space);
    add_object_and_variable_types(address_space);
    add_data_types(address_space);
    add_server_object(address_space);
}

fn add_reference_types(address_space: &AddressSpace) {
    use ReferenceTypeId::*;
    reference_type(address_space, References, "References", None, true, None);
    reference_type(address_space, HierarchicalReferences, "HierarchicalReferences", None, true, Some(References));
    reference_type(address_space, NonHierarchicalReferences, "NonHierarchicalReferences", None, true, Some(References));
    reference_type(address_space, HasChild, "HasChild", None, true, Some(HierarchicalReferences));
    reference_type(address_space, Organizes, "Organizes", Some("OrganizedBy"), false, Some(HierarchicalReferences));
    reference_type(address_space, HasEventSource, "HasEventSource", Some("EventSourceOf"), false, Some(HierarchicalReferences));
    reference_type(address_space, HasNotifier, "HasNotifier", Some("NotifierOf"), false, Some(HasEventSource));
    reference_type(address_space, Aggregates, "Aggregates", None, true, Some(HasChild));
    reference_type(address_space, HasSubtype, "HasSubtype", Some("SubtypeOf"), false, Some(HasChild));
    reference_type(address_space, HasComponent, "HasComponent", Some("ComponentOf"), false, Some(Aggregates));
    reference_type(address_space, HasProperty, "HasProperty", Some("PropertyOf"), false, Some(Aggregates));
    reference_type(address_space, HasTypeDefinition, "HasTypeDefinition", Some("TypeDefinitionOf"), false, Some(NonHierarchicalReferences));
    reference_type(address_space, HasModellingRule, "HasModellingRule", Some("ModellingRuleOf"), false, Some(NonHierarchicalReferences));
    reference_type(address_space, HasEncoding, "HasEncoding", Some("EncodingOf"), false, Some(NonHierarchicalReferences));
    reference_type(address_space, HasDescription, "HasDescription", Some("DescriptionOf"), false, Some(NonHierarchicalReferences));
    reference_type(address_space, GeneratesEvent, "GeneratesEvent", Some("GeneratedBy"), false, Some(NonHierarchicalReferences));
}

fn add_object_and_variable_types(address_space: &AddressSpace) {
    let organized_by = |folder: ObjectId| (NodeId::from(folder), ReferenceTypeId::Organizes, ReferenceDirection::Inverse);

    insert(
        address_space,
        ObjectType::new(&ObjectTypeId::BaseObjectType.into(), "BaseObjectType", "BaseObjectType", false),
        &[organized_by(ObjectId::ObjectTypesFolder)],
    );
    insert(
        address_space,
        ObjectType::new(&ObjectTypeId::FolderType.into(), "FolderType", "FolderType", false),
        &[subtype_of(ObjectTypeId::BaseObjectType)],
    );
    insert(
        address_space,
        ObjectType::new(&ObjectTypeId::ServerType.into(), "ServerType", "ServerType", false),
        &[subtype_of(ObjectTypeId::BaseObjectType)],
    );

    insert(
        address_space,
        VariableType::new(&VariableTypeId::BaseVariableType.into(), "BaseVariableType", "BaseVariableType", DataTypeId::BaseDataType, true),
        &[organized_by(ObjectId::VariableTypesFolder)],
    );
    insert(
        address_space,
        VariableType::new(&VariableTypeId::BaseDataVariableType.into(), "BaseDataVariableType", "BaseDataVariableType", DataTypeId::BaseDataType, false),
        &[subtype_of(VariableTypeId::BaseVariableType)],
    );
    insert(
        address_space,
        VariableType::new(&VariableTypeId::PropertyType.into(), "PropertyType", "PropertyType", DataTypeId::BaseDataType, false),
        &[subtype_of(VariableTypeId::BaseVariableType)],
    );
    insert(
        address_space,
        VariableType::new(&VariableTypeId::ServerStatusType.into(), "ServerStatusType", "ServerStatusType", DataTypeId::ServerStatusDataType, false),
        &[subtype_of(VariableTypeId::BaseDataVariableType)],
    );
}

fn add_data_types(address_space: &AddressSpace) {
    data_type(address_space, DataTypeId::BaseDataType, true, None);
    for id in [
        DataTypeId::Boolean,
        DataTypeId::String,
        DataTypeId::DateTime,
        DataTypeId::Guid,
        DataTypeId::ByteString,
        DataTypeId::XmlElement,
        DataTypeId::NodeId,
        DataTypeId::ExpandedNodeId,
        DataTypeId::StatusCode,
        DataTypeId::QualifiedName,
        DataTypeId::LocalizedText,
        DataTypeId::DataValue,
        DataTypeId::DiagnosticInfo,
    ] {
        data_type(address_space, id, false, Some(DataTypeId::BaseDataType));
    }
    for id in [DataTypeId::Number, DataTypeId::Structure, DataTypeId::Enumeration] {
        data_type(address_space, id, true, Some(DataTypeId::BaseDataType));
    }
    data_type(address_space, DataTypeId::Integer, true, Some(DataTypeId::Number));
    data_type(address_space, DataTypeId::UInteger, true, Some(DataTypeId::Number));
    data_type(address_space, DataTypeId::Float, false, Some(DataTypeId::Number));
    data_type(address_space, DataTypeId::Double, false, Some(DataTypeId::Number));
    for id in [DataTypeId::SByte, DataTypeId::Int16, DataTypeId::Int32, DataTypeId::Int64] {
        data_type(address_space, id, false, Some(DataTypeId::Integer));
    }
    for id in [DataTypeId::Byte, DataTypeId::UInt16, DataTypeId::UInt32, DataTypeId::UInt64] {
        data_type(address_space, id, false, Some(DataTypeId::UInteger));
    }
    data_type(address_space, DataTypeId::ServerStatusDataType, false, Some(DataTypeId::Structure));
    data_type(address_space, DataTypeId::ServerState, false, Some(DataTypeId::Enumeration));
}

fn add_server_object(address_space: &AddressSpace) {
    let server_id: NodeId = ObjectId::Server.into();
    if let Err(status) = ObjectBuilder::new(&server_id, "Server", "Server")
        .organized_by(ObjectId::ObjectsFolder)
        .has_type_definition(ObjectTypeId::ServerType)
        .event_notifier(1)
        .insert(address_space)
    {
        error!("Cannot insert server object, {}", status);
        return;
    }

    let namespaces = address_space
        .namespaces()
        .into_iter()
        .map(UAString::from)
        .collect::<Vec<_>>();
    let properties = [
        (VariableId::Server_ServerArray, "ServerArray", Variant::from(Vec::<UAString>::new())),
        (VariableId::Server_NamespaceArray, "NamespaceArray", Variant::from(namespaces)),
    ];
    for (id, name, value) in properties {
        let result = VariableBuilder::new(&id.into(), name, name)
            .value(value)
            .data_type(DataTypeId::String)
            .property_of(server_id.clone())
            .has_type_definition(VariableTypeId::PropertyType)
            .minimum_sampling_interval(1000.0)
            .insert(address_space);
        if let Err(status) = result {
            error!("Cannot insert {}, {}", name, status);
        }
    }

    let server_status_id: NodeId = VariableId::Server_ServerStatus.into();
    let now = DateTime::now();
    let server_status = ServerStatusDataType {
        start_time: now,
        current_time: now,
        state: ServerState::Shutdown,
        build_info: BuildInfo {
            product_uri: UAString::null(),
            manufacturer_name: UAString::null(),
            product_name: UAString::null(),
            software_version: UAString::null(),
            build_number: UAString::null(),
            build_date: now,
        },
        seconds_till_shutdown: 0,
        shutdown_reason: LocalizedText::null(),
    };
    insert(
        address_space,
        Variable::new(&server_status_id, "ServerStatus", "ServerStatus", ExtensionObject::from_message(&server_status)),
        &[
            (server_id.clone(), ReferenceTypeId::HasComponent, ReferenceDirection::Inverse),
            (VariableTypeId::ServerStatusType.into(), ReferenceTypeId::HasTypeDefinition, ReferenceDirection::Forward),
        ],
    );
    let status_components = [
        (VariableId::Server_ServerStatus_StartTime, "StartTime", Variant::from(now), DataTypeId::DateTime),
        (VariableId::Server_ServerStatus_CurrentTime, "CurrentTime", Variant::from(now), DataTypeId::DateTime),
        (VariableId::Server_ServerStatus_State, "State", Variant::Int32(ServerState::Shutdown as i32), DataTypeId::ServerState),
    ];
    for (id, name, value, data_type) in status_components {
        let result = VariableBuilder::new(&id.into(), name, name)
            .value(value)
            .data_type(data_type)
            .component_of(server_status_id.clone())
            .insert(address_space);
        if let Err(status) = result {
            error!("Cannot insert {}, {}", name, status);
        }
    }

    let method_id: NodeId = MethodId::Server_GetMonitoredItems.into();
    insert(
        address_space,
        Method::new(&method_id, "GetMonitoredItems", "GetMonitoredItems"),
        &[(server_id, ReferenceTypeId::HasComponent, ReferenceDirection::Inverse)],
    );
    let input_arguments = vec![Argument {
        name: UAString::from("SubscriptionId"),
        data_type: DataTypeId::UInt32.into(),
        value_rank: -1,
        array_dimensions: None,
        description: LocalizedText::null(),
    }];
    let output_arguments = vec![
        Argument {
            name: UAString::from("ServerHandles"),
            data_type: DataTypeId::UInt32.into(),
            value_rank: 1,
            array_dimensions: None,
            description: LocalizedText::null(),
        },
        Argument {
            name: UAString::from("ClientHandles"),
            data_type: DataTypeId::UInt32.into(),
            value_rank: 1,
            array_dimensions: None,
            description: LocalizedText::null(),
        },
    ];
    let arguments = [
        (VariableId::Server_GetMonitoredItems_InputArguments, "InputArguments", input_arguments),
        (VariableId::Server_GetMonitoredItems_OutputArguments, "OutputArguments", output_arguments),
    ];
    for (id, name, arguments) in arguments {
        let values = arguments
            .iter()
            .map(|argument| Variant::from(ExtensionObject::from_message(argument)))
            .collect::<Vec<_>>();
        let value = match crate::types::Array::new_single(crate::types::VariantTypeId::ExtensionObject, values) {
            Ok(array) => Variant::from(array),
            Err(status) => {
                error!("Cannot create the arguments of GetMonitoredItems, {}", status);
                continue;
            }
        };
        let result = VariableBuilder::new(&id.into(), QualifiedName::from(name), name)
            .value(value)
            .data_type(DataTypeId::Structure)
            .property_of(method_id.clone())
            .has_type_definition(VariableTypeId::PropertyType)
            .insert(address_space);
        if let Err(status) = result {
            error!("Cannot insert {}, {}", name, status);
        }
    }
}

impl AddressSpace {
    /// Sets the URIs of the servers in ServerArray, this server first
    pub fn set_server_array(&self, server_uris: Vec<UAString>) {
        let _ = self.set_variable_value(VariableId::Server_ServerArray, server_uris, None, StatusCode::Good);
    }

    /// Refreshes the ServerStatus variable and its State and CurrentTime components
    pub fn update_server_status(&self, start_time: DateTime, state: ServerState, build_info: BuildInfo) {
        let now = DateTime::now();
        let server_status = ServerStatusDataType {
            start_time,
            current_time: now,
            state,
            build_info,
            seconds_till_shutdown: 0,
            shutdown_reason: LocalizedText::null(),
        };
        let updates = [
            (VariableId::Server_ServerStatus, Variant::from(ExtensionObject::from_message(&server_status))),
            (VariableId::Server_ServerStatus_StartTime, Variant::from(start_time)),
            (VariableId::Server_ServerStatus_CurrentTime, Variant::from(now)),
            (VariableId::Server_ServerStatus_State, Variant::Int32(state as i32)),
        ];
        for (id, value) in updates {
            if let Err(status) = self.set_variable_value(id, value, Some(now), StatusCode::Good) {
                error!("Cannot update server status variable {:?}, {}", id, status);
            }
        }
    }
}
