// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The tag manifest, a JSON tag export of the form
//! `{ "name": "VBL_Digital_Factory", "tagType": "Folder", "tags": [ ... ] }`.

use std::{fs::File, io::Read, path::Path};

use crate::{
    server::address_space::{types::VariableBuilder, AddressSpace},
    types::{node_ids::DataTypeId, NodeId, StatusCode, Variant},
};

/// Name of the root folder when the manifest does not give one
pub const DEFAULT_ROOT_NAME: &str = "VBL_Digital_Factory";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagType {
    Folder,
    UdtType,
    UdtInstance,
    AtomicTag,
    #[serde(other)]
    Unknown,
}

impl TagType {
    /// Folders, UDT types and UDT instances all become folders
    pub fn is_folder(&self) -> bool {
        matches!(self, TagType::Folder | TagType::UdtType | TagType::UdtInstance)
    }
}

/// A folder or tag of the manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDefinition {
    pub name: String,
    pub tag_type: TagType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<TagDefinition>,
}

/// The OPC UA type a tag is exposed as
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TagDataType {
    Double,
    Float,
    Int32,
    Boolean,
    String,
}

impl TagDataType {
    /// Maps the export data type names. Tags without one are `Float8`, unknown names are strings.
    pub fn from_manifest(data_type: Option<&str>) -> TagDataType {
        match data_type.unwrap_or("Float8") {
            "Float8" => TagDataType::Double,
            "Float4" => TagDataType::Float,
            "Int4" => TagDataType::Int32,
            "Boolean" => TagDataType::Boolean,
            _ => TagDataType::String,
        }
    }

    pub fn data_type_id(&self) -> DataTypeId {
        match self {
            TagDataType::Double => DataTypeId::Double,
            TagDataType::Float => DataTypeId::Float,
            TagDataType::Int32 => DataTypeId::Int32,
            TagDataType::Boolean => DataTypeId::Boolean,
            TagDataType::String => DataTypeId::String,
        }
    }

    pub fn default_value(&self) -> Variant {
        match self {
            TagDataType::Double => Variant::Double(0.0),
            TagDataType::Float => Variant::Float(0.0),
            TagDataType::Int32 => Variant::Int32(0),
            TagDataType::Boolean => Variant::Boolean(false),
            TagDataType::String => Variant::from(""),
        }
    }

    /// Converts a JSON value to this type, `None` if it cannot be represented.
    pub fn variant_from_json(&self, value: &serde_json::Value) -> Option<Variant> {
        use serde_json::Value;
        match (self, value) {
            (TagDataType::Double, Value::Number(n)) => n.as_f64().map(Variant::Double),
            (TagDataType::Float, Value::Number(n)) => n.as_f64().map(|v| Variant::Float(v as f32)),
            (TagDataType::Int32, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|v| v.round() as i64))
                .and_then(|v| i32::try_from(v).ok())
                .map(Variant::Int32),
            (TagDataType::Boolean, Value::Bool(b)) => Some(Variant::Boolean(*b)),
            (TagDataType::Boolean, Value::Number(n)) => n.as_i64().map(|v| Variant::Boolean(v != 0)),
            (TagDataType::String, Value::String(s)) => Some(Variant::from(s.as_str())),
            (TagDataType::String, Value::Number(n)) => Some(Variant::from(n.to_string())),
            (TagDataType::String, Value::Bool(b)) => Some(Variant::from(b.to_string())),
            _ => None,
        }
    }

    /// Converts a value of some other type to this type, e.g. a simulated integer count for a
    /// `Float8` tag.
    pub fn coerce(&self, value: Variant) -> Option<Variant> {
        match (self, value) {
            (TagDataType::Double, Variant::Double(v)) => Some(Variant::Double(v)),
            (TagDataType::Float, Variant::Float(v)) => Some(Variant::Float(v)),
            (TagDataType::Int32, Variant::Int32(v)) => Some(Variant::Int32(v)),
            (TagDataType::Boolean, Variant::Boolean(v)) => Some(Variant::Boolean(v)),
            (TagDataType::String, Variant::String(v)) => Some(Variant::String(v)),
            (TagDataType::String, v) => Some(Variant::from(v.to_string())),
            (data_type, v) => {
                let v = v.as_f64()?;
                match data_type {
                    TagDataType::Double => Some(Variant::Double(v)),
                    TagDataType::Float => Some(Variant::Float(v as f32)),
                    TagDataType::Int32 => Some(Variant::Int32(v.round() as i32)),
                    TagDataType::Boolean => Some(Variant::Boolean(v != 0.0)),
                    TagDataType::String => None,
                }
            }
        }
    }
}

/// A variable created from an atomic tag
#[derive(Debug, Clone, PartialEq)]
pub struct TagVariable {
    pub node_id: NodeId,
    /// The tag name, the last element of the path
    pub name: String,
    pub data_type: TagDataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagManifest {
    #[serde(default = "default_root_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_type: Option<TagType>,
    #[serde(default)]
    pub tags: Vec<TagDefinition>,
}

fn default_root_name() -> String {
    DEFAULT_ROOT_NAME.to_string()
}

impl TagManifest {
    pub fn from_json(json: &str) -> Result<TagManifest, ()> {
        serde_json::from_str(json).map_err(|err| {
            error!("Cannot parse tag manifest, error reason: {}", err);
        })
    }

    pub fn load(path: &Path) -> Result<TagManifest, ()> {
        let mut f = File::open(path).map_err(|err| {
            error!(
                "Cannot open tag manifest {}, error reason: {}",
                path.to_string_lossy(),
                err
            );
        })?;
        let mut s = String::new();
        f.read_to_string(&mut s).map_err(|err| {
            error!(
                "Cannot read tag manifest {}, error reason: {}",
                path.to_string_lossy(),
                err
            );
        })?;
        Self::from_json(&s)
    }

    /// Creates the folders and variables of the manifest under the Objects folder, with node ids
    /// `ns=<namespace>;s=<path/joined/by/slash>`. Tags whose node id is taken are skipped.
    /// Returns the variables that were created.
    pub fn populate(
        &self,
        address_space: &AddressSpace,
        namespace: u16,
    ) -> Result<Vec<TagVariable>, StatusCode> {
        let root_id = NodeId::new(namespace, self.name.as_str());
        address_space.add_folder(
            &root_id,
            self.name.as_str(),
            self.name.as_str(),
            &address_space.objects_folder_id(),
        )?;

        let mut variables = Vec::new();
        let mut path = vec![self.name.clone()];
        Self::add_tags(
            address_space,
            namespace,
            &root_id,
            &self.tags,
            &mut path,
            &mut variables,
        );
        info!(
            "Tag manifest {} loaded, {} variables",
            self.name,
            variables.len()
        );
        Ok(variables)
    }

    fn add_tags(
        address_space: &AddressSpace,
        namespace: u16,
        parent_id: &NodeId,
        tags: &[TagDefinition],
        path: &mut Vec<String>,
        variables: &mut Vec<TagVariable>,
    ) {
        for tag in tags {
            path.push(tag.name.clone());
            let node_id = NodeId::new(namespace, path.join("/"));
            if tag.tag_type.is_folder() {
                match address_space.add_folder(&node_id, tag.name.as_str(), tag.name.as_str(), parent_id) {
                    Ok(()) => {
                        Self::add_tags(address_space, namespace, &node_id, &tag.tags, path, variables)
                    }
                    Err(StatusCode::BadNodeIdExists) => {
                        warn!("Duplicate node id {}, skipping", node_id);
                    }
                    Err(status) => error!("Error adding folder {}: {}", node_id, status),
                }
            } else if tag.tag_type == TagType::AtomicTag {
                let data_type = TagDataType::from_manifest(tag.data_type.as_deref());
                let value = tag
                    .value
                    .as_ref()
                    .or(tag.default_value.as_ref())
                    .and_then(|v| {
                        let variant = data_type.variant_from_json(v);
                        if variant.is_none() {
                            debug!("Tag {} value {} does not fit {:?}", node_id, v, data_type);
                        }
                        variant
                    })
                    .unwrap_or_else(|| data_type.default_value());
                let result = VariableBuilder::new(&node_id, tag.name.as_str(), tag.name.as_str())
                    .value(value)
                    .data_type(data_type.data_type_id())
                    .writable()
                    .organized_by(parent_id.clone())
                    .insert(address_space);
                match result {
                    Ok(()) => variables.push(TagVariable {
                        node_id,
                        name: tag.name.clone(),
                        data_type,
                    }),
                    Err(StatusCode::BadNodeIdExists) => {
                        warn!("Duplicate node id {}, skipping", node_id);
                    }
                    Err(status) => error!("Error adding variable {}: {}", node_id, status),
                }
            } else {
                warn!("Tag {} has an unknown tag type, skipping", node_id);
            }
            path.pop();
        }
    }
}
