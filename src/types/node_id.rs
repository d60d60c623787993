// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `NodeId` and `ExpandedNodeId`.

use std::{
    convert::TryFrom,
    fmt,
    io::{Read, Write},
    str::FromStr,
};

use crate::types::{
    byte_string::ByteString,
    encoding::*,
    guid::Guid,
    node_ids::{ObjectId, ReferenceTypeId},
    status_code::StatusCode,
    string::*,
};

/// The kind of identifier, numeric, string, guid or byte
#[derive(Eq, PartialEq, Clone, Debug, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(UAString),
    Guid(Guid),
    ByteString(ByteString),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", *v),
            Identifier::String(v) => write!(f, "s={}", v),
            Identifier::Guid(v) => write!(f, "g={:?}", v),
            Identifier::ByteString(v) => write!(f, "b={}", v.as_base64()),
        }
    }
}

impl FromStr for Identifier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 2 || !s.is_char_boundary(2) {
            return Err(());
        }
        let (kind, value) = s.split_at(2);
        match kind {
            "i=" => value.parse::<u32>().map(|v| v.into()).map_err(|_| ()),
            "s=" if !value.is_empty() => Ok(UAString::from(value).into()),
            "g=" => Guid::from_str(value).map(|v| v.into()),
            "b=" => ByteString::from_base64(value).map(|v| v.into()).ok_or(()),
            _ => Err(()),
        }
    }
}

impl From<i32> for Identifier {
    fn from(v: i32) -> Self {
        Identifier::Numeric(v as u32)
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl<'a> From<&'a str> for Identifier {
    fn from(v: &'a str) -> Self {
        Identifier::from(UAString::from(v))
    }
}

impl From<&String> for Identifier {
    fn from(v: &String) -> Self {
        Identifier::from(UAString::from(v))
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::from(UAString::from(v))
    }
}

impl From<UAString> for Identifier {
    fn from(v: UAString) -> Self {
        Identifier::String(v)
    }
}

impl From<Guid> for Identifier {
    fn from(v: Guid) -> Self {
        Identifier::Guid(v)
    }
}

impl From<ByteString> for Identifier {
    fn from(v: ByteString) -> Self {
        Identifier::ByteString(v)
    }
}

/// An identifier for a node in the address space of an OPC UA Server.
#[derive(PartialEq, Eq, Clone, Debug, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// The index for a namespace
    pub namespace: u16,
    /// The identifier for the node in the address space
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

// Encoding byte values. The top two bits of the byte are reserved for the flags of an
// ExpandedNodeId.
const ENCODING_TWO_BYTE: u8 = 0x0;
const ENCODING_FOUR_BYTE: u8 = 0x1;
const ENCODING_NUMERIC: u8 = 0x2;
const ENCODING_STRING: u8 = 0x3;
const ENCODING_GUID: u8 = 0x4;
const ENCODING_BYTE_STRING: u8 = 0x5;
const ENCODING_MASK: u8 = 0x0f;

const EXPANDED_NAMESPACE_URI_FLAG: u8 = 0x80;
const EXPANDED_SERVER_INDEX_FLAG: u8 = 0x40;

impl NodeId {
    /// Writes the encoding byte (OR'd with any expanded flags) and the body.
    fn encode_with_flags<S: Write>(&self, stream: &mut S, flags: u8) -> EncodingResult<usize> {
        let mut size: usize = 0;
        match &self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && *value <= 255 {
                    size += write_u8(stream, flags | ENCODING_TWO_BYTE)?;
                    size += write_u8(stream, *value as u8)?;
                } else if self.namespace <= 255 && *value <= 65535 {
                    size += write_u8(stream, flags | ENCODING_FOUR_BYTE)?;
                    size += write_u8(stream, self.namespace as u8)?;
                    size += write_u16(stream, *value as u16)?;
                } else {
                    size += write_u8(stream, flags | ENCODING_NUMERIC)?;
                    size += write_u16(stream, self.namespace)?;
                    size += write_u32(stream, *value)?;
                }
            }
            Identifier::String(value) => {
                size += write_u8(stream, flags | ENCODING_STRING)?;
                size += write_u16(stream, self.namespace)?;
                size += value.encode(stream)?;
            }
            Identifier::Guid(value) => {
                size += write_u8(stream, flags | ENCODING_GUID)?;
                size += write_u16(stream, self.namespace)?;
                size += value.encode(stream)?;
            }
            Identifier::ByteString(value) => {
                size += write_u8(stream, flags | ENCODING_BYTE_STRING)?;
                size += write_u16(stream, self.namespace)?;
                size += value.encode(stream)?;
            }
        }
        Ok(size)
    }

    /// Reads the body that follows an encoding byte.
    fn decode_body<S: Read>(
        stream: &mut S,
        encoding: u8,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<NodeId> {
        let node_id = match encoding {
            ENCODING_TWO_BYTE => NodeId::new(0, u32::from(read_u8(stream)?)),
            ENCODING_FOUR_BYTE => {
                let namespace = read_u8(stream)?;
                let value = read_u16(stream)?;
                NodeId::new(u16::from(namespace), u32::from(value))
            }
            ENCODING_NUMERIC => {
                let namespace = read_u16(stream)?;
                NodeId::new(namespace, read_u32(stream)?)
            }
            ENCODING_STRING => {
                let namespace = read_u16(stream)?;
                NodeId::new(namespace, UAString::decode(stream, decoding_options)?)
            }
            ENCODING_GUID => {
                let namespace = read_u16(stream)?;
                NodeId::new(namespace, Guid::decode(stream, decoding_options)?)
            }
            ENCODING_BYTE_STRING => {
                let namespace = read_u16(stream)?;
                NodeId::new(namespace, ByteString::decode(stream, decoding_options)?)
            }
            _ => {
                error!("Unrecognized node id type {}", encoding);
                return Err(StatusCode::BadDecodingError);
            }
        };
        Ok(node_id)
    }
}

impl BinaryEncoder<NodeId> for NodeId {
    fn byte_len(&self) -> usize {
        match self.identifier {
            Identifier::Numeric(value) => {
                if self.namespace == 0 && value <= 255 {
                    2
                } else if self.namespace <= 255 && value <= 65535 {
                    4
                } else {
                    7
                }
            }
            Identifier::String(ref value) => 3 + value.byte_len(),
            Identifier::Guid(ref value) => 3 + value.byte_len(),
            Identifier::ByteString(ref value) => 3 + value.byte_len(),
        }
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        self.encode_with_flags(stream, 0)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding = read_u8(stream)?;
        if encoding & !ENCODING_MASK != 0 {
            error!("Node id encoding byte {:#x} has expanded flags set", encoding);
            return Err(StatusCode::BadDecodingError);
        }
        NodeId::decode_body(stream, encoding, decoding_options)
    }
}

/// Splits an optional `ns=<index>;` prefix from the rest of a node id string.
fn split_namespace(s: &str) -> Result<(u16, &str), StatusCode> {
    match s.strip_prefix("ns=") {
        Some(rest) => {
            let (ns, rest) = rest.split_once(';').ok_or(StatusCode::BadNodeIdInvalid)?;
            let ns = ns.parse::<u16>().map_err(|_| StatusCode::BadNodeIdInvalid)?;
            Ok((ns, rest))
        }
        None => Ok((0, s)),
    }
}

impl FromStr for NodeId {
    type Err = StatusCode;

    /// Parses `ns=<namespaceindex>;<type>=<value>` where type is one of `i`, `s`, `g`, or `b`.
    /// The namespace part is omitted for namespace 0.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (namespace, identifier) = split_namespace(s)?;
        Identifier::from_str(identifier)
            .map(|t| NodeId::new(namespace, t))
            .map_err(|_| StatusCode::BadNodeIdInvalid)
    }
}

impl From<&NodeId> for NodeId {
    fn from(v: &NodeId) -> Self {
        v.clone()
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.to_string()
    }
}

impl<'a> From<(u16, &'a str)> for NodeId {
    fn from(v: (u16, &'a str)) -> Self {
        Self::new(v.0, UAString::from(v.1))
    }
}

impl From<(u16, u32)> for NodeId {
    fn from(v: (u16, u32)) -> Self {
        Self::new(v.0, v.1)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl NodeId {
    /// Constructs a new NodeId from anything that can be turned into Identifier
    pub fn new<T>(namespace: u16, value: T) -> NodeId
    where
        T: Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: value.into(),
        }
    }

    pub fn root_folder_id() -> NodeId {
        ObjectId::RootFolder.into()
    }

    pub fn objects_folder_id() -> NodeId {
        ObjectId::ObjectsFolder.into()
    }

    /// Test if the node id is null, i.e. 0 namespace and 0 identifier
    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    /// Returns the numeric value of the identifier, if it is numeric
    pub fn as_u32(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(id) => Some(id),
            _ => None,
        }
    }

    /// Extracts an ObjectId from a node id, providing the node id holds an object id
    pub fn as_object_id(&self) -> std::result::Result<ObjectId, ()> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => ObjectId::try_from(id),
            _ => Err(()),
        }
    }

    pub fn as_reference_type_id(&self) -> std::result::Result<ReferenceTypeId, ()> {
        match self.identifier {
            Identifier::Numeric(id) if self.namespace == 0 => ReferenceTypeId::try_from(id),
            _ => Err(()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.identifier, Identifier::Numeric(_))
    }
}

/// A NodeId that allows the namespace URI to be specified instead of an index.
#[derive(PartialEq, Eq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct ExpandedNodeId {
    pub node_id: NodeId,
    pub namespace_uri: UAString,
    pub server_index: u32,
}

impl BinaryEncoder<ExpandedNodeId> for ExpandedNodeId {
    fn byte_len(&self) -> usize {
        let mut size = self.node_id.byte_len();
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.byte_len();
        }
        if self.server_index != 0 {
            size += self.server_index.byte_len();
        }
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut flags = 0;
        if !self.namespace_uri.is_null() {
            flags |= EXPANDED_NAMESPACE_URI_FLAG;
        }
        if self.server_index != 0 {
            flags |= EXPANDED_SERVER_INDEX_FLAG;
        }
        let mut size = self.node_id.encode_with_flags(stream, flags)?;
        if !self.namespace_uri.is_null() {
            size += self.namespace_uri.encode(stream)?;
        }
        if self.server_index != 0 {
            size += self.server_index.encode(stream)?;
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let data_encoding = read_u8(stream)?;
        let node_id = NodeId::decode_body(stream, data_encoding & ENCODING_MASK, decoding_options)?;
        let namespace_uri = if data_encoding & EXPANDED_NAMESPACE_URI_FLAG != 0 {
            UAString::decode(stream, decoding_options)?
        } else {
            UAString::null()
        };
        let server_index = if data_encoding & EXPANDED_SERVER_INDEX_FLAG != 0 {
            u32::decode(stream, decoding_options)?
        } else {
            0
        };
        Ok(ExpandedNodeId {
            node_id,
            namespace_uri,
            server_index,
        })
    }
}

impl<'a> From<&'a NodeId> for ExpandedNodeId {
    fn from(v: &'a NodeId) -> Self {
        v.clone().into()
    }
}

impl From<NodeId> for ExpandedNodeId {
    fn from(v: NodeId) -> Self {
        ExpandedNodeId {
            node_id: v,
            namespace_uri: UAString::null(),
            server_index: 0,
        }
    }
}

impl fmt::Display for ExpandedNodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace_uri.is_empty() {
            // svr=<serverindex>;ns=<namespaceindex>;<type>=<value>
            write!(f, "svr={};{}", self.server_index, self.node_id)
        } else {
            // The % and ; chars have to be escaped out in the uri
            let namespace_uri = self
                .namespace_uri
                .as_ref()
                .replace('%', "%25")
                .replace(';', "%3b");
            write!(
                f,
                "svr={};nsu={};{}",
                self.server_index, namespace_uri, self.node_id.identifier
            )
        }
    }
}

impl FromStr for ExpandedNodeId {
    type Err = StatusCode;

    /// Parses `svr=<serverindex>;ns=<namespaceindex>;<type>=<value>` or
    /// `svr=<serverindex>;nsu=<uri>;<type>=<value>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let rest = s.strip_prefix("svr=").ok_or(StatusCode::BadNodeIdInvalid)?;
        let (server_index, rest) = rest.split_once(';').ok_or(StatusCode::BadNodeIdInvalid)?;
        let server_index = server_index
            .parse::<u32>()
            .map_err(|_| StatusCode::BadNodeIdInvalid)?;
        if let Some(rest) = rest.strip_prefix("nsu=") {
            let (nsu, identifier) = rest
                .split_once(';')
                .filter(|(nsu, _)| !nsu.is_empty())
                .ok_or(StatusCode::BadNodeIdInvalid)?;
            let namespace_uri = nsu.replace("%3b", ";").replace("%25", "%");
            let identifier =
                Identifier::from_str(identifier).map_err(|_| StatusCode::BadNodeIdInvalid)?;
            Ok(ExpandedNodeId {
                node_id: NodeId::new(0, identifier),
                namespace_uri: UAString::from(namespace_uri),
                server_index,
            })
        } else {
            let node_id = NodeId::from_str(rest)?;
            Ok(ExpandedNodeId {
                node_id,
                namespace_uri: UAString::null(),
                server_index,
            })
        }
    }
}

impl Default for ExpandedNodeId {
    fn default() -> Self {
        ExpandedNodeId::null()
    }
}

impl ExpandedNodeId {
    pub fn null() -> ExpandedNodeId {
        NodeId::null().into()
    }

    pub fn is_null(&self) -> bool {
        self.node_id.is_null()
    }
}
