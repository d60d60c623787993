// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The OPC UA binary codec. Contains the built-in data types, the service messages the server
//! understands and the `BinaryEncoder` trait that turns them into and out of bytes.

use std::io::{Read, Write};

#[macro_use]
mod macros;

/// Limits applied when decoding unless the configuration overrides them.
pub mod constants {
    /// Default maximum number of elements in an array
    pub const MAX_ARRAY_LENGTH: usize = 1000;
    /// Default maximum size of a string in bytes
    pub const MAX_STRING_LENGTH: usize = 65535;
    /// Default maximum size of a byte string in bytes
    pub const MAX_BYTE_STRING_LENGTH: usize = 65535;
    /// Default maximum number of chunks in a message
    pub const MAX_CHUNK_COUNT: usize = 5;
    /// Default maximum size of a message in bytes
    pub const MAX_MESSAGE_SIZE: usize = 65535 * MAX_CHUNK_COUNT;
    /// Maximum nesting of variants, extension objects and diagnostic infos
    pub const MAX_DECODING_DEPTH: usize = 10;
    /// URI supplied for the None security policy
    pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";
    /// The transport profile for the binary protocol over TCP
    pub const TRANSPORT_PROFILE_URI_BINARY: &str =
        "http://opcfoundation.org/UA-Profile/Transport/uatcp-uasc-uabinary";
}

pub mod attribute;
pub mod basic_types;
pub mod byte_string;
pub mod data_value;
pub mod date_time;
pub mod diagnostic_info;
pub mod encoding;
pub mod extension_object;
pub mod guid;
pub mod localized_text;
pub mod node_id;
pub mod node_ids;
pub mod notification_message;
pub mod qualified_name;
pub mod request_header;
pub mod response_header;
pub mod service_types;
pub mod status_code;
pub mod string;
pub mod supported_message;
pub mod variant;

pub use self::{
    attribute::*, byte_string::ByteString, data_value::*, date_time::*, diagnostic_info::*,
    encoding::*, extension_object::*, guid::Guid, localized_text::LocalizedText, node_id::*,
    node_ids::*, notification_message::*, qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, service_types::*, status_code::StatusCode, string::*,
    supported_message::SupportedMessage, variant::*,
};

/// Implemented by every structure that travels inside an extension object or as a service
/// message so the codec knows which object id to put on the wire.
pub trait MessageInfo {
    /// The binary encoding id of the type
    fn object_id(&self) -> ObjectId;
}

/// A null array differs from an empty one on the wire, so arrays are `Option<Vec<T>>`.
impl<T> BinaryEncoder<Option<Vec<T>>> for Option<Vec<T>>
where
    T: BinaryEncoder<T>,
{
    fn byte_len(&self) -> usize {
        byte_len_array(self)
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_array(stream, self)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        read_array(stream, decoding_options)
    }
}

#[cfg(test)]
mod tests;
