// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `Variant`, `VariantTypeId` and `Array`.

use std::{
    convert::TryFrom,
    fmt,
    io::{Read, Write},
};

use crate::types::{
    byte_string::ByteString, data_value::DataValue, date_time::DateTime,
    diagnostic_info::DiagnosticInfo, encoding::*, extension_object::ExtensionObject, guid::Guid,
    localized_text::LocalizedText, node_id::*, qualified_name::QualifiedName,
    status_code::StatusCode, string::*,
};

/// Bits of the variant encoding mask above the type id
const ARRAY_DIMENSIONS_BIT: u8 = 1 << 6;
const ARRAY_VALUES_BIT: u8 = 1 << 7;
const TYPE_ID_MASK: u8 = 0x3f;

/// The type of a variant's payload. The discriminant is the built-in type id, which is both the
/// value written into the encoding mask and the numeric id of the corresponding data type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantTypeId {
    Empty = 0,
    Boolean = 1,
    SByte = 2,
    Byte = 3,
    Int16 = 4,
    UInt16 = 5,
    Int32 = 6,
    UInt32 = 7,
    Int64 = 8,
    UInt64 = 9,
    Float = 10,
    Double = 11,
    String = 12,
    DateTime = 13,
    Guid = 14,
    ByteString = 15,
    XmlElement = 16,
    NodeId = 17,
    ExpandedNodeId = 18,
    StatusCode = 19,
    QualifiedName = 20,
    LocalizedText = 21,
    ExtensionObject = 22,
    DataValue = 23,
    Variant = 24,
    DiagnosticInfo = 25,
}

impl TryFrom<u8> for VariantTypeId {
    type Error = StatusCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use VariantTypeId::*;
        const ALL: [VariantTypeId; 26] = [
            Empty,
            Boolean,
            SByte,
            Byte,
            Int16,
            UInt16,
            Int32,
            UInt32,
            Int64,
            UInt64,
            Float,
            Double,
            String,
            DateTime,
            Guid,
            ByteString,
            XmlElement,
            NodeId,
            ExpandedNodeId,
            StatusCode,
            QualifiedName,
            LocalizedText,
            ExtensionObject,
            DataValue,
            Variant,
            DiagnosticInfo,
        ];
        ALL.get(value as usize).copied().ok_or_else(|| {
            error!("Unrecognized variant type id {}", value);
            crate::types::StatusCode::BadDecodingError
        })
    }
}

impl TryFrom<&NodeId> for VariantTypeId {
    type Error = ();

    /// Maps a built-in data type node id onto the variant type that carries it.
    fn try_from(value: &NodeId) -> Result<Self, Self::Error> {
        match value.as_u32() {
            Some(id) if value.namespace == 0 && id > 0 && id <= 25 => {
                VariantTypeId::try_from(id as u8).map_err(|_| ())
            }
            _ => Err(()),
        }
    }
}

impl VariantTypeId {
    /// The data type node id corresponding to the variant type
    pub fn data_type_id(&self) -> NodeId {
        NodeId::new(0, *self as u32)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            VariantTypeId::SByte
                | VariantTypeId::Byte
                | VariantTypeId::Int16
                | VariantTypeId::UInt16
                | VariantTypeId::Int32
                | VariantTypeId::UInt32
                | VariantTypeId::Int64
                | VariantTypeId::UInt64
                | VariantTypeId::Float
                | VariantTypeId::Double
        )
    }
}

/// A `Variant` holds built-in OPC UA data types, including single and multi dimensional arrays,
/// data values and extension objects.
#[derive(PartialEq, Debug, Clone, Default)]
pub enum Variant {
    #[default]
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(UAString),
    DateTime(DateTime),
    Guid(Box<Guid>),
    StatusCode(StatusCode),
    ByteString(ByteString),
    XmlElement(XmlElement),
    NodeId(Box<NodeId>),
    ExpandedNodeId(Box<ExpandedNodeId>),
    QualifiedName(Box<QualifiedName>),
    LocalizedText(Box<LocalizedText>),
    ExtensionObject(Box<ExtensionObject>),
    DataValue(Box<DataValue>),
    /// Only meaningful as an element of an array of variants
    Variant(Box<Variant>),
    DiagnosticInfo(Box<DiagnosticInfo>),
    Array(Box<Array>),
}

/// Evaluates `$body` with `$v` bound to the payload of any scalar variant, or `$otherwise` for
/// `Empty` and `Array`.
macro_rules! with_scalar {
    ($value:expr, $v:ident => $body:expr, $otherwise:expr) => {
        match $value {
            Variant::Boolean($v) => $body,
            Variant::SByte($v) => $body,
            Variant::Byte($v) => $body,
            Variant::Int16($v) => $body,
            Variant::UInt16($v) => $body,
            Variant::Int32($v) => $body,
            Variant::UInt32($v) => $body,
            Variant::Int64($v) => $body,
            Variant::UInt64($v) => $body,
            Variant::Float($v) => $body,
            Variant::Double($v) => $body,
            Variant::String($v) => $body,
            Variant::DateTime($v) => $body,
            Variant::Guid($v) => $body,
            Variant::StatusCode($v) => $body,
            Variant::ByteString($v) => $body,
            Variant::XmlElement($v) => $body,
            Variant::NodeId($v) => $body,
            Variant::ExpandedNodeId($v) => $body,
            Variant::QualifiedName($v) => $body,
            Variant::LocalizedText($v) => $body,
            Variant::ExtensionObject($v) => $body,
            Variant::DataValue($v) => $body,
            Variant::Variant($v) => $body,
            Variant::DiagnosticInfo($v) => $body,
            Variant::Empty | Variant::Array(_) => $otherwise,
        }
    };
}

/// An array of variants of one type with optional dimensions. Values are stored sequentially,
/// higher rank dimensions first.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub value_type: VariantTypeId,
    pub values: Vec<Variant>,
    pub dimensions: Option<Vec<u32>>,
}

impl Array {
    pub fn new_single<V>(value_type: VariantTypeId, values: V) -> Result<Array, StatusCode>
    where
        V: Into<Vec<Variant>>,
    {
        Self::new(value_type, values.into(), None)
    }

    pub fn new_multi<V, D>(
        value_type: VariantTypeId,
        values: V,
        dimensions: D,
    ) -> Result<Array, StatusCode>
    where
        V: Into<Vec<Variant>>,
        D: Into<Vec<u32>>,
    {
        Self::new(value_type, values.into(), Some(dimensions.into()))
    }

    fn new(
        value_type: VariantTypeId,
        values: Vec<Variant>,
        dimensions: Option<Vec<u32>>,
    ) -> Result<Array, StatusCode> {
        if value_type == VariantTypeId::Empty {
            error!("Invalid array type supplied");
            return Err(StatusCode::BadDecodingError);
        }
        if let Some(v) = values
            .iter()
            .find(|v| v.is_array() || v.type_id() != value_type)
        {
            error!(
                "Value {:?} does not match array type {:?}",
                v.type_id(),
                value_type
            );
            return Err(StatusCode::BadDecodingError);
        }
        if let Some(ref dimensions) = dimensions {
            let length = dimensions
                .iter()
                .try_fold(1u32, |acc, d| acc.checked_mul(*d))
                .ok_or(StatusCode::BadDecodingError)?;
            if dimensions.iter().any(|d| *d == 0) || length as usize != values.len() {
                error!(
                    "Array dimensions {:?} do not match array length {}",
                    dimensions,
                    values.len()
                );
                return Err(StatusCode::BadDecodingError);
            }
        }
        Ok(Array {
            value_type,
            values,
            dimensions,
        })
    }

    fn encoding_mask(&self) -> u8 {
        let mut encoding_mask = self.value_type as u8 | ARRAY_VALUES_BIT;
        if self.dimensions.is_some() {
            encoding_mask |= ARRAY_DIMENSIONS_BIT;
        }
        encoding_mask
    }
}

impl BinaryEncoder<Variant> for Variant {
    fn byte_len(&self) -> usize {
        1 + match self {
            Variant::Array(array) => {
                let mut size = 4 + array
                    .values
                    .iter()
                    .map(|v| v.byte_len_value())
                    .sum::<usize>();
                if let Some(ref dimensions) = array.dimensions {
                    size += 4 + dimensions.len() * 4;
                }
                size
            }
            value => value.byte_len_value(),
        }
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.encoding_mask())?;
        size += match self {
            Variant::Array(array) => {
                let mut size = write_i32(stream, array.values.len() as i32)?;
                for value in array.values.iter() {
                    size += value.encode_value(stream)?;
                }
                if let Some(ref dimensions) = array.dimensions {
                    // Dimensions are Int32 on the wire
                    size += write_i32(stream, dimensions.len() as i32)?;
                    for dimension in dimensions {
                        size += write_i32(stream, *dimension as i32)?;
                    }
                }
                size
            }
            value => value.encode_value(stream)?,
        };
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = read_u8(stream)?;
        let value_type = VariantTypeId::try_from(encoding_mask & TYPE_ID_MASK)?;

        if encoding_mask & ARRAY_VALUES_BIT == 0 {
            if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
                error!("Array dimensions bit specified without any values");
                return Err(StatusCode::BadDecodingError);
            }
            return Variant::decode_value(stream, value_type, decoding_options);
        }

        // A null array decodes as an empty one
        let array_length = read_array_length(stream, decoding_options)?.unwrap_or(0);
        let mut values: Vec<Variant> = Vec::with_capacity(array_length);
        for _ in 0..array_length {
            values.push(Variant::decode_value(stream, value_type, decoding_options)?);
        }
        let array = if encoding_mask & ARRAY_DIMENSIONS_BIT != 0 {
            let dimensions: Option<Vec<i32>> = read_array(stream, decoding_options)?;
            let dimensions = dimensions.ok_or_else(|| {
                error!("No array dimensions despite the bit flag being set");
                StatusCode::BadDecodingError
            })?;
            if dimensions.iter().any(|d| *d < 0) {
                error!("Negative array dimension");
                return Err(StatusCode::BadDecodingError);
            }
            let dimensions = dimensions.into_iter().map(|d| d as u32).collect::<Vec<_>>();
            Array::new_multi(value_type, values, dimensions)?
        } else {
            Array::new_single(value_type, values)?
        };
        Ok(Variant::from(array))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::String(ref v) => write!(f, "{}", v),
            Variant::Guid(ref v) => write!(f, "{}", v),
            Variant::DateTime(ref v) => write!(f, "{}", v),
            Variant::NodeId(ref v) => write!(f, "{}", v),
            Variant::ExpandedNodeId(ref v) => write!(f, "{}", v),
            Variant::StatusCode(ref v) => write!(f, "{}", v),
            Variant::LocalizedText(ref v) => write!(f, "{}", v),
            Variant::QualifiedName(ref v) => write!(f, "{}", v),
            Variant::Variant(ref v) => write!(f, "Variant({})", v),
            value => write!(f, "{:?}", value),
        }
    }
}

macro_rules! from_impl {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Variant {
            fn from(v: $ty) -> Self {
                Variant::$variant(v)
            }
        }
    };
    ($ty:ty, $variant:ident, boxed) => {
        impl From<$ty> for Variant {
            fn from(v: $ty) -> Self {
                Variant::$variant(Box::new(v))
            }
        }
    };
}

from_impl!(bool, Boolean);
from_impl!(i8, SByte);
from_impl!(u8, Byte);
from_impl!(i16, Int16);
from_impl!(u16, UInt16);
from_impl!(i32, Int32);
from_impl!(u32, UInt32);
from_impl!(i64, Int64);
from_impl!(u64, UInt64);
from_impl!(f32, Float);
from_impl!(f64, Double);
from_impl!(UAString, String);
from_impl!(DateTime, DateTime);
from_impl!(StatusCode, StatusCode);
from_impl!(ByteString, ByteString);
from_impl!(Guid, Guid, boxed);
from_impl!(NodeId, NodeId, boxed);
from_impl!(ExpandedNodeId, ExpandedNodeId, boxed);
from_impl!(QualifiedName, QualifiedName, boxed);
from_impl!(LocalizedText, LocalizedText, boxed);
from_impl!(ExtensionObject, ExtensionObject, boxed);
from_impl!(DataValue, DataValue, boxed);
from_impl!(DiagnosticInfo, DiagnosticInfo, boxed);
from_impl!(Array, Array, boxed);

impl<'a> From<&'a str> for Variant {
    fn from(v: &'a str) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::String(UAString::from(v))
    }
}

impl From<Vec<u32>> for Variant {
    fn from(v: Vec<u32>) -> Self {
        let values = v.into_iter().map(Variant::UInt32).collect::<Vec<_>>();
        Variant::Array(Box::new(Array {
            value_type: VariantTypeId::UInt32,
            values,
            dimensions: None,
        }))
    }
}

impl From<Vec<UAString>> for Variant {
    fn from(v: Vec<UAString>) -> Self {
        let values = v.into_iter().map(Variant::String).collect::<Vec<_>>();
        Variant::Array(Box::new(Array {
            value_type: VariantTypeId::String,
            values,
            dimensions: None,
        }))
    }
}

impl Variant {
    /// Returns the length of just the value, not the encoding flag
    fn byte_len_value(&self) -> usize {
        with_scalar!(self, v => v.byte_len(), 0)
    }

    /// Encodes just the value, not the encoding flag
    fn encode_value<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        match self {
            Variant::Array(_) => {
                warn!("Cannot encode a nested array");
                Err(StatusCode::BadEncodingError)
            }
            value => with_scalar!(value, v => v.encode(stream), Ok(0)),
        }
    }

    /// Reads just the variant value of the given type from the stream
    fn decode_value<S: Read>(
        stream: &mut S,
        value_type: VariantTypeId,
        decoding_options: &DecodingOptions,
    ) -> EncodingResult<Self> {
        let o = decoding_options;
        let value = match value_type {
            VariantTypeId::Empty => Variant::Empty,
            VariantTypeId::Boolean => Variant::from(bool::decode(stream, o)?),
            VariantTypeId::SByte => Variant::from(i8::decode(stream, o)?),
            VariantTypeId::Byte => Variant::from(u8::decode(stream, o)?),
            VariantTypeId::Int16 => Variant::from(i16::decode(stream, o)?),
            VariantTypeId::UInt16 => Variant::from(u16::decode(stream, o)?),
            VariantTypeId::Int32 => Variant::from(i32::decode(stream, o)?),
            VariantTypeId::UInt32 => Variant::from(u32::decode(stream, o)?),
            VariantTypeId::Int64 => Variant::from(i64::decode(stream, o)?),
            VariantTypeId::UInt64 => Variant::from(u64::decode(stream, o)?),
            VariantTypeId::Float => Variant::from(f32::decode(stream, o)?),
            VariantTypeId::Double => Variant::from(f64::decode(stream, o)?),
            VariantTypeId::String => Variant::from(UAString::decode(stream, o)?),
            VariantTypeId::DateTime => Variant::from(DateTime::decode(stream, o)?),
            VariantTypeId::Guid => Variant::from(Guid::decode(stream, o)?),
            VariantTypeId::StatusCode => Variant::from(StatusCode::decode(stream, o)?),
            VariantTypeId::ByteString => Variant::from(ByteString::decode(stream, o)?),
            // XmlElement shares its representation with UAString so is constructed directly
            VariantTypeId::XmlElement => Variant::XmlElement(XmlElement::decode(stream, o)?),
            VariantTypeId::NodeId => Variant::from(NodeId::decode(stream, o)?),
            VariantTypeId::ExpandedNodeId => Variant::from(ExpandedNodeId::decode(stream, o)?),
            VariantTypeId::QualifiedName => Variant::from(QualifiedName::decode(stream, o)?),
            VariantTypeId::LocalizedText => Variant::from(LocalizedText::decode(stream, o)?),
            // Extension objects do their own depth checking
            VariantTypeId::ExtensionObject => Variant::from(ExtensionObject::decode(stream, o)?),
            VariantTypeId::DataValue => {
                let _depth_lock = o.depth_lock()?;
                Variant::from(DataValue::decode(stream, o)?)
            }
            VariantTypeId::Variant => {
                let _depth_lock = o.depth_lock()?;
                Variant::Variant(Box::new(Variant::decode(stream, o)?))
            }
            VariantTypeId::DiagnosticInfo => Variant::from(DiagnosticInfo::decode(stream, o)?),
        };
        Ok(value)
    }

    fn encoding_mask(&self) -> u8 {
        match self {
            Variant::Array(array) => array.encoding_mask(),
            value => value.type_id() as u8,
        }
    }

    /// Returns the scalar type of the variant, or the element type for an array
    pub fn type_id(&self) -> VariantTypeId {
        match self {
            Variant::Empty => VariantTypeId::Empty,
            Variant::Boolean(_) => VariantTypeId::Boolean,
            Variant::SByte(_) => VariantTypeId::SByte,
            Variant::Byte(_) => VariantTypeId::Byte,
            Variant::Int16(_) => VariantTypeId::Int16,
            Variant::UInt16(_) => VariantTypeId::UInt16,
            Variant::Int32(_) => VariantTypeId::Int32,
            Variant::UInt32(_) => VariantTypeId::UInt32,
            Variant::Int64(_) => VariantTypeId::Int64,
            Variant::UInt64(_) => VariantTypeId::UInt64,
            Variant::Float(_) => VariantTypeId::Float,
            Variant::Double(_) => VariantTypeId::Double,
            Variant::String(_) => VariantTypeId::String,
            Variant::DateTime(_) => VariantTypeId::DateTime,
            Variant::Guid(_) => VariantTypeId::Guid,
            Variant::StatusCode(_) => VariantTypeId::StatusCode,
            Variant::ByteString(_) => VariantTypeId::ByteString,
            Variant::XmlElement(_) => VariantTypeId::XmlElement,
            Variant::NodeId(_) => VariantTypeId::NodeId,
            Variant::ExpandedNodeId(_) => VariantTypeId::ExpandedNodeId,
            Variant::QualifiedName(_) => VariantTypeId::QualifiedName,
            Variant::LocalizedText(_) => VariantTypeId::LocalizedText,
            Variant::ExtensionObject(_) => VariantTypeId::ExtensionObject,
            Variant::DataValue(_) => VariantTypeId::DataValue,
            Variant::Variant(_) => VariantTypeId::Variant,
            Variant::DiagnosticInfo(_) => VariantTypeId::DiagnosticInfo,
            Variant::Array(array) => array.value_type,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Variant::Array(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    pub fn is_numeric(&self) -> bool {
        !self.is_array() && self.type_id().is_numeric()
    }

    /// Returns the value of a numeric or boolean scalar as an f64
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Variant::Boolean(v) => Some(if v { 1.0 } else { 0.0 }),
            Variant::SByte(v) => Some(f64::from(v)),
            Variant::Byte(v) => Some(f64::from(v)),
            Variant::Int16(v) => Some(f64::from(v)),
            Variant::UInt16(v) => Some(f64::from(v)),
            Variant::Int32(v) => Some(f64::from(v)),
            Variant::UInt32(v) => Some(f64::from(v)),
            Variant::Int64(v) => Some(v as f64),
            Variant::UInt64(v) => Some(v as f64),
            Variant::Float(v) => Some(f64::from(v)),
            Variant::Double(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the value of an integer or boolean scalar as an i128, which holds every integer type
    fn as_integer(&self) -> Option<i128> {
        match *self {
            Variant::Boolean(v) => Some(i128::from(v)),
            Variant::SByte(v) => Some(i128::from(v)),
            Variant::Byte(v) => Some(i128::from(v)),
            Variant::Int16(v) => Some(i128::from(v)),
            Variant::UInt16(v) => Some(i128::from(v)),
            Variant::Int32(v) => Some(i128::from(v)),
            Variant::UInt32(v) => Some(i128::from(v)),
            Variant::Int64(v) => Some(i128::from(v)),
            Variant::UInt64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Converts the value to the target type if the conversion is implicit:
    ///
    /// * integers to other integer types when the value is in range,
    /// * integers and booleans to Float / Double,
    /// * Float to Double, and Double to Float when finite and in range (precision may be lost).
    ///
    /// Returns `None` when no implicit conversion exists.
    pub fn convert(&self, target_type: VariantTypeId) -> Option<Variant> {
        if self.type_id() == target_type && !self.is_array() {
            return Some(self.clone());
        }
        if let Some(v) = self.as_integer() {
            let converted = match target_type {
                VariantTypeId::SByte => i8::try_from(v).ok().map(Variant::from),
                VariantTypeId::Byte => u8::try_from(v).ok().map(Variant::from),
                VariantTypeId::Int16 => i16::try_from(v).ok().map(Variant::from),
                VariantTypeId::UInt16 => u16::try_from(v).ok().map(Variant::from),
                VariantTypeId::Int32 => i32::try_from(v).ok().map(Variant::from),
                VariantTypeId::UInt32 => u32::try_from(v).ok().map(Variant::from),
                VariantTypeId::Int64 => i64::try_from(v).ok().map(Variant::from),
                VariantTypeId::UInt64 => u64::try_from(v).ok().map(Variant::from),
                VariantTypeId::Float => Some(Variant::Float(v as f32)),
                VariantTypeId::Double => Some(Variant::Double(v as f64)),
                _ => None,
            };
            // Booleans only widen into numbers, never the other way
            return converted;
        }
        match (self, target_type) {
            (Variant::Float(v), VariantTypeId::Double) => Some(Variant::Double(f64::from(*v))),
            (Variant::Double(v), VariantTypeId::Float)
                if v.is_finite() && v.abs() <= f64::from(f32::MAX) =>
            {
                Some(Variant::Float(*v as f32))
            }
            _ => None,
        }
    }
}
