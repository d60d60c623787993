// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::convert::TryFrom;

use crate::types::{
    node_ids::{DataTypeId, VariableTypeId},
    service_types::{NodeClass, TimestampsToReturn},
    AccessLevel, Array, AttributeId, ByteString, DataValue, DateTime, LocalizedText, NodeId,
    QualifiedName, StatusCode, UAString, Variant, VariantTypeId,
};

use super::node::{Base, Node};

node_builder_impl!(VariableBuilder, Variable);

impl VariableBuilder {
    pub fn new<R, S>(node_id: &NodeId, browse_name: R, display_name: S) -> Self
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
    {
        Self {
            node: Variable::new(node_id, browse_name, display_name, Variant::Empty),
            references: Vec::with_capacity(4),
        }
        .has_type_definition(VariableTypeId::BaseDataVariableType)
    }

    /// Sets the value and derives the data type and value rank from it
    pub fn value<V>(mut self, value: V) -> Self
    where
        V: Into<Variant>,
    {
        let value = value.into();
        self.node.data_type = Variable::data_type_of(&value);
        self.node.value_rank = if value.is_array() { 1 } else { -1 };
        self.node.value = DataValue::new_now(value);
        self
    }

    pub fn data_type<T>(mut self, data_type: T) -> Self
    where
        T: Into<NodeId>,
    {
        self.node.data_type = data_type.into();
        self
    }

    pub fn value_rank(mut self, value_rank: i32) -> Self {
        self.node.value_rank = value_rank;
        self
    }

    pub fn writable(mut self) -> Self {
        self.node.set_writable(true);
        self
    }

    pub fn access_level(mut self, access_level: AccessLevel) -> Self {
        self.node.access_level = access_level;
        self.node.user_access_level = access_level;
        self
    }

    pub fn minimum_sampling_interval(mut self, minimum_sampling_interval: f64) -> Self {
        self.node.minimum_sampling_interval = minimum_sampling_interval;
        self
    }
}

/// A variable node. The value is held with its status and timestamps.
#[derive(Debug)]
pub struct Variable {
    base: Base,
    value: DataValue,
    data_type: NodeId,
    value_rank: i32,
    array_dimensions: Option<Vec<u32>>,
    access_level: AccessLevel,
    user_access_level: AccessLevel,
    minimum_sampling_interval: f64,
    historizing: bool,
}

node_impl!(Variable, |this, attribute_id| match attribute_id {
    AttributeId::Value => this.value.value.clone(),
    AttributeId::DataType => Some(this.data_type.clone().into()),
    AttributeId::ValueRank => Some(Variant::Int32(this.value_rank)),
    AttributeId::ArrayDimensions => this.array_dimensions.clone().map(Variant::from),
    AttributeId::AccessLevel => Some(Variant::Byte(this.access_level.bits())),
    AttributeId::UserAccessLevel => Some(Variant::Byte(this.user_access_level.bits())),
    AttributeId::MinimumSamplingInterval => {
        Some(Variant::Double(this.minimum_sampling_interval))
    }
    AttributeId::Historizing => Some(Variant::Boolean(this.historizing)),
    _ => None,
});

impl Variable {
    pub fn new<R, S, V>(node_id: &NodeId, browse_name: R, display_name: S, value: V) -> Variable
    where
        R: Into<QualifiedName>,
        S: Into<LocalizedText>,
        V: Into<Variant>,
    {
        let value = value.into();
        Variable {
            base: Base::new(NodeClass::Variable, node_id, browse_name, display_name),
            data_type: Self::data_type_of(&value),
            value_rank: if value.is_array() { 1 } else { -1 },
            array_dimensions: None,
            value: DataValue::new_now(value),
            access_level: AccessLevel::CURRENT_READ,
            user_access_level: AccessLevel::CURRENT_READ,
            minimum_sampling_interval: 0.0,
            historizing: false,
        }
    }

    fn data_type_of(value: &Variant) -> NodeId {
        match value.type_id() {
            VariantTypeId::Empty | VariantTypeId::Variant => DataTypeId::BaseDataType.into(),
            VariantTypeId::ExtensionObject => DataTypeId::Structure.into(),
            type_id => type_id.data_type_id(),
        }
    }

    /// Returns the value, narrowed to the index range and holding only the requested timestamps
    pub fn value(&self, timestamps_to_return: TimestampsToReturn, index_range: &IndexRange) -> DataValue {
        let mut data_value = self.value.filtered(timestamps_to_return);
        if let IndexRange::None = index_range {
            return data_value;
        }
        let result = match data_value.value.as_ref() {
            Some(value) => index_range.apply(value),
            None => Err(StatusCode::BadIndexRangeNoData),
        };
        match result {
            Ok(value) => data_value.value = Some(value),
            Err(status) => {
                data_value.value = None;
                data_value.status = Some(status);
            }
        }
        data_value
    }

    /// The stored value as is
    pub fn data_value(&self) -> &DataValue {
        &self.value
    }

    /// Sets the value after checking it against the data type and value rank, converting it
    /// implicitly if it is a different numeric type. Returns the new data value.
    pub fn set_value(
        &mut self,
        value: Variant,
        status: StatusCode,
        source_timestamp: Option<DateTime>,
        now: DateTime,
    ) -> Result<DataValue, StatusCode> {
        let value = self.coerce_value(value)?;
        self.value.set_value(value, source_timestamp, now);
        self.value.status = Some(status);
        Ok(self.value.clone())
    }

    fn coerce_value(&self, value: Variant) -> Result<Variant, StatusCode> {
        match self.value_rank {
            -1 if value.is_array() => {
                error!("Variable {} is scalar, cannot hold an array", self.node_id());
                return Err(StatusCode::BadTypeMismatch);
            }
            rank if rank >= 1 && !value.is_array() => {
                error!("Variable {} holds an array, cannot hold a scalar", self.node_id());
                return Err(StatusCode::BadTypeMismatch);
            }
            _ => {}
        }

        let data_type = &self.data_type;
        if *data_type == DataTypeId::BaseDataType {
            return Ok(value);
        }
        if value.is_empty() {
            return Err(StatusCode::BadTypeMismatch);
        }

        let type_matches = |type_id: VariantTypeId| -> bool {
            if *data_type == DataTypeId::Number {
                type_id.is_numeric()
            } else if *data_type == DataTypeId::Integer {
                matches!(
                    type_id,
                    VariantTypeId::SByte | VariantTypeId::Int16 | VariantTypeId::Int32 | VariantTypeId::Int64
                )
            } else if *data_type == DataTypeId::UInteger {
                matches!(
                    type_id,
                    VariantTypeId::Byte | VariantTypeId::UInt16 | VariantTypeId::UInt32 | VariantTypeId::UInt64
                )
            } else {
                false
            }
        };
        if type_matches(value.type_id()) {
            return Ok(value);
        }

        match VariantTypeId::try_from(data_type) {
            Ok(VariantTypeId::Variant) => Ok(value),
            Ok(target_type) => match value {
                Variant::Array(array) => {
                    let values = array
                        .values
                        .iter()
                        .map(|v| v.convert(target_type))
                        .collect::<Option<Vec<_>>>()
                        .ok_or(StatusCode::BadTypeMismatch)?;
                    let array = match array.dimensions {
                        Some(dimensions) => Array::new_multi(target_type, values, dimensions),
                        None => Array::new_single(target_type, values),
                    }
                    .map_err(|_| StatusCode::BadTypeMismatch)?;
                    Ok(Variant::from(array))
                }
                value => value.convert(target_type).ok_or_else(|| {
                    error!(
                        "Value of type {:?} cannot be converted to the data type {} of variable {}",
                        value.type_id(),
                        self.data_type,
                        self.node_id()
                    );
                    StatusCode::BadTypeMismatch
                }),
            },
            // Structures and enumerations are only set internally
            Err(_) => Ok(value),
        }
    }

    pub fn data_type(&self) -> &NodeId {
        &self.data_type
    }

    pub fn value_rank(&self) -> i32 {
        self.value_rank
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn user_access_level(&self) -> AccessLevel {
        self.user_access_level
    }

    pub fn is_readable(&self) -> bool {
        self.access_level.contains(AccessLevel::CURRENT_READ)
            && self.user_access_level.contains(AccessLevel::CURRENT_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.access_level.contains(AccessLevel::CURRENT_WRITE)
            && self.user_access_level.contains(AccessLevel::CURRENT_WRITE)
    }

    pub fn set_writable(&mut self, writable: bool) {
        self.access_level.set(AccessLevel::CURRENT_WRITE, writable);
        self.user_access_level.set(AccessLevel::CURRENT_WRITE, writable);
    }

    pub fn minimum_sampling_interval(&self) -> f64 {
        self.minimum_sampling_interval
    }
}

/// A parsed index range. Only single dimension ranges are supported, applying to arrays,
/// strings and byte strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexRange {
    None,
    Index(usize),
    Range(usize, usize),
}

impl IndexRange {
    /// Parses "n" or "a:b" with a < b. A null or empty string means no range.
    pub fn parse(index_range: &UAString) -> Result<IndexRange, StatusCode> {
        let index_range = match index_range.value() {
            Some(v) if !v.is_empty() => v.as_str(),
            _ => return Ok(IndexRange::None),
        };
        let parse_index = |s: &str| -> Result<usize, StatusCode> {
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(StatusCode::BadIndexRangeInvalid);
            }
            s.parse::<usize>()
                .map_err(|_| StatusCode::BadIndexRangeInvalid)
        };
        match index_range.split_once(':') {
            None => Ok(IndexRange::Index(parse_index(index_range)?)),
            Some((low, high)) => {
                let (low, high) = (parse_index(low)?, parse_index(high)?);
                if low >= high {
                    Err(StatusCode::BadIndexRangeInvalid)
                } else {
                    Ok(IndexRange::Range(low, high))
                }
            }
        }
    }

    /// The inclusive bounds clamped to the length, or `None` when the range starts past the end
    fn bounds(&self, len: usize) -> Option<(usize, usize)> {
        let (low, high) = match *self {
            IndexRange::None => return (len > 0).then(|| (0, len - 1)),
            IndexRange::Index(idx) => (idx, idx),
            IndexRange::Range(low, high) => (low, high),
        };
        if low >= len {
            None
        } else {
            Some((low, high.min(len - 1)))
        }
    }

    /// Extracts the range from the value
    pub fn apply(&self, value: &Variant) -> Result<Variant, StatusCode> {
        match value {
            Variant::Array(array) => {
                if array.dimensions.as_ref().map_or(false, |d| d.len() > 1) {
                    return Err(StatusCode::BadIndexRangeNoData);
                }
                let (low, high) = self
                    .bounds(array.values.len())
                    .ok_or(StatusCode::BadIndexRangeNoData)?;
                let values = array.values[low..=high].to_vec();
                Array::new_single(array.value_type, values)
                    .map(Variant::from)
                    .map_err(|_| StatusCode::BadIndexRangeNoData)
            }
            Variant::String(s) => {
                let chars = s.as_ref().chars().collect::<Vec<_>>();
                let (low, high) = self
                    .bounds(chars.len())
                    .ok_or(StatusCode::BadIndexRangeNoData)?;
                Ok(Variant::from(chars[low..=high].iter().collect::<String>()))
            }
            Variant::ByteString(b) => {
                let bytes = b.as_ref();
                let (low, high) = self
                    .bounds(bytes.len())
                    .ok_or(StatusCode::BadIndexRangeNoData)?;
                Ok(Variant::from(ByteString::from(bytes[low..=high].to_vec())))
            }
            _ => Err(StatusCode::BadIndexRangeNoData),
        }
    }
}
