// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `DataValue`.

use std::io::{Read, Write};

use crate::types::{
    date_time::*, encoding::*, service_types::TimestampsToReturn, status_code::StatusCode,
    variant::Variant,
};

bitflags! {
    struct DataValueFlags: u8 {
        /// False if the Value is Null.
        const HAS_VALUE = 0x1;
        /// False if the StatusCode is Good.
        const HAS_STATUS = 0x2;
        /// False if the Source Timestamp is DateTime.MinValue.
        const HAS_SOURCE_TIMESTAMP = 0x4;
        /// False if the Server Timestamp is DateTime.MinValue.
        const HAS_SERVER_TIMESTAMP = 0x8;
        /// False if the Source Picoseconds is 0.
        const HAS_SOURCE_PICOSECONDS = 0x10;
        /// False if the Server Picoseconds is 0.
        const HAS_SERVER_PICOSECONDS = 0x20;
    }
}

/// A data value is a value of a variable in the OPC UA server and contains information about its
/// value, status and change timestamps.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value. Not present if the Value bit in the EncodingMask is False.
    pub value: Option<Variant>,
    /// The status associated with the value. Not present if the StatusCode bit in the
    /// EncodingMask is False
    pub status: Option<StatusCode>,
    /// The source timestamp associated with the value.
    pub source_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the SourceTimestamp. Ignored if the source
    /// timestamp is missing.
    pub source_picoseconds: Option<i16>,
    /// The Server timestamp associated with the value.
    pub server_timestamp: Option<DateTime>,
    /// The number of 10 picosecond intervals for the ServerTimestamp. Ignored if the server
    /// timestamp is missing.
    pub server_picoseconds: Option<i16>,
}

impl BinaryEncoder<DataValue> for DataValue {
    fn byte_len(&self) -> usize {
        let mut size = 1;
        if let Some(ref value) = self.value {
            size += value.byte_len();
        }
        if self.status.is_some() {
            size += 4;
        }
        if self.source_timestamp.is_some() {
            size += 8;
            if self.source_picoseconds.is_some() {
                size += 2;
            }
        }
        if self.server_timestamp.is_some() {
            size += 8;
            if self.server_picoseconds.is_some() {
                size += 2;
            }
        }
        size
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        let mut size = write_u8(stream, self.encoding_mask().bits())?;
        if let Some(ref value) = self.value {
            size += value.encode(stream)?;
        }
        if let Some(ref status) = self.status {
            size += status.encode(stream)?;
        }
        if let Some(ref source_timestamp) = self.source_timestamp {
            size += source_timestamp.encode(stream)?;
            if let Some(source_picoseconds) = self.source_picoseconds {
                size += write_i16(stream, source_picoseconds)?;
            }
        }
        if let Some(ref server_timestamp) = self.server_timestamp {
            size += server_timestamp.encode(stream)?;
            if let Some(server_picoseconds) = self.server_picoseconds {
                size += write_i16(stream, server_picoseconds)?;
            }
        }
        Ok(size)
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let encoding_mask = DataValueFlags::from_bits_truncate(read_u8(stream)?);

        let value = if encoding_mask.contains(DataValueFlags::HAS_VALUE) {
            Some(Variant::decode(stream, decoding_options)?)
        } else {
            None
        };
        let status = if encoding_mask.contains(DataValueFlags::HAS_STATUS) {
            Some(StatusCode::decode(stream, decoding_options)?)
        } else {
            None
        };
        let source_timestamp = if encoding_mask.contains(DataValueFlags::HAS_SOURCE_TIMESTAMP) {
            // The source timestamp is never adjusted for clock skew
            let decoding_options = DecodingOptions {
                client_offset: chrono::Duration::zero(),
                ..decoding_options.clone()
            };
            Some(DateTime::decode(stream, &decoding_options)?)
        } else {
            None
        };
        let source_picoseconds = if encoding_mask.contains(DataValueFlags::HAS_SOURCE_PICOSECONDS) {
            Some(read_i16(stream)?)
        } else {
            None
        };
        let server_timestamp = if encoding_mask.contains(DataValueFlags::HAS_SERVER_TIMESTAMP) {
            Some(DateTime::decode(stream, decoding_options)?)
        } else {
            None
        };
        let server_picoseconds = if encoding_mask.contains(DataValueFlags::HAS_SERVER_PICOSECONDS) {
            Some(read_i16(stream)?)
        } else {
            None
        };
        Ok(DataValue {
            value,
            status,
            source_picoseconds: source_timestamp.and(source_picoseconds),
            source_timestamp,
            server_picoseconds: server_timestamp.and(server_picoseconds),
            server_timestamp,
        })
    }
}

macro_rules! from_value_impl {
    ( $( $ty:ty ),* ) => {
        $(
            impl From<$ty> for DataValue {
                fn from(v: $ty) -> Self {
                    DataValue::value_only(v)
                }
            }
        )*
    };
}

from_value_impl!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64, &str, String, Variant);

impl DataValue {
    /// Creates a data value with just a value and no timestamps or status
    pub fn value_only<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Creates a data value stamped with the current time as both source and server timestamp
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// Creates an empty data value carrying only a status and a server timestamp. This is what a
    /// read of something that fails returns.
    pub fn from_status(status: StatusCode) -> DataValue {
        DataValue {
            status: Some(status),
            server_timestamp: Some(DateTime::now()),
            ..Default::default()
        }
    }

    /// Creates an empty DataValue
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// Sets the value and both timestamps. A missing source timestamp becomes the server one.
    pub fn set_value<V>(&mut self, value: V, source_timestamp: Option<DateTime>, now: DateTime)
    where
        V: Into<Variant>,
    {
        self.value = Some(value.into());
        self.source_timestamp = Some(source_timestamp.unwrap_or(now));
        self.source_picoseconds = None;
        self.server_timestamp = Some(now);
        self.server_picoseconds = None;
    }

    /// The status of the value with an absent status meaning good
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Test if the value held by this data value is known to be good. Anything other than Good
    /// is assumed to be invalid.
    pub fn is_valid(&self) -> bool {
        self.status().is_good()
    }

    /// Returns a copy holding only the timestamps the client asked for
    pub fn filtered(&self, timestamps_to_return: TimestampsToReturn) -> DataValue {
        let mut result = self.clone();
        match timestamps_to_return {
            TimestampsToReturn::Source => {
                result.server_timestamp = None;
                result.server_picoseconds = None;
            }
            TimestampsToReturn::Server => {
                result.source_timestamp = None;
                result.source_picoseconds = None;
            }
            TimestampsToReturn::Neither | TimestampsToReturn::Invalid => {
                result.server_timestamp = None;
                result.server_picoseconds = None;
                result.source_timestamp = None;
                result.source_picoseconds = None;
            }
            TimestampsToReturn::Both => {}
        }
        result
    }

    fn encoding_mask(&self) -> DataValueFlags {
        let mut encoding_mask = DataValueFlags::empty();
        encoding_mask.set(DataValueFlags::HAS_VALUE, self.value.is_some());
        encoding_mask.set(DataValueFlags::HAS_STATUS, self.status.is_some());
        if self.source_timestamp.is_some() {
            encoding_mask |= DataValueFlags::HAS_SOURCE_TIMESTAMP;
            encoding_mask.set(
                DataValueFlags::HAS_SOURCE_PICOSECONDS,
                self.source_picoseconds.is_some(),
            );
        }
        if self.server_timestamp.is_some() {
            encoding_mask |= DataValueFlags::HAS_SERVER_TIMESTAMP;
            encoding_mask.set(
                DataValueFlags::HAS_SERVER_PICOSECONDS,
                self.server_picoseconds.is_some(),
            );
        }
        encoding_mask
    }
}
