// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains definitions of the simple OPC UA scalar types.
//!
//! Built-in UA types map onto Rust types as follows: Boolean -> bool, SByte -> i8, Byte -> u8,
//! Int16 -> i16, UInt16 -> u16, Int32 -> i32, UInt32 -> u32, Int64 -> i64, UInt64 -> u64,
//! Float -> f32, Double -> f64.

use std::io::{Read, Write};

use crate::types::encoding::*;

impl BinaryEncoder<bool> for bool {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, u8::from(*self))
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        // Any non-zero value is true
        Ok(read_u8(stream)? != 0)
    }
}

impl BinaryEncoder<i8> for i8 {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, *self as u8)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        Ok(read_u8(stream)? as i8)
    }
}

impl BinaryEncoder<u8> for u8 {
    fn byte_len(&self) -> usize {
        1
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_u8(stream, *self)
    }

    fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
        read_u8(stream)
    }
}

macro_rules! scalar_encoder {
    ($ty:ty, $len:expr, $write_fn:ident, $read_fn:ident) => {
        impl BinaryEncoder<$ty> for $ty {
            fn byte_len(&self) -> usize {
                $len
            }

            fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
                $write_fn(stream, *self)
            }

            fn decode<S: Read>(stream: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
                $read_fn(stream)
            }
        }
    };
}

scalar_encoder!(i16, 2, write_i16, read_i16);
scalar_encoder!(u16, 2, write_u16, read_u16);
scalar_encoder!(i32, 4, write_i32, read_i32);
scalar_encoder!(u32, 4, write_u32, read_u32);
scalar_encoder!(i64, 8, write_i64, read_i64);
scalar_encoder!(u64, 8, write_u64, read_u64);
scalar_encoder!(f32, 4, write_f32, read_f32);
scalar_encoder!(f64, 8, write_f64, read_f64);
