// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

// Declarative helpers that expand to structure / enum definitions together with their binary
// encoding. Fields are encoded in declaration order which must match the order in Part 4.

/// Declares a structure whose fields are all `BinaryEncoder`s. A structure that has a binary
/// encoding id of its own is declared with the id in brackets after its name.
macro_rules! ua_struct {
    (
        $(#[$meta:meta])*
        pub struct $name:ident [$object_id:ident] {
            $( $(#[$field_meta:meta])* pub $field:ident: $ty:ty, )*
        }
    ) => {
        ua_struct! {
            $(#[$meta])*
            pub struct $name {
                $( $(#[$field_meta])* pub $field: $ty, )*
            }
        }

        impl $crate::types::MessageInfo for $name {
            fn object_id(&self) -> $crate::types::ObjectId {
                $crate::types::ObjectId::$object_id
            }
        }
    };
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( $(#[$field_meta:meta])* pub $field:ident: $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $( $(#[$field_meta])* pub $field: $ty, )*
        }

        impl $crate::types::BinaryEncoder<$name> for $name {
            fn byte_len(&self) -> usize {
                let mut size = 0;
                $( size += $crate::types::BinaryEncoder::<$ty>::byte_len(&self.$field); )*
                size
            }

            fn encode<S: std::io::Write>(
                &self,
                stream: &mut S,
            ) -> $crate::types::EncodingResult<usize> {
                let mut size = 0;
                $( size += $crate::types::BinaryEncoder::<$ty>::encode(&self.$field, stream)?; )*
                Ok(size)
            }

            fn decode<S: std::io::Read>(
                stream: &mut S,
                decoding_options: &$crate::types::DecodingOptions,
            ) -> $crate::types::EncodingResult<Self> {
                $( let $field = <$ty as $crate::types::BinaryEncoder<$ty>>::decode(stream, decoding_options)?; )*
                Ok($name { $( $field, )* })
            }
        }
    };
}

/// Declares an enumeration that is encoded on the wire as an `Int32`. Values outside of the
/// declared set fail to decode.
macro_rules! ua_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$variant_meta:meta])* $variant:ident = $value:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$variant_meta])* $variant = $value, )*
        }

        impl std::convert::TryFrom<i32> for $name {
            type Error = $crate::types::StatusCode;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )*
                    _ => {
                        error!("Invalid value {} for enum {}", value, stringify!($name));
                        Err($crate::types::StatusCode::BadDecodingError)
                    }
                }
            }
        }

        impl $crate::types::BinaryEncoder<$name> for $name {
            fn byte_len(&self) -> usize {
                4
            }

            fn encode<S: std::io::Write>(
                &self,
                stream: &mut S,
            ) -> $crate::types::EncodingResult<usize> {
                $crate::types::write_i32(stream, *self as i32)
            }

            fn decode<S: std::io::Read>(
                stream: &mut S,
                _: &$crate::types::DecodingOptions,
            ) -> $crate::types::EncodingResult<Self> {
                let value = $crate::types::read_i32(stream)?;
                <$name as std::convert::TryFrom<i32>>::try_from(value)
            }
        }
    };
}
