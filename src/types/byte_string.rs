// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Contains the implementation of `ByteString` and the length prefixed encoding it shares with
//! `UAString`.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::types::{
    encoding::{
        process_decode_io_result, process_encode_io_result, read_i32, write_i32, BinaryEncoder,
        DecodingOptions, EncodingResult,
    },
    status_code::StatusCode,
};

/// A sequence of octets.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
pub struct ByteString {
    pub value: Option<Vec<u8>>,
}

/// Writes an Int32 length followed by the bytes. A null value is written as length -1.
pub(crate) fn write_length_prefixed(
    stream: &mut dyn Write,
    value: Option<&[u8]>,
) -> EncodingResult<usize> {
    match value {
        None => write_i32(stream, -1),
        Some(value) => {
            let size = write_i32(stream, value.len() as i32)?;
            process_encode_io_result(stream.write_all(value).map(|_| size + value.len()))
        }
    }
}

/// Reads an Int32 length followed by that many bytes, enforcing `max_length`.
pub(crate) fn read_length_prefixed(
    stream: &mut dyn Read,
    max_length: usize,
    what: &str,
) -> EncodingResult<Option<Vec<u8>>> {
    let len = read_i32(stream)?;
    if len == -1 {
        Ok(None)
    } else if len < -1 {
        error!("{} buf length is a negative number {}", what, len);
        Err(StatusCode::BadDecodingError)
    } else if len as usize > max_length {
        error!(
            "{} buf length {} exceeds decoding limit {}",
            what, len, max_length
        );
        Err(StatusCode::BadDecodingError)
    } else {
        // The limit above bounds the allocation, a truncated stream fails in read_exact
        let mut buf = vec![0u8; len as usize];
        process_decode_io_result(stream.read_exact(&mut buf))?;
        Ok(Some(buf))
    }
}

impl AsRef<[u8]> for ByteString {
    fn as_ref(&self) -> &[u8] {
        self.value.as_deref().unwrap_or(&[])
    }
}

impl BinaryEncoder<ByteString> for ByteString {
    fn byte_len(&self) -> usize {
        4 + self.value.as_ref().map(|v| v.len()).unwrap_or(0)
    }

    fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
        write_length_prefixed(stream, self.value.as_deref())
    }

    fn decode<S: Read>(stream: &mut S, decoding_options: &DecodingOptions) -> EncodingResult<Self> {
        let value = read_length_prefixed(
            stream,
            decoding_options.max_byte_string_length,
            "ByteString",
        )?;
        Ok(ByteString { value })
    }
}

impl<'a, T> From<&'a T> for ByteString
where
    T: AsRef<[u8]> + ?Sized,
{
    fn from(value: &'a T) -> Self {
        Self::from(value.as_ref().to_vec())
    }
}

impl From<Vec<u8>> for ByteString {
    fn from(value: Vec<u8>) -> Self {
        ByteString { value: Some(value) }
    }
}

impl Default for ByteString {
    fn default() -> Self {
        ByteString::null()
    }
}

impl ByteString {
    /// Create a null string (not the same as an empty string)
    pub fn null() -> ByteString {
        ByteString { value: None }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.value, Some(ref v) if v.is_empty())
    }

    pub fn is_null_or_empty(&self) -> bool {
        self.is_null() || self.is_empty()
    }

    /// Creates a byte string of random bytes, used for nonces
    pub fn random(number_of_bytes: usize) -> ByteString {
        let mut bytes = vec![0u8; number_of_bytes];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes[..]);
        ByteString::from(bytes)
    }

    /// Creates a byte string from a Base64 encoded string
    pub fn from_base64(data: &str) -> Option<ByteString> {
        STANDARD.decode(data).ok().map(Self::from)
    }

    /// Encodes the bytestring as a Base64 encoded string
    pub fn as_base64(&self) -> String {
        self.value
            .as_ref()
            .map(|v| STANDARD.encode(v))
            .unwrap_or_default()
    }
}
