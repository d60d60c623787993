use std::io::Cursor;

use crate::core::comms::{
    message_chunk::MessageChunk,
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
};
use crate::types::{BinaryEncoder, DecodingOptions};

mod chunk;
mod codec;
mod hello;

pub fn symmetric_header(token_id: u32) -> SecurityHeader {
    SecurityHeader::Symmetric(SymmetricSecurityHeader { token_id })
}

pub fn asymmetric_header() -> SecurityHeader {
    SecurityHeader::Asymmetric(AsymmetricSecurityHeader::none())
}

/// Rewrites the sequence header of a chunk in place, returning the old sequence number
pub fn set_chunk_sequence_number(chunk: &mut MessageChunk, sequence_number: u32) -> u32 {
    let mut chunk_info = chunk.chunk_info(&DecodingOptions::test()).unwrap();
    let old_sequence_number = chunk_info.sequence_header.sequence_number;
    chunk_info.sequence_header.sequence_number = sequence_number;
    let mut stream = Cursor::new(&mut chunk.data[..]);
    stream.set_position(chunk_info.sequence_header_offset as u64);
    let _ = chunk_info.sequence_header.encode(&mut stream);
    old_sequence_number
}

/// Rewrites the request id of a chunk in place, returning the old request id
pub fn set_chunk_request_id(chunk: &mut MessageChunk, request_id: u32) -> u32 {
    let mut chunk_info = chunk.chunk_info(&DecodingOptions::test()).unwrap();
    let old_request_id = chunk_info.sequence_header.request_id;
    chunk_info.sequence_header.request_id = request_id;
    let mut stream = Cursor::new(&mut chunk.data[..]);
    stream.set_position(chunk_info.sequence_header_offset as u64);
    let _ = chunk_info.sequence_header.encode(&mut stream);
    old_request_id
}
