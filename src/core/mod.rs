// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Functionality shared by every layer of the server that is not a data type: message framing
//! and chunking, configuration persistence and id generation.

/// Extracts the payload of a `SupportedMessage` variant, panicking when the message is of
/// another type. Tests only use this.
#[macro_export]
macro_rules! supported_message_as {
    ($v: expr, $i: ident) => {
        if let $crate::types::SupportedMessage::$i(value) = $v {
            *value
        } else {
            panic!("Cannot convert to {:?}", stringify!($i));
        }
    };
}

/// Contains debugging utility helper functions
pub mod debug {
    /// Prints out the content of a slice in hex and visible char format to aid debugging.
    /// Output goes to the `hex` target at trace level.
    pub fn log_buffer(message: &str, buf: &[u8]) {
        if !log_enabled!(target: "hex", log::Level::Trace) {
            return;
        }

        let line_len = 32;
        trace!(target: "hex", "{}", message);

        for (line, bytes) in buf.chunks(line_len).enumerate() {
            let hex_line = bytes
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            let char_line = bytes
                .iter()
                .map(|b| {
                    if (32..=126).contains(b) {
                        *b as char
                    } else {
                        '.'
                    }
                })
                .collect::<String>();
            trace!(
                target: "hex",
                "{:08x}: {:width$} {}",
                line * line_len,
                hex_line,
                char_line,
                width = line_len * 3 - 1
            );
        }
    }
}

#[cfg(test)]
mod tests;

pub mod constants {
    /// The well known OPC UA port number, implied by opc.tcp:// urls that carry no port.
    pub const DEFAULT_OPC_UA_SERVER_PORT: u16 = 4840;
    /// The protocol version of the binary protocol spoken by this implementation
    pub const PROTOCOL_VERSION: u32 = 0;
}

pub mod comms;
pub mod config;
pub mod handle;

/// Contains most of the things that are typically required from the server.
pub mod prelude {
    pub use super::{comms::prelude::*, config::Config, handle::*};
    pub use crate::types::{status_code::StatusCode, *};
}
