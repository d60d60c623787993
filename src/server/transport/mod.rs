// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server side of the OPC UA TCP transport. A transport frames the bytes of one connection
//! into HEL and chunk messages, assembles chunks into requests and drains queued responses.

mod tcp;

pub(crate) use tcp::{Request, TcpTransport, TransportConfig, TransportPollResult};
