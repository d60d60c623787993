// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Server configuration, loaded from and saved to YAML through the `Config` trait.

mod endpoint;
mod limits;
mod server;

pub use endpoint::ServerEndpoint;
pub use limits::{Limits, OperationalLimits, SubscriptionLimits};
pub use server::{
    ChannelConfig, ServerConfig, ServerUserToken, SessionConfig, SimulationConfig, TcpConfig,
    ANONYMOUS_USER_TOKEN_ID,
};
