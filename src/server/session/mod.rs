// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Sessions and the per connection controller that serves their requests.

mod continuation_points;
pub(crate) mod controller;
pub mod instance;
pub mod manager;
#[macro_use]
pub(crate) mod message_handler;
mod services;

#[cfg(test)]
mod tests;

pub use instance::Session;
pub use manager::SessionManager;
