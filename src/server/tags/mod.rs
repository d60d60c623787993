// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Factory tags: the manifest that describes them, the feed that updates their values and a
//! simulator that drives the feed with random values.

pub mod feed;
pub mod manifest;
pub mod simulator;

#[cfg(test)]
mod tests;

pub use feed::{TagFeed, TagUpdate};
pub use manifest::{TagDataType, TagManifest, TagVariable};
pub use simulator::TagSimulator;
