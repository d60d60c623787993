// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides a browse continuation point type for tracking a browse operation initiated by a client.

use std::collections::VecDeque;

use crate::{
    server::address_space::AddressSpace,
    types::{service_types::ReferenceDescription, ByteString, DateTimeUtc},
};

/// The references of a browse that did not fit in the response, to be handed out by BrowseNext.
#[derive(Debug, Clone)]
pub struct BrowseContinuationPoint {
    pub id: ByteString,
    pub address_space_last_modified: DateTimeUtc,
    pub max_references_per_node: usize,
    pub remaining: VecDeque<ReferenceDescription>,
}

impl BrowseContinuationPoint {
    pub fn new(
        address_space: &AddressSpace,
        max_references_per_node: usize,
        remaining: VecDeque<ReferenceDescription>,
    ) -> Self {
        Self {
            id: ByteString::random(6),
            address_space_last_modified: address_space.last_modified(),
            max_references_per_node,
            remaining,
        }
    }

    /// Test if the continuation point valid which is only true if address space has not been
    /// modified since the point was made.
    pub fn is_valid_browse_continuation_point(&self, address_space: &AddressSpace) -> bool {
        self.address_space_last_modified >= address_space.last_modified()
    }

    /// Takes the next page of references. True when nothing remains afterwards.
    pub fn next_page(&mut self) -> (Vec<ReferenceDescription>, bool) {
        let count = self.max_references_per_node.min(self.remaining.len());
        let page = self.remaining.drain(..count).collect();
        (page, self.remaining.is_empty())
    }
}
