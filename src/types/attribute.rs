// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

// Attributes as defined in Part 4, Figure B.7

use std::convert::TryFrom;

/// The attributes a node can have. Which of them a node actually carries depends on its class.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum AttributeId {
    NodeId = 1,
    NodeClass = 2,
    BrowseName = 3,
    DisplayName = 4,
    Description = 5,
    WriteMask = 6,
    UserWriteMask = 7,
    IsAbstract = 8,
    Symmetric = 9,
    InverseName = 10,
    ContainsNoLoops = 11,
    EventNotifier = 12,
    Value = 13,
    DataType = 14,
    ValueRank = 15,
    ArrayDimensions = 16,
    AccessLevel = 17,
    UserAccessLevel = 18,
    MinimumSamplingInterval = 19,
    Historizing = 20,
    Executable = 21,
    UserExecutable = 22,
}

impl TryFrom<u32> for AttributeId {
    type Error = ();

    fn try_from(attribute_id: u32) -> Result<Self, Self::Error> {
        use AttributeId::*;
        const ALL: [AttributeId; 22] = [
            NodeId,
            NodeClass,
            BrowseName,
            DisplayName,
            Description,
            WriteMask,
            UserWriteMask,
            IsAbstract,
            Symmetric,
            InverseName,
            ContainsNoLoops,
            EventNotifier,
            Value,
            DataType,
            ValueRank,
            ArrayDimensions,
            AccessLevel,
            UserAccessLevel,
            MinimumSamplingInterval,
            Historizing,
            Executable,
            UserExecutable,
        ];
        (attribute_id as usize)
            .checked_sub(1)
            .and_then(|idx| ALL.get(idx))
            .copied()
            .ok_or_else(|| {
                debug!("Invalid attribute id {}", attribute_id);
            })
    }
}

bitflags! {
    pub struct AccessLevel: u8 {
        const CURRENT_READ = 1;
        const CURRENT_WRITE = 2;
        const HISTORY_READ = 4;
        const HISTORY_WRITE = 8;
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        AccessLevel::CURRENT_READ
    }
}
