// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! One function per service. Each takes the typed request with its session context and
//! returns the response, or a fault, to send back on the channel.

mod attribute;
mod method;
mod monitored_items;
mod subscriptions;
mod view;

pub(super) use self::{
    attribute::{read, write},
    method::call,
    monitored_items::{
        create_monitored_items, delete_monitored_items, modify_monitored_items,
        set_monitoring_mode,
    },
    subscriptions::{
        create_subscription, delete_subscriptions, modify_subscription, republish,
        set_publishing_mode, transfer_subscriptions,
    },
    view::{browse, browse_next, translate_browse_paths},
};
