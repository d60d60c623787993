// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! `NotificationMessage` and the notifications it carries inside extension objects.

use crate::types::{
    data_value::DataValue, date_time::DateTime, diagnostic_info::DiagnosticInfo,
    encoding::DecodingOptions, extension_object::ExtensionObject, node_ids::ObjectId,
    status_code::StatusCode,
};

ua_struct! {
    pub struct NotificationMessage {
        pub sequence_number: u32,
        pub publish_time: DateTime,
        pub notification_data: Option<Vec<ExtensionObject>>,
    }
}

ua_struct! {
    pub struct MonitoredItemNotification {
        pub client_handle: u32,
        pub value: DataValue,
    }
}

ua_struct! {
    pub struct DataChangeNotification [DataChangeNotification_Encoding_DefaultBinary] {
        pub monitored_items: Option<Vec<MonitoredItemNotification>>,
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}

ua_struct! {
    pub struct StatusChangeNotification [StatusChangeNotification_Encoding_DefaultBinary] {
        pub status: StatusCode,
        pub diagnostic_info: DiagnosticInfo,
    }
}

impl NotificationMessage {
    /// Create a notification message which contains data changes
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTime,
        data_change_notifications: Vec<MonitoredItemNotification>,
    ) -> NotificationMessage {
        let data_change_notification = DataChangeNotification {
            monitored_items: Some(data_change_notifications),
            diagnostic_infos: None,
        };
        trace!("data change notification = {:?}", data_change_notification);
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![ExtensionObject::from_message(
                &data_change_notification,
            )]),
        }
    }

    /// Create a status change notification message
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTime,
        status: StatusCode,
    ) -> NotificationMessage {
        let status_change_notification = StatusChangeNotification {
            status,
            diagnostic_info: DiagnosticInfo::null(),
        };
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Some(vec![ExtensionObject::from_message(
                &status_change_notification,
            )]),
        }
    }

    /// Create a keep-alive notification message
    pub fn keep_alive(sequence_number: u32, publish_time: DateTime) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: None,
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.notification_data
            .as_ref()
            .map_or(true, |notification_data| notification_data.is_empty())
    }

    /// Extracts the data change notifications from the message. Anything unrecognized or
    /// unparseable is skipped.
    pub fn data_changes(&self, decoding_options: &DecodingOptions) -> Vec<DataChangeNotification> {
        self.extract(
            ObjectId::DataChangeNotification_Encoding_DefaultBinary,
            decoding_options,
        )
    }

    /// Extracts the status change notifications from the message.
    pub fn status_changes(
        &self,
        decoding_options: &DecodingOptions,
    ) -> Vec<StatusChangeNotification> {
        self.extract(
            ObjectId::StatusChangeNotification_Encoding_DefaultBinary,
            decoding_options,
        )
    }

    fn extract<T>(&self, object_id: ObjectId, decoding_options: &DecodingOptions) -> Vec<T>
    where
        T: crate::types::BinaryEncoder<T>,
    {
        self.notification_data
            .iter()
            .flatten()
            .filter(|n| n.node_id == object_id)
            .filter_map(|n| match n.decode_inner::<T>(decoding_options) {
                Ok(v) => Some(v),
                Err(err) => {
                    debug!("Ignoring a notification of type {:?}, {}", n.node_id, err);
                    None
                }
            })
            .collect()
    }
}
