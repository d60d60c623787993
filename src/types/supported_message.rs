// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The set of service messages the server can receive or send, as one tagged enum.

use std::io::{Read, Write};

use crate::types::{
    encoding::*, node_ids::ObjectId, request_header::RequestHeader,
    response_header::ResponseHeader, service_types::*, status_code::StatusCode, MessageInfo,
};

// This macro helps avoid tedious repetition as new messages are added

macro_rules! supported_messages {
    (
        requests { $( $req:ident => $req_id:ident, )* }
        responses { $( $resp:ident => $resp_id:ident, )* }
    ) => {
        /// A request or response message, tagged by type.
        #[derive(Debug, PartialEq, Clone)]
        pub enum SupportedMessage {
            /// An invalid request / response of some form
            Invalid(ObjectId),
            $( $req(Box<$req>), )*
            $( $resp(Box<$resp>), )*
        }

        $(
            impl From<$req> for SupportedMessage {
                fn from(value: $req) -> Self {
                    SupportedMessage::$req(Box::new(value))
                }
            }
        )*

        $(
            impl From<$resp> for SupportedMessage {
                fn from(value: $resp) -> Self {
                    SupportedMessage::$resp(Box::new(value))
                }
            }
        )*

        impl BinaryEncoder<SupportedMessage> for SupportedMessage {
            fn byte_len(&self) -> usize {
                match self {
                    SupportedMessage::Invalid(_) => 0,
                    $( SupportedMessage::$req(value) => value.byte_len(), )*
                    $( SupportedMessage::$resp(value) => value.byte_len(), )*
                }
            }

            fn encode<S: Write>(&self, stream: &mut S) -> EncodingResult<usize> {
                match self {
                    SupportedMessage::Invalid(object_id) => {
                        error!("Cannot encode an invalid message {:?}", object_id);
                        Err(StatusCode::BadEncodingError)
                    }
                    $( SupportedMessage::$req(value) => value.encode(stream), )*
                    $( SupportedMessage::$resp(value) => value.encode(stream), )*
                }
            }

            fn decode<S: Read>(_: &mut S, _: &DecodingOptions) -> EncodingResult<Self> {
                // The message type is not part of the encoding, use decode_by_object_id
                error!("Cannot decode a stream to a supported message type");
                Err(StatusCode::BadDecodingError)
            }
        }

        impl SupportedMessage {
            /// Decodes a message whose type was identified by the object id preceding it
            pub fn decode_by_object_id<S: Read>(
                stream: &mut S,
                object_id: ObjectId,
                decoding_options: &DecodingOptions,
            ) -> EncodingResult<Self> {
                trace!("decoding object_id {:?}", object_id);
                let decoded_message = match object_id {
                    $(
                        ObjectId::$req_id => $req::decode(stream, decoding_options)?.into(),
                    )*
                    $(
                        ObjectId::$resp_id => $resp::decode(stream, decoding_options)?.into(),
                    )*
                    _ => {
                        debug!("decoding unsupported for object id {:?}", object_id);
                        SupportedMessage::Invalid(object_id)
                    }
                };
                Ok(decoded_message)
            }

            /// The binary encoding id of the message
            pub fn type_id(&self) -> ObjectId {
                match self {
                    SupportedMessage::Invalid(object_id) => *object_id,
                    $( SupportedMessage::$req(value) => value.object_id(), )*
                    $( SupportedMessage::$resp(value) => value.object_id(), )*
                }
            }

            pub fn is_request(&self) -> bool {
                self.request_header().is_some()
            }

            pub fn request_header(&self) -> Option<&RequestHeader> {
                match self {
                    $( SupportedMessage::$req(value) => Some(&value.request_header), )*
                    _ => None,
                }
            }

            pub fn response_header(&self) -> Option<&ResponseHeader> {
                match self {
                    $( SupportedMessage::$resp(value) => Some(&value.response_header), )*
                    _ => None,
                }
            }

            /// The request handle of the request, or the one a response echoes back
            pub fn request_handle(&self) -> u32 {
                if let Some(request_header) = self.request_header() {
                    request_header.request_handle
                } else if let Some(response_header) = self.response_header() {
                    response_header.request_handle
                } else {
                    0
                }
            }
        }
    };
}

supported_messages! {
    requests {
        OpenSecureChannelRequest => OpenSecureChannelRequest_Encoding_DefaultBinary,
        CloseSecureChannelRequest => CloseSecureChannelRequest_Encoding_DefaultBinary,
        GetEndpointsRequest => GetEndpointsRequest_Encoding_DefaultBinary,
        FindServersRequest => FindServersRequest_Encoding_DefaultBinary,
        CreateSessionRequest => CreateSessionRequest_Encoding_DefaultBinary,
        ActivateSessionRequest => ActivateSessionRequest_Encoding_DefaultBinary,
        CloseSessionRequest => CloseSessionRequest_Encoding_DefaultBinary,
        ReadRequest => ReadRequest_Encoding_DefaultBinary,
        WriteRequest => WriteRequest_Encoding_DefaultBinary,
        BrowseRequest => BrowseRequest_Encoding_DefaultBinary,
        BrowseNextRequest => BrowseNextRequest_Encoding_DefaultBinary,
        TranslateBrowsePathsToNodeIdsRequest => TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary,
        CallRequest => CallRequest_Encoding_DefaultBinary,
        CreateSubscriptionRequest => CreateSubscriptionRequest_Encoding_DefaultBinary,
        ModifySubscriptionRequest => ModifySubscriptionRequest_Encoding_DefaultBinary,
        SetPublishingModeRequest => SetPublishingModeRequest_Encoding_DefaultBinary,
        DeleteSubscriptionsRequest => DeleteSubscriptionsRequest_Encoding_DefaultBinary,
        TransferSubscriptionsRequest => TransferSubscriptionsRequest_Encoding_DefaultBinary,
        PublishRequest => PublishRequest_Encoding_DefaultBinary,
        RepublishRequest => RepublishRequest_Encoding_DefaultBinary,
        CreateMonitoredItemsRequest => CreateMonitoredItemsRequest_Encoding_DefaultBinary,
        ModifyMonitoredItemsRequest => ModifyMonitoredItemsRequest_Encoding_DefaultBinary,
        SetMonitoringModeRequest => SetMonitoringModeRequest_Encoding_DefaultBinary,
        DeleteMonitoredItemsRequest => DeleteMonitoredItemsRequest_Encoding_DefaultBinary,
    }
    responses {
        ServiceFault => ServiceFault_Encoding_DefaultBinary,
        OpenSecureChannelResponse => OpenSecureChannelResponse_Encoding_DefaultBinary,
        CloseSecureChannelResponse => CloseSecureChannelResponse_Encoding_DefaultBinary,
        GetEndpointsResponse => GetEndpointsResponse_Encoding_DefaultBinary,
        FindServersResponse => FindServersResponse_Encoding_DefaultBinary,
        CreateSessionResponse => CreateSessionResponse_Encoding_DefaultBinary,
        ActivateSessionResponse => ActivateSessionResponse_Encoding_DefaultBinary,
        CloseSessionResponse => CloseSessionResponse_Encoding_DefaultBinary,
        ReadResponse => ReadResponse_Encoding_DefaultBinary,
        WriteResponse => WriteResponse_Encoding_DefaultBinary,
        BrowseResponse => BrowseResponse_Encoding_DefaultBinary,
        BrowseNextResponse => BrowseNextResponse_Encoding_DefaultBinary,
        TranslateBrowsePathsToNodeIdsResponse => TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary,
        CallResponse => CallResponse_Encoding_DefaultBinary,
        CreateSubscriptionResponse => CreateSubscriptionResponse_Encoding_DefaultBinary,
        ModifySubscriptionResponse => ModifySubscriptionResponse_Encoding_DefaultBinary,
        SetPublishingModeResponse => SetPublishingModeResponse_Encoding_DefaultBinary,
        DeleteSubscriptionsResponse => DeleteSubscriptionsResponse_Encoding_DefaultBinary,
        TransferSubscriptionsResponse => TransferSubscriptionsResponse_Encoding_DefaultBinary,
        PublishResponse => PublishResponse_Encoding_DefaultBinary,
        RepublishResponse => RepublishResponse_Encoding_DefaultBinary,
        CreateMonitoredItemsResponse => CreateMonitoredItemsResponse_Encoding_DefaultBinary,
        ModifyMonitoredItemsResponse => ModifyMonitoredItemsResponse_Encoding_DefaultBinary,
        SetMonitoringModeResponse => SetMonitoringModeResponse_Encoding_DefaultBinary,
        DeleteMonitoredItemsResponse => DeleteMonitoredItemsResponse_Encoding_DefaultBinary,
    }
}
