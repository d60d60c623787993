// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Well known numeric node ids in namespace 0 that the server uses.

use std::convert::TryFrom;

use crate::types::node_id::NodeId;

macro_rules! node_id_enum {
    ( $(#[$meta:meta])* $name:ident { $( $variant:ident = $value:literal, )* } ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
        pub enum $name {
            $( $variant = $value, )*
        }

        impl TryFrom<u32> for $name {
            type Error = ();

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok($name::$variant), )*
                    _ => Err(()),
                }
            }
        }

        impl From<$name> for NodeId {
            fn from(r: $name) -> Self {
                NodeId::new(0, r as u32)
            }
        }

        impl<'a> From<&'a $name> for NodeId {
            fn from(r: &'a $name) -> Self {
                NodeId::new(0, *r as u32)
            }
        }

        impl PartialEq<$name> for NodeId {
            fn eq(&self, other: &$name) -> bool {
                self.namespace == 0 && self.as_u32() == Some(*other as u32)
            }
        }
    };
}

node_id_enum! {
    /// Objects and the binary encoding ids of the structures the codec understands
    ObjectId {
        RootFolder = 84,
        ObjectsFolder = 85,
        TypesFolder = 86,
        ViewsFolder = 87,
        ObjectTypesFolder = 88,
        VariableTypesFolder = 89,
        DataTypesFolder = 90,
        ReferenceTypesFolder = 91,
        Server = 2253,
        ModellingRule_Mandatory = 78,
        Argument_Encoding_DefaultBinary = 298,
        AnonymousIdentityToken_Encoding_DefaultBinary = 321,
        BuildInfo_Encoding_DefaultBinary = 340,
        UserNameIdentityToken_Encoding_DefaultBinary = 324,
        ServiceFault_Encoding_DefaultBinary = 397,
        FindServersRequest_Encoding_DefaultBinary = 422,
        FindServersResponse_Encoding_DefaultBinary = 425,
        GetEndpointsRequest_Encoding_DefaultBinary = 428,
        GetEndpointsResponse_Encoding_DefaultBinary = 431,
        OpenSecureChannelRequest_Encoding_DefaultBinary = 446,
        OpenSecureChannelResponse_Encoding_DefaultBinary = 449,
        CloseSecureChannelRequest_Encoding_DefaultBinary = 452,
        CloseSecureChannelResponse_Encoding_DefaultBinary = 455,
        CreateSessionRequest_Encoding_DefaultBinary = 461,
        CreateSessionResponse_Encoding_DefaultBinary = 464,
        ActivateSessionRequest_Encoding_DefaultBinary = 467,
        ActivateSessionResponse_Encoding_DefaultBinary = 470,
        CloseSessionRequest_Encoding_DefaultBinary = 473,
        CloseSessionResponse_Encoding_DefaultBinary = 476,
        BrowseRequest_Encoding_DefaultBinary = 527,
        BrowseResponse_Encoding_DefaultBinary = 530,
        BrowseNextRequest_Encoding_DefaultBinary = 533,
        BrowseNextResponse_Encoding_DefaultBinary = 536,
        TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary = 554,
        TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary = 557,
        ReadRequest_Encoding_DefaultBinary = 631,
        ReadResponse_Encoding_DefaultBinary = 634,
        WriteRequest_Encoding_DefaultBinary = 673,
        WriteResponse_Encoding_DefaultBinary = 676,
        CallRequest_Encoding_DefaultBinary = 712,
        CallResponse_Encoding_DefaultBinary = 715,
        DataChangeFilter_Encoding_DefaultBinary = 724,
        CreateMonitoredItemsRequest_Encoding_DefaultBinary = 751,
        CreateMonitoredItemsResponse_Encoding_DefaultBinary = 754,
        ModifyMonitoredItemsRequest_Encoding_DefaultBinary = 763,
        ModifyMonitoredItemsResponse_Encoding_DefaultBinary = 766,
        SetMonitoringModeRequest_Encoding_DefaultBinary = 769,
        SetMonitoringModeResponse_Encoding_DefaultBinary = 772,
        DeleteMonitoredItemsRequest_Encoding_DefaultBinary = 781,
        DeleteMonitoredItemsResponse_Encoding_DefaultBinary = 784,
        CreateSubscriptionRequest_Encoding_DefaultBinary = 787,
        CreateSubscriptionResponse_Encoding_DefaultBinary = 790,
        ModifySubscriptionRequest_Encoding_DefaultBinary = 793,
        ModifySubscriptionResponse_Encoding_DefaultBinary = 796,
        SetPublishingModeRequest_Encoding_DefaultBinary = 799,
        SetPublishingModeResponse_Encoding_DefaultBinary = 802,
        DataChangeNotification_Encoding_DefaultBinary = 811,
        StatusChangeNotification_Encoding_DefaultBinary = 820,
        PublishRequest_Encoding_DefaultBinary = 826,
        PublishResponse_Encoding_DefaultBinary = 829,
        RepublishRequest_Encoding_DefaultBinary = 832,
        RepublishResponse_Encoding_DefaultBinary = 835,
        TransferSubscriptionsRequest_Encoding_DefaultBinary = 841,
        TransferSubscriptionsResponse_Encoding_DefaultBinary = 844,
        DeleteSubscriptionsRequest_Encoding_DefaultBinary = 847,
        DeleteSubscriptionsResponse_Encoding_DefaultBinary = 850,
        ServerStatusDataType_Encoding_DefaultBinary = 864,
    }
}

node_id_enum! {
    ObjectTypeId {
        BaseObjectType = 58,
        FolderType = 61,
        ServerType = 2004,
    }
}

node_id_enum! {
    VariableTypeId {
        BaseVariableType = 62,
        BaseDataVariableType = 63,
        PropertyType = 68,
        ServerStatusType = 2138,
    }
}

node_id_enum! {
    ReferenceTypeId {
        References = 31,
        NonHierarchicalReferences = 32,
        HierarchicalReferences = 33,
        HasChild = 34,
        Organizes = 35,
        HasEventSource = 36,
        HasModellingRule = 37,
        HasEncoding = 38,
        HasDescription = 39,
        HasTypeDefinition = 40,
        GeneratesEvent = 41,
        Aggregates = 44,
        HasSubtype = 45,
        HasProperty = 46,
        HasComponent = 47,
        HasNotifier = 48,
    }
}

node_id_enum! {
    DataTypeId {
        Boolean = 1,
        SByte = 2,
        Byte = 3,
        Int16 = 4,
        UInt16 = 5,
        Int32 = 6,
        UInt32 = 7,
        Int64 = 8,
        UInt64 = 9,
        Float = 10,
        Double = 11,
        String = 12,
        DateTime = 13,
        Guid = 14,
        ByteString = 15,
        XmlElement = 16,
        NodeId = 17,
        ExpandedNodeId = 18,
        StatusCode = 19,
        QualifiedName = 20,
        LocalizedText = 21,
        Structure = 22,
        DataValue = 23,
        BaseDataType = 24,
        DiagnosticInfo = 25,
        Number = 26,
        Integer = 27,
        UInteger = 28,
        Enumeration = 29,
        ServerState = 852,
        ServerStatusDataType = 862,
    }
}

node_id_enum! {
    VariableId {
        Server_ServerArray = 2254,
        Server_NamespaceArray = 2255,
        Server_ServerStatus = 2256,
        Server_ServerStatus_StartTime = 2257,
        Server_ServerStatus_CurrentTime = 2258,
        Server_ServerStatus_State = 2259,
        Server_GetMonitoredItems_InputArguments = 11493,
        Server_GetMonitoredItems_OutputArguments = 11494,
    }
}

node_id_enum! {
    MethodId {
        Server_GetMonitoredItems = 11492,
    }
}
