use std::str::FromStr;

use crate::types::*;

#[test]
fn parse_invalid_node_id() {
    [
        "",
        "ns=2",
        "i= 0",
        "ns=2;i=0 ",
        "ns=99 ;i=35",
        "ns=99;i=x",
        "ns=99;s=",
        "ns=;s=valid str",
        "ns=65537;s=valid str",
        "x=12",
        "水",
    ]
    .iter()
    .for_each(|s| {
        assert!(NodeId::from_str(s).is_err(), "{} should not parse", s);
    });
}

#[test]
fn parse_node_id_numeric_and_string() {
    let node_id = NodeId::from_str("i=2253").unwrap();
    assert_eq!(node_id, ObjectId::Server);
    assert_eq!(node_id.to_string(), "i=2253");

    let node_id = NodeId::from_str("ns=2;s=VBL_Digital_Factory/Line 1/Temperature").unwrap();
    assert_eq!(node_id.namespace, 2);
    assert_eq!(
        node_id.identifier,
        Identifier::String(UAString::from("VBL_Digital_Factory/Line 1/Temperature"))
    );
    // Semi colons in the identifier survive
    let node_id = NodeId::from_str("ns=1;s=a;b").unwrap();
    assert_eq!(node_id, NodeId::new(1, "a;b"));
}

#[test]
fn parse_node_id_guid_and_byte_string() {
    let node_id = NodeId::from_str("g=72962B91-FA75-4ae6-8D28-B404DC7DAF63").unwrap();
    assert_eq!(
        node_id.to_string(),
        "g=72962b91-fa75-4ae6-8d28-b404dc7daf63"
    );

    let node_id = NodeId::from_str("ns=1;b=M/RbKBsRVkePCePcx24oRA==").unwrap();
    assert_eq!(node_id.namespace, 1);
    assert_eq!(node_id.to_string(), "ns=1;b=M/RbKBsRVkePCePcx24oRA==");
}

#[test]
fn node_id_helpers() {
    assert!(NodeId::null().is_null());
    assert!(!NodeId::new(1, 0u32).is_null());
    assert_eq!(
        NodeId::from(ObjectId::ObjectsFolder).as_object_id(),
        Ok(ObjectId::ObjectsFolder)
    );
    assert_eq!(
        NodeId::from(ReferenceTypeId::Organizes).as_reference_type_id(),
        Ok(ReferenceTypeId::Organizes)
    );
    assert!(NodeId::new(2, 35u32).as_reference_type_id().is_err());
}

#[test]
fn expanded_node_id() {
    [
        "",
        " ns=1;s=Hello World",
        "svr=33;nsu=http://foo;i=10 ",
        "svr=;nsu=foo;s=Hello World",
        "svr=5;nsu=;s=Hello World",
        "svr=5;ns=;s=Hello World",
        "svr=5;ns=5;",
        "nsu=foo;s=Hello World",
        "svr=5;nsu=foo;ns=5;s=Hello World",
    ]
    .iter()
    .for_each(|s| {
        assert!(
            ExpandedNodeId::from_str(s).is_err(),
            "{} is supposed to be invalid expanded node id",
            s
        );
    });

    // Escaped uri characters
    let node_id = ExpandedNodeId::from_str("svr=5;nsu=foo%3b%25;i=22").unwrap();
    assert_eq!(node_id.server_index, 5);
    assert_eq!(node_id.namespace_uri.as_ref(), "foo;%");
    assert_eq!(node_id.node_id, NodeId::new(0, 22u32));
    assert_eq!(node_id.to_string(), "svr=5;nsu=foo%3b%25;i=22");

    let node_id = ExpandedNodeId {
        node_id: NodeId::new(1, "Hello World"),
        namespace_uri: UAString::null(),
        server_index: 33,
    };
    assert_eq!(node_id.to_string(), "svr=33;ns=1;s=Hello World");
    assert_eq!(
        ExpandedNodeId::from_str("svr=33;ns=1;s=Hello World").unwrap(),
        node_id
    );
}

#[test]
fn qualified_name_display() {
    assert_eq!(QualifiedName::new(2, "Line1").to_string(), "2:Line1");
    assert_eq!(QualifiedName::from("Server").to_string(), "Server");
}
