use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    server::address_space::AddressSpace,
    types::{
        service_types::BrowseDirection, BrowseDescription, NodeId, StatusCode, Variant,
    },
};

use super::{
    feed::{TagFeed, TagUpdate},
    manifest::{TagDataType, TagManifest, TagVariable},
    simulator::simulated_value,
};

const MANIFEST: &str = r#"{
    "name": "VBL_Digital_Factory",
    "tagType": "Folder",
    "tags": [
        {
            "name": "Blow_Molding",
            "tagType": "Folder",
            "tags": [
                { "name": "Preform_Temperature", "tagType": "AtomicTag", "dataType": "Float8", "value": 95.5 },
                { "name": "Bottles_Produced", "tagType": "AtomicTag", "dataType": "Int4", "defaultValue": 12 },
                { "name": "Machine_Status", "tagType": "AtomicTag", "dataType": "String", "value": "Idle" },
                { "name": "Preform_Temperature", "tagType": "AtomicTag", "dataType": "Float8", "value": 1.0 }
            ]
        },
        {
            "name": "Filler",
            "tagType": "UdtInstance",
            "tags": [
                { "name": "Running", "tagType": "AtomicTag", "dataType": "Boolean", "value": true },
                { "name": "Fill_Pressure", "tagType": "AtomicTag", "dataType": "Float4" },
                { "name": "OEE", "tagType": "AtomicTag" }
            ]
        }
    ]
}"#;

fn load() -> (AddressSpace, Vec<TagVariable>) {
    let address_space = AddressSpace::new();
    let manifest = TagManifest::from_json(MANIFEST).unwrap();
    let variables = manifest.populate(&address_space, 2).unwrap();
    (address_space, variables)
}

fn value_of(address_space: &AddressSpace, path: &str) -> Variant {
    address_space
        .get_variable_value(NodeId::new(2, path))
        .unwrap()
        .value
        .unwrap()
}

#[test]
fn manifest_creates_folders_and_variables() {
    let (address_space, variables) = load();
    // The duplicate is skipped
    assert_eq!(variables.len(), 6);

    assert!(address_space.node_exists(&NodeId::new(2, "VBL_Digital_Factory")));
    assert!(address_space.node_exists(&NodeId::new(2, "VBL_Digital_Factory/Blow_Molding")));
    assert!(address_space.node_exists(&NodeId::new(2, "VBL_Digital_Factory/Filler")));

    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Blow_Molding/Preform_Temperature"),
        Variant::Double(95.5)
    );
    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Blow_Molding/Bottles_Produced"),
        Variant::Int32(12)
    );
    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Blow_Molding/Machine_Status"),
        Variant::from("Idle")
    );
    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Filler/Running"),
        Variant::Boolean(true)
    );
    // No value gives the default of the type, no data type means Float8
    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Filler/Fill_Pressure"),
        Variant::Float(0.0)
    );
    assert_eq!(
        value_of(&address_space, "VBL_Digital_Factory/Filler/OEE"),
        Variant::Double(0.0)
    );
}

#[test]
fn manifest_root_is_organized_by_objects() {
    let (address_space, _) = load();
    let references = address_space
        .browse(
            &BrowseDescription {
                node_id: address_space.objects_folder_id(),
                browse_direction: BrowseDirection::Forward,
                reference_type_id: NodeId::null(),
                include_subtypes: true,
                node_class_mask: 0,
                result_mask: 0x3f,
            },
            1000,
        )
        .unwrap();
    assert!(references
        .iter()
        .any(|r| r.node_id.node_id == NodeId::new(2, "VBL_Digital_Factory")));
}

#[test]
fn manifest_data_types() {
    assert_eq!(TagDataType::from_manifest(Some("Float8")), TagDataType::Double);
    assert_eq!(TagDataType::from_manifest(Some("Float4")), TagDataType::Float);
    assert_eq!(TagDataType::from_manifest(Some("Int4")), TagDataType::Int32);
    assert_eq!(TagDataType::from_manifest(Some("Boolean")), TagDataType::Boolean);
    assert_eq!(TagDataType::from_manifest(Some("DateTime")), TagDataType::String);
    assert_eq!(TagDataType::from_manifest(None), TagDataType::Double);
}

#[test]
fn manifest_rejects_bad_json() {
    assert!(TagManifest::from_json("{ \"name\": ").is_err());
}

#[test]
fn manifest_loads_from_file() {
    let dir = tempdir::TempDir::new("tags").unwrap();
    let path = dir.path().join("tags.json");
    std::fs::write(&path, MANIFEST).unwrap();
    let manifest = TagManifest::load(&path).unwrap();
    assert_eq!(manifest.name, "VBL_Digital_Factory");
    assert_eq!(manifest.tags.len(), 2);
    assert!(TagManifest::load(&dir.path().join("missing.json")).is_err());
}

#[test]
fn feed_applies_updates() {
    let (address_space, _) = load();
    let address_space = Arc::new(address_space);
    let (feed, _sender) = TagFeed::new(address_space.clone());
    let node_id = NodeId::new(2, "VBL_Digital_Factory/Blow_Molding/Preform_Temperature");

    feed.apply(TagUpdate::new(node_id.clone(), 101.25)).unwrap();
    let value = address_space.get_variable_value(node_id.clone()).unwrap();
    assert_eq!(value.value, Some(Variant::Double(101.25)));
    assert!(value.source_timestamp.is_some());

    assert_eq!(
        feed.apply(TagUpdate::new(NodeId::new(2, "nope"), 1.0)),
        Err(StatusCode::BadNodeIdUnknown)
    );
}

#[tokio::test]
async fn feed_runs_until_senders_drop() {
    let (address_space, _) = load();
    let address_space = Arc::new(address_space);
    let (feed, sender) = TagFeed::new(address_space.clone());
    let node_id = NodeId::new(2, "VBL_Digital_Factory/Blow_Molding/Machine_Status");
    sender
        .send(TagUpdate::new(node_id.clone(), "Running"))
        .await
        .unwrap();
    drop(sender);
    feed.run(tokio_util::sync::CancellationToken::new()).await;
    assert_eq!(
        address_space.get_variable_value(node_id).unwrap().value,
        Some(Variant::from("Running"))
    );
}

fn variable(name: &str, data_type: TagDataType) -> TagVariable {
    TagVariable {
        node_id: NodeId::new(2, name),
        name: name.to_string(),
        data_type,
    }
}

fn as_f64(value: Option<Variant>) -> f64 {
    match value {
        Some(Variant::Double(v)) => v,
        Some(Variant::Float(v)) => v as f64,
        Some(Variant::Int32(v)) => v as f64,
        other => panic!("Unexpected value {:?}", other),
    }
}

#[test]
fn simulator_value_ranges() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let v = as_f64(simulated_value(&mut rng, &variable("Preform_Temperature", TagDataType::Double)));
        assert!((80.0..=120.0).contains(&v));
        let v = as_f64(simulated_value(&mut rng, &variable("Blow_Pressure", TagDataType::Float)));
        assert!((25.0..=40.0).contains(&v));
        let v = as_f64(simulated_value(&mut rng, &variable("Reject_Count", TagDataType::Int32)));
        assert!((0.0..=10.0).contains(&v));
        let v = as_f64(simulated_value(&mut rng, &variable("Energy_Per_Bottle", TagDataType::Double)));
        assert!((0.01..=0.05).contains(&v));
        let v = as_f64(simulated_value(&mut rng, &variable("Bottles_Produced", TagDataType::Double)));
        assert!((1000.0..=50000.0).contains(&v));
        let v = as_f64(simulated_value(&mut rng, &variable("Spare", TagDataType::Int32)));
        assert!((0.0..=1000.0).contains(&v));
    }
}

#[test]
fn simulator_values_match_tag_type() {
    let mut rng = StdRng::seed_from_u64(11);
    match simulated_value(&mut rng, &variable("Filler_Status", TagDataType::String)) {
        Some(Variant::String(s)) => {
            let s: &str = s.as_ref();
            assert!(["Running", "Idle", "Stopped"].contains(&s));
        }
        other => panic!("Unexpected value {:?}", other),
    }
    assert!(matches!(
        simulated_value(&mut rng, &variable("Running", TagDataType::Boolean)),
        Some(Variant::Boolean(_))
    ));
    // A count kept as a Float8 tag stays a double
    assert!(matches!(
        simulated_value(&mut rng, &variable("Defect_Count", TagDataType::Double)),
        Some(Variant::Double(_))
    ));
    // A status text cannot be a number
    assert_eq!(
        simulated_value(&mut rng, &variable("Line_Status", TagDataType::Double)),
        None
    );
}
