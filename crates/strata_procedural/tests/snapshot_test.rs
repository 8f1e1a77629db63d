//! # Snapshot Tests
//!
//! Export a generated world, push it through JSON and import it again.

use strata_procedural::{
    generate_world, ByteEncoding, GenerationParams, World, WorldExport, WorldSeed,
};

fn world() -> World {
    let params = GenerationParams::default()
        .with_size(160, 128)
        .with_chunk_size(32)
        .with_cell_size(16);
    generate_world(WorldSeed::new(2024), params).unwrap()
}

fn assert_same_world(original: &World, restored: &World) {
    assert_eq!(restored.seed(), original.seed());
    assert_eq!(restored.params(), original.params());
    assert_eq!(restored.baked_chunks(), original.baked_chunks());
    for chunk in original.chunks().iter() {
        let copy = restored.chunk(chunk.coord).expect("chunk restored");
        assert_eq!(copy, chunk);
    }
    assert_eq!(restored.regions(), original.regions());
    assert_eq!(restored.zones(), original.zones());
    assert!(restored.is_generated());
}

/// Test: raw snapshots survive a JSON round trip.
#[test]
fn test_raw_snapshot_roundtrip() {
    let original = world();
    let json = original.export().to_json().unwrap();
    assert!(json.contains("\"encoding\":\"raw\""));

    let restored = World::import(WorldExport::from_json(&json).unwrap()).unwrap();
    assert_same_world(&original, &restored);
    assert_eq!(restored.material_at(40, 40).map(|m| &m.name), original.material_at(40, 40).map(|m| &m.name));
}

/// Test: LZ4 snapshots survive a JSON round trip.
#[test]
fn test_lz4_snapshot_roundtrip() {
    let original = world();
    let json = original.export_with(ByteEncoding::Lz4).to_json().unwrap();
    assert!(json.contains("\"encoding\":\"lz4\""));

    let restored = World::import(WorldExport::from_json(&json).unwrap()).unwrap();
    assert_same_world(&original, &restored);
}

/// Test: edited chunk versions are kept.
#[test]
fn test_snapshot_keeps_versions() {
    let mut original = world();
    let coord = original.chunks().iter().next().unwrap().coord;
    original.chunk_mut(coord).unwrap().version = 9;

    let restored = World::import(original.export()).unwrap();
    assert_eq!(restored.chunk(coord).unwrap().version, 9);
}

/// Test: garbage is a decode error, not a panic.
#[test]
fn test_malformed_snapshot_rejected() {
    assert!(WorldExport::from_json("{\"metadata\":{}}").is_err());
    assert!(WorldExport::from_json("not json").is_err());
}
