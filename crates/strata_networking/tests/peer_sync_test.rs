//! # Peer Sync Tests
//!
//! Two peers regenerate the same world from seed + params and exchange
//! edits as JSON.

use strata_networking::{handle_raw_message, ChunkEditor, EditorConfig, SyncOutcome};
use strata_procedural::{
    generate_world, ChunkCoord, GenerationParams, GenerationStep, PixelField, World, WorldSeed,
};

fn params() -> GenerationParams {
    GenerationParams::default()
        .with_size(128, 96)
        .with_cell_size(16)
        .with_chunk_size(32)
}

fn peers() -> (World, World) {
    let a = generate_world(WorldSeed::new(31), params()).unwrap();
    let b = generate_world(WorldSeed::new(31), params()).unwrap();
    (a, b)
}

fn assert_chunks_equal(a: &World, b: &World) {
    for chunk in a.chunks().iter() {
        assert_eq!(b.chunk(chunk.coord), Some(chunk), "chunk {:?} diverged", chunk.coord);
    }
}

/// Test: a patch edit made on one peer reproduces on the other.
#[test]
fn test_patch_edit_replicates() {
    let (mut a, mut b) = peers();
    let mut editor = ChunkEditor::new(1, 7);

    for (x, y) in [(10, 10), (70, 50), (12, 11)] {
        let message = editor.request_edit_at(&mut a, x, y).unwrap();
        let outcome = handle_raw_message(&mut b, &message.to_json().unwrap());
        assert!(matches!(outcome, SyncOutcome::Patched { .. }), "{outcome:?}");
    }

    assert_eq!(a.chunk(ChunkCoord::new(0, 0)).unwrap().version, 2);
    assert_chunks_equal(&a, &b);
}

/// Test: a full chunk edit reproduces on the other peer.
#[test]
fn test_full_chunk_edit_replicates() {
    let (mut a, mut b) = peers();
    let config = EditorConfig { full_chunk_ratio: 0.0, ..EditorConfig::default() };
    let mut editor = ChunkEditor::with_config(1, 7, config);

    let message = editor.request_edit_at(&mut a, 100, 80).unwrap();
    let outcome = handle_raw_message(&mut b, &message.to_json().unwrap());
    assert!(matches!(outcome, SyncOutcome::Merged { coord, .. } if coord == ChunkCoord::new(3, 2)));
    assert_chunks_equal(&a, &b);
}

/// Test: reordered messages converge and replays change nothing.
#[test]
fn test_reordered_messages_converge() {
    let (mut a, mut b) = peers();
    let mut editor = ChunkEditor::new(1, 3);

    let first = editor.request_edit_at(&mut a, 40, 40).unwrap().to_json().unwrap();
    let second = editor.request_edit_at(&mut a, 41, 40).unwrap().to_json().unwrap();

    assert!(handle_raw_message(&mut b, &second).is_applied());
    // Only the pixels the second edit did not touch are taken
    assert!(handle_raw_message(&mut b, &first).is_applied());
    assert!(!handle_raw_message(&mut b, &first).is_applied());
    assert!(!handle_raw_message(&mut b, &second).is_applied());

    assert_eq!(b.chunk(ChunkCoord::new(1, 1)).unwrap().version, 2);
    assert_chunks_equal(&a, &b);
}

/// Test: two peers editing the same chunk at once end with the same chunk.
#[test]
fn test_concurrent_edits_converge() {
    let (mut a, mut b) = peers();
    let mut c = generate_world(WorldSeed::new(31), params()).unwrap();
    let mut editor_a = ChunkEditor::new(1, 100);
    let mut editor_b = ChunkEditor::new(2, 200);

    // Overlapping craters, both made at version 0
    let from_a = editor_a.request_edit_at(&mut a, 40, 40).unwrap().to_json().unwrap();
    let from_b = editor_b.request_edit_at(&mut b, 42, 41).unwrap().to_json().unwrap();
    let coord = ChunkCoord::new(1, 1);
    assert_ne!(a.chunk(coord), b.chunk(coord));

    // Each peer sees the other's edit last, the observer sees both reversed
    assert!(handle_raw_message(&mut a, &from_b).is_applied());
    assert!(handle_raw_message(&mut b, &from_a).is_applied());
    assert!(handle_raw_message(&mut c, &from_b).is_applied());
    assert!(handle_raw_message(&mut c, &from_a).is_applied());

    assert_eq!(a.chunk(coord).unwrap().version, 1);
    assert_chunks_equal(&a, &b);
    assert_chunks_equal(&a, &c);

    // The higher origin keeps the shared pixel
    let (_, shared) = a.locate(41, 40).unwrap();
    let chunk = b.chunk(coord).unwrap();
    if let Some(stamp) = chunk.field_stamp(PixelField::Height, shared) {
        assert_eq!(stamp.origin, 2);
    }

    // A follow-up edit outranks both
    let next = editor_a.request_edit_at(&mut a, 41, 40).unwrap().to_json().unwrap();
    assert_eq!(a.chunk(coord).unwrap().version, 2);
    assert!(handle_raw_message(&mut b, &next).is_applied());
    assert_chunks_equal(&a, &b);
}

/// Test: a chunk received during streaming is not overwritten by the baker.
#[test]
fn test_chunk_received_mid_stream_survives() {
    let (mut a, _) = peers();
    let config = EditorConfig { full_chunk_ratio: 0.0, ..EditorConfig::default() };
    let mut editor = ChunkEditor::with_config(1, 11, config);
    // Far corner, streamed last
    let message = editor.request_edit_at(&mut a, 127, 95).unwrap().to_json().unwrap();
    let coord = ChunkCoord::new(3, 2);

    let mut b = streaming_peer();
    assert!(b.chunk(coord).is_none());
    assert!(matches!(handle_raw_message(&mut b, &message), SyncOutcome::Merged { .. }));

    b.generate_blocking();
    assert_eq!(b.chunk(coord), a.chunk(coord));
}

/// Test: a patch for a chunk still waiting to stream is not lost.
#[test]
fn test_patch_received_mid_stream_survives() {
    let (mut a, _) = peers();
    let mut editor = ChunkEditor::new(1, 11);
    let message = editor.request_edit_at(&mut a, 126, 94).unwrap().to_json().unwrap();
    let coord = ChunkCoord::new(3, 2);

    let mut b = streaming_peer();
    assert!(b.chunk(coord).is_none());
    assert!(matches!(handle_raw_message(&mut b, &message), SyncOutcome::Patched { .. }));

    b.generate_blocking();
    assert_chunks_equal(&a, &b);
}

/// A peer that finished its initial bake and is still streaming.
fn streaming_peer() -> World {
    let mut world = World::new(WorldSeed::new(31), params()).unwrap();
    world.begin_generation();
    loop {
        if let GenerationStep::Generated(_) = world.step() {
            return world;
        }
    }
}
