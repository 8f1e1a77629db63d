//! Edit and sync benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_networking::{handle_chunk_update, ChunkEditor};
use strata_procedural::{generate_world, GenerationParams, WorldSeed};

fn bench_edit(c: &mut Criterion) {
    let params = GenerationParams::default().with_size(256, 256);
    let Ok(mut world) = generate_world(WorldSeed::new(42), params) else {
        return;
    };
    let mut editor = ChunkEditor::new(1, 1);

    c.bench_function("crater_edit", |b| {
        b.iter(|| black_box(editor.request_edit_at(&mut world, black_box(100), black_box(100))));
    });
}

fn bench_apply_patch(c: &mut Criterion) {
    let params = GenerationParams::default().with_size(256, 256);
    let (Ok(mut source), Ok(mut peer)) = (
        generate_world(WorldSeed::new(42), params.clone()),
        generate_world(WorldSeed::new(42), params),
    ) else {
        return;
    };
    let mut editor = ChunkEditor::new(1, 1);

    c.bench_function("apply_patch", |b| {
        b.iter(|| {
            if let Some(message) = editor.request_edit_at(&mut source, 100, 100) {
                black_box(handle_chunk_update(&mut peer, &message));
            }
        });
    });
}

criterion_group!(benches, bench_edit, bench_apply_patch);
criterion_main!(benches);
