//! # World Generation Report
//!
//! Generates a world cooperatively and prints timings, region and material
//! statistics. Optionally writes a snapshot.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use strata_procedural::{
    ByteEncoding, GenerationParams, GenerationStep, PackedPixel, World, WorldSeed,
};

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         STRATA WORLDGEN REPORT                                   ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help") {
        println!("Usage: worldgen_report [seed] [--params <file.toml>] [--export <file.json>] [--lz4]");
        return;
    }

    let seed = args
        .get(1)
        .filter(|a| !a.starts_with("--"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let option = |name: &str| args.iter().position(|a| a == name).and_then(|i| args.get(i + 1));

    let params = match option("--params") {
        Some(path) => match GenerationParams::from_toml_file(Path::new(path)) {
            Ok(params) => params,
            Err(e) => {
                println!("Error: {e}");
                return;
            }
        },
        None => GenerationParams::default(),
    };

    let mut world = match World::new(WorldSeed::new(seed), params) {
        Ok(world) => world,
        Err(e) => {
            println!("Error: {e}");
            return;
        }
    };

    println!("Seed:        {seed}");
    println!("World:       {} x {} px", world.params().width, world.params().height);
    println!("Chunks:      {} (size {})", world.chunks().capacity(), world.chunks().chunk_size());
    println!();

    let start = Instant::now();
    let mut steps = 0usize;
    world.begin_generation();
    loop {
        steps += 1;
        match world.step() {
            GenerationStep::Yield(_) => {}
            GenerationStep::Generated(progress) => {
                println!(
                    "Playable after {:.1} ms ({} chunks, {steps} steps)",
                    start.elapsed().as_secs_f64() * 1000.0,
                    progress.completed
                );
            }
            GenerationStep::Complete => break,
        }
    }
    println!("Complete after {:.1} ms ({steps} steps)", start.elapsed().as_secs_f64() * 1000.0);
    println!();

    println!("┌─ REGIONS ──────────────────────────────────────────────────────┐");
    for region in world.regions() {
        println!(
            "│ #{:<4} {:<10} {:<18} {:>5} chunks",
            region.id, region.name, region.layer_name, region.area
        );
    }
    println!("└────────────────────────────────────────────────────────────────┘");
    println!();

    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    let mut flooded = 0usize;
    for chunk in world.chunks().iter() {
        for byte in &chunk.pixel_data {
            *counts.entry(PackedPixel(*byte).material_index()).or_default() += 1;
        }
        flooded += chunk.water_data.iter().filter(|w| **w > 0).count();
    }
    let total: usize = counts.values().sum::<usize>().max(1);

    println!("┌─ MATERIALS ────────────────────────────────────────────────────┐");
    for (index, count) in &counts {
        let name = world.materials().get(*index).map_or("?", |m| m.name.as_str());
        println!("│ {:<12} {:>6.2}%", name, *count as f64 * 100.0 / total as f64);
    }
    println!("│ under water  {:>6.2}%", flooded as f64 * 100.0 / total as f64);
    println!("└────────────────────────────────────────────────────────────────┘");

    if let Some(path) = option("--export") {
        let encoding = if args.iter().any(|a| a == "--lz4") { ByteEncoding::Lz4 } else { ByteEncoding::Raw };
        match world.export_with(encoding).to_json() {
            Ok(json) => match std::fs::write(path, json) {
                Ok(()) => println!("Snapshot written to {path}"),
                Err(e) => println!("Error: could not write {path}: {e}"),
            },
            Err(e) => println!("Error: {e}"),
        }
    }
}
