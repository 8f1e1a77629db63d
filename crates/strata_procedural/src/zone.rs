//! Ambience zones.
//!
//! A zone is the audio-facing summary of a region, in world pixels. The
//! ambience system picks loops from `kind` and mixes in water sounds by
//! `water_ratio`.

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkGrid;
use crate::region::{Region, RegionKind};

/// Pixel-space rectangle, `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBounds {
    /// Left edge.
    pub min_x: u32,
    /// Top edge.
    pub min_y: u32,
    /// Right edge (exclusive).
    pub max_x: u32,
    /// Bottom edge (exclusive).
    pub max_y: u32,
}

/// Ambience record derived from one region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmbienceZone {
    /// Zone id (same as the region id).
    pub id: u32,
    /// Source region.
    pub region_id: u32,
    /// Region name.
    pub kind: RegionKind,
    /// Mean of the in-world chunk centres, in pixels.
    pub centre: (f32, f32),
    /// Bounds clipped to the world.
    pub bounds: PixelBounds,
    /// In-world pixels covered.
    pub area_px: u64,
    /// Water pixels over in-world pixels.
    pub water_ratio: f32,
}

/// Derives one zone per region.
#[must_use]
pub fn derive_zones(regions: &[Region], grid: &ChunkGrid) -> Vec<AmbienceZone> {
    regions.iter().map(|region| zone_for(region, grid)).collect()
}

fn zone_for(region: &Region, grid: &ChunkGrid) -> AmbienceZone {
    let size = grid.chunk_size();
    let mut area = 0u64;
    let mut water = 0u64;
    let (mut sum_x, mut sum_y) = (0.0f64, 0.0f64);
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for coord in &region.chunk_coords {
        let (w, h) = grid.extent(*coord);
        let x0 = coord.x as u32 * size;
        let y0 = coord.y as u32 * size;
        max_x = max_x.max(x0 + w);
        max_y = max_y.max(y0 + h);
        sum_x += f64::from(x0) + f64::from(w) / 2.0;
        sum_y += f64::from(y0) + f64::from(h) / 2.0;
        area += u64::from(w) * u64::from(h);

        if let Some(chunk) = grid.get(*coord) {
            for y in 0..h as usize {
                let row = &chunk.water_data[y * size as usize..][..w as usize];
                water += row.iter().filter(|depth| **depth > 0).count() as u64;
            }
        }
    }

    let count = region.chunk_coords.len().max(1) as f64;
    AmbienceZone {
        id: region.id,
        region_id: region.id,
        kind: region.name,
        centre: ((sum_x / count) as f32, (sum_y / count) as f32),
        bounds: PixelBounds {
            min_x: region.bounds.min.x.max(0) as u32 * size,
            min_y: region.bounds.min.y.max(0) as u32 * size,
            max_x,
            max_y,
        },
        area_px: area,
        water_ratio: if area == 0 { 0.0 } else { (water as f64 / area as f64) as f32 },
    }
}
