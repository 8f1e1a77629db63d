//! # Chunk Baking
//!
//! Splits the hydrated world grids into chunks and streams them out nearest
//! to spawn first. The initial bake produces `floor(N / 2)` chunks and then
//! returns so the world can be marked generated; the rest wait in a
//! background buffer that is drained one chunk per cooperative step.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::cells::CellData;
use crate::chunk::{Chunk, ChunkCoord, ChunkGrid};
use crate::context::GenerationContext;
use crate::progress::{step_budget, PassStep, Progress, Stage};

/// Resumable chunk baker.
pub struct ChunkBaker {
    data: CellData,
    initial: VecDeque<ChunkCoord>,
    initial_total: usize,
    buffer: VecDeque<ChunkCoord>,
    buffer_total: usize,
}

impl ChunkBaker {
    /// Orders every chunk of the grid by distance from spawn.
    #[must_use]
    pub fn new(ctx: &GenerationContext, data: CellData, grid: &ChunkGrid) -> Self {
        let order = streaming_order(grid, ctx.params.spawn_point());
        let initial_total = order.len() / 2;

        let mut initial: VecDeque<ChunkCoord> = order.into();
        let buffer = initial.split_off(initial_total);
        let buffer_total = buffer.len();

        Self { data, initial, initial_total, buffer, buffer_total }
    }

    /// Number of chunks still waiting in the background buffer.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bakes the next batch of the initial half.
    pub fn bake_step(&mut self, ctx: &GenerationContext, grid: &mut ChunkGrid) -> PassStep<()> {
        for _ in 0..step_budget(self.initial_total) {
            let Some(coord) = self.initial.pop_front() else {
                break;
            };
            self.bake_chunk(ctx, grid, coord);
        }

        let done = self.initial_total - self.initial.len();
        if self.initial.is_empty() {
            info!("Initial bake complete: {} chunks, {} buffered", done, self.buffer.len());
            PassStep::Done(())
        } else {
            debug!("Baking: {}/{}", done, self.initial_total);
            PassStep::Pending(Progress::new(Stage::Baking, done, self.initial_total))
        }
    }

    /// Bakes one chunk from the background buffer.
    pub fn stream_step(&mut self, ctx: &GenerationContext, grid: &mut ChunkGrid) -> PassStep<()> {
        if let Some(coord) = self.buffer.pop_front() {
            self.bake_chunk(ctx, grid, coord);
        }

        let done = self.buffer_total - self.buffer.len();
        if self.buffer.is_empty() {
            info!("Background buffer drained: {} streamed, {} total", done, grid.baked_count());
            PassStep::Done(())
        } else {
            PassStep::Pending(Progress::new(Stage::Streaming, done, self.buffer_total))
        }
    }

    /// Copies one chunk out of the world grids.
    ///
    /// A chunk that already exists (received from a peer mid-stream) is kept.
    pub(crate) fn bake_chunk(&self, ctx: &GenerationContext, grid: &mut ChunkGrid, coord: ChunkCoord) {
        if !grid.contains(coord) || grid.get(coord).is_some() {
            return;
        }

        let size = grid.chunk_size();
        let (extent_w, extent_h) = grid.extent(coord);
        let layer = dominant_layer(&self.data, coord, size, (extent_w, extent_h));
        let name = ctx.layers.get(layer).map_or_else(String::new, |l| l.name.clone());

        let mut chunk = Chunk::new(coord, size, name);
        let x0 = coord.x as u32 * size;
        let y0 = coord.y as u32 * size;
        for ly in 0..extent_h {
            let src = self.data.index(x0, y0 + ly);
            let dst = ly as usize * size as usize;
            let len = extent_w as usize;
            chunk.pixel_data[dst..dst + len].copy_from_slice(&self.data.pixel_data[src..src + len]);
            chunk.height_data[dst..dst + len].copy_from_slice(&self.data.height_data[src..src + len]);
            chunk.water_data[dst..dst + len].copy_from_slice(&self.data.water_data[src..src + len]);
        }

        if let Err(chunk) = grid.insert(chunk) {
            warn!("Chunk [{},{}] is outside the grid, not stored", chunk.coord.x, chunk.coord.y);
        }
    }
}

/// Every grid coordinate sorted by squared distance of the chunk centre
/// from `spawn`, ties by row then column.
#[must_use]
pub fn streaming_order(grid: &ChunkGrid, spawn: (u32, u32)) -> Vec<ChunkCoord> {
    let size = i64::from(grid.chunk_size());
    let (sx, sy) = (i64::from(spawn.0) * 2, i64::from(spawn.1) * 2);

    let mut order: Vec<(i64, ChunkCoord)> = (0..grid.rows() as i32)
        .flat_map(|y| (0..grid.columns() as i32).map(move |x| ChunkCoord::new(x, y)))
        .map(|coord| {
            // Doubled coordinates keep the centre integral for odd sizes
            let cx = i64::from(coord.x) * size * 2 + size;
            let cy = i64::from(coord.y) * size * 2 + size;
            let distance = (cx - sx).pow(2) + (cy - sy).pow(2);
            (distance, coord)
        })
        .collect();

    order.sort_by_key(|(distance, coord)| (*distance, coord.y, coord.x));
    order.into_iter().map(|(_, coord)| coord).collect()
}

/// Majority layer of the generation cells overlapping a chunk footprint.
///
/// One vote per overlapping cell; ties go to the lower layer index.
fn dominant_layer(data: &CellData, coord: ChunkCoord, size: u32, extent: (u32, u32)) -> usize {
    if extent.0 == 0 || extent.1 == 0 {
        return 0;
    }

    let cell = data.cell_size.max(1);
    let x0 = coord.x as u32 * size;
    let y0 = coord.y as u32 * size;
    let (cx0, cx1) = (x0 / cell, (x0 + extent.0 - 1) / cell);
    let (cy0, cy1) = (y0 / cell, (y0 + extent.1 - 1) / cell);

    let mut votes: Vec<usize> = Vec::new();
    for cy in cy0..=cy1 {
        for cx in cx0..=cx1 {
            let Some(&layer) = data.cell_layers.get(cy as usize).and_then(|row| row.get(cx as usize)) else {
                continue;
            };
            if votes.len() <= layer {
                votes.resize(layer + 1, 0);
            }
            votes[layer] += 1;
        }
    }

    let mut best = 0;
    for (layer, count) in votes.iter().enumerate() {
        if *count > votes[best] {
            best = layer;
        }
    }
    best
}
