//! # World
//!
//! Owns the chunk grid, the regions and the in-flight generation task.
//!
//! ## Cooperative Generation
//!
//! ```rust,ignore
//! let mut world = World::new(WorldSeed::new(42), GenerationParams::default())?;
//! world.begin_generation();
//! loop {
//!     match world.step() {
//!         GenerationStep::Yield(progress) => draw_loading(&progress),
//!         GenerationStep::Generated(_) => spawn_player(&world),
//!         GenerationStep::Complete => break,
//!     }
//! }
//! ```
//!
//! Each call runs a bounded amount of work. `Generated` is returned exactly
//! once, when the chunks nearest to spawn are ready; streaming and region
//! classification continue on later steps.

use tracing::{debug, info, warn};

use crate::baker::ChunkBaker;
use crate::cells::CellPass;
use crate::chunk::{Chunk, ChunkCoord, ChunkGrid};
use crate::context::GenerationContext;
use crate::erosion::ErosionPass;
use crate::error::WorldResult;
use crate::hydration::HydrationPass;
use crate::layer::LayerCatalog;
use crate::material::{Material, MaterialCatalog, PackedPixel};
use crate::noise::WorldSeed;
use crate::params::GenerationParams;
use crate::progress::{PassStep, Progress, Stage};
use crate::region::{Region, RegionClassifier};
use crate::zone::{derive_zones, AmbienceZone};

/// Outcome of one cooperative generation step.
#[derive(Debug, PartialEq, Eq)]
pub enum GenerationStep {
    /// Work remains; redraw and call again.
    Yield(Progress),
    /// The initial bake finished; the world is playable.
    Generated(Progress),
    /// Everything is baked and classified.
    Complete,
}

/// Water at a world position.
#[derive(Clone, Copy, Debug)]
pub struct WaterInfo<'a> {
    /// Whether the pixel is under water.
    pub has_water: bool,
    /// Sea level of the world.
    pub water_level: f32,
    /// Water depth in [0, 1].
    pub depth: f32,
    /// Material under the water.
    pub material: Option<&'a Material>,
}

enum Task {
    Cells(CellPass),
    Erosion(ErosionPass),
    Hydration(HydrationPass),
    Baking(ChunkBaker),
    Streaming(ChunkBaker),
    Regions,
}

/// A generated (or generating) world.
pub struct World {
    ctx: GenerationContext,
    chunks: ChunkGrid,
    regions: Vec<Region>,
    zones: Vec<AmbienceZone>,
    task: Option<Task>,
    generated: bool,
}

/// Generates a world with the built-in catalogs, running every pass to
/// completion.
///
/// # Errors
///
/// Fails only if the built-in catalogs are inconsistent.
pub fn generate_world(seed: WorldSeed, params: GenerationParams) -> WorldResult<World> {
    let mut world = World::new(seed, params)?;
    world.generate_blocking();
    Ok(world)
}

impl World {
    /// Creates an empty world with the built-in catalogs.
    ///
    /// # Errors
    ///
    /// Fails if the built-in layers reference a missing material.
    pub fn new(seed: WorldSeed, params: GenerationParams) -> WorldResult<Self> {
        let materials = MaterialCatalog::builtin();
        let layers = LayerCatalog::builtin(&materials)?;
        Ok(Self::with_catalogs(seed, params, materials, layers))
    }

    /// Creates an empty world with custom catalogs.
    #[must_use]
    pub fn with_catalogs(
        seed: WorldSeed,
        params: GenerationParams,
        materials: MaterialCatalog,
        layers: LayerCatalog,
    ) -> Self {
        let chunks = ChunkGrid::new(params.width, params.height, params.chunk_size);
        Self {
            ctx: GenerationContext::new(seed, params, materials, layers),
            chunks,
            regions: Vec::new(),
            zones: Vec::new(),
            task: None,
            generated: false,
        }
    }

    /// World seed.
    #[inline]
    #[must_use]
    pub fn seed(&self) -> WorldSeed {
        self.ctx.seed
    }

    /// Generation parameters.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &GenerationParams {
        &self.ctx.params
    }

    /// Material table.
    #[inline]
    #[must_use]
    pub fn materials(&self) -> &MaterialCatalog {
        &self.ctx.materials
    }

    /// Layer table.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> &LayerCatalog {
        &self.ctx.layers
    }

    /// Chunk grid.
    #[inline]
    #[must_use]
    pub fn chunks(&self) -> &ChunkGrid {
        &self.chunks
    }

    /// Classified regions (empty until classification ran).
    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Ambience zones, one per region.
    #[inline]
    #[must_use]
    pub fn zones(&self) -> &[AmbienceZone] {
        &self.zones
    }

    /// True once the initial bake finished.
    #[inline]
    #[must_use]
    pub const fn is_generated(&self) -> bool {
        self.generated
    }

    /// True while a generation task is in flight.
    #[inline]
    #[must_use]
    pub const fn is_generating(&self) -> bool {
        self.task.is_some()
    }

    /// Number of baked chunks.
    #[inline]
    #[must_use]
    pub fn baked_chunks(&self) -> usize {
        self.chunks.baked_count()
    }

    /// Discards chunks, regions, zones and any in-flight task.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.regions.clear();
        self.zones.clear();
        self.task = None;
        self.generated = false;
    }

    /// Clears the world and starts a new generation task.
    pub fn begin_generation(&mut self) {
        self.clear();
        info!(
            "Generation started: seed {}, {}x{} px",
            self.ctx.seed.value(),
            self.ctx.params.width,
            self.ctx.params.height
        );
        self.task = Some(Task::Cells(CellPass::new(&self.ctx)));
    }

    /// Runs one bounded unit of generation work.
    pub fn step(&mut self) -> GenerationStep {
        let Some(task) = self.task.take() else {
            return GenerationStep::Complete;
        };

        let ctx = &self.ctx;
        let (next, step) = match task {
            Task::Cells(mut pass) => match pass.step(ctx) {
                PassStep::Pending(p) => (Task::Cells(pass), GenerationStep::Yield(p)),
                PassStep::Done(data) => {
                    let p = Progress::new(Stage::Erosion, 0, data.pixel_data.len());
                    (Task::Erosion(ErosionPass::new(ctx, data)), GenerationStep::Yield(p))
                }
            },
            Task::Erosion(mut pass) => match pass.step(ctx) {
                PassStep::Pending(p) => (Task::Erosion(pass), GenerationStep::Yield(p)),
                PassStep::Done(data) => {
                    let p = Progress::new(Stage::Hydration, 0, data.height as usize);
                    (Task::Hydration(HydrationPass::new(ctx, data)), GenerationStep::Yield(p))
                }
            },
            Task::Hydration(mut pass) => match pass.step(ctx) {
                PassStep::Pending(p) => (Task::Hydration(pass), GenerationStep::Yield(p)),
                PassStep::Done(data) => {
                    let baker = ChunkBaker::new(ctx, data, &self.chunks);
                    let p = Progress::new(Stage::Baking, 0, self.chunks.capacity() / 2);
                    (Task::Baking(baker), GenerationStep::Yield(p))
                }
            },
            Task::Baking(mut baker) => match baker.bake_step(ctx, &mut self.chunks) {
                PassStep::Pending(p) => (Task::Baking(baker), GenerationStep::Yield(p)),
                PassStep::Done(()) => {
                    self.generated = true;
                    let baked = self.chunks.baked_count();
                    let p = Progress::new(Stage::Baking, baked, baked);
                    let next = if baker.buffered() > 0 { Task::Streaming(baker) } else { Task::Regions };
                    (next, GenerationStep::Generated(p))
                }
            },
            Task::Streaming(mut baker) => match baker.stream_step(ctx, &mut self.chunks) {
                PassStep::Pending(p) => (Task::Streaming(baker), GenerationStep::Yield(p)),
                PassStep::Done(()) => {
                    let p = Progress::new(Stage::Regions, 0, self.chunks.baked_count());
                    (Task::Regions, GenerationStep::Yield(p))
                }
            },
            Task::Regions => {
                self.classify_regions();
                info!(
                    "Generation complete: {} chunks, {} regions",
                    self.chunks.baked_count(),
                    self.regions.len()
                );
                return GenerationStep::Complete;
            }
        };

        self.task = Some(next);
        step
    }

    /// Runs the in-flight task (or a fresh one) to completion.
    pub fn generate_blocking(&mut self) {
        if self.task.is_none() {
            self.begin_generation();
        }
        while self.step() != GenerationStep::Complete {}
    }

    /// Rebuilds regions and zones from the current chunks.
    pub fn classify_regions(&mut self) {
        self.regions = RegionClassifier::new(&self.chunks).classify();
        self.zones = derive_zones(&self.regions, &self.chunks);
    }

    /// Chunk at a coordinate.
    #[inline]
    #[must_use]
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(coord)
    }

    /// Chunk at a coordinate, mutably (for edits).
    #[inline]
    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(coord)
    }

    /// Chunk at a coordinate, baking it early if the baker still holds it.
    ///
    /// Lets edits that arrive while chunks are streaming land on the right
    /// base. Before the bake starts there is nothing to bake from and this
    /// behaves like `chunk_mut`.
    pub fn ensure_chunk(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        if self.chunks.get(coord).is_none() {
            if let Some(Task::Baking(baker) | Task::Streaming(baker)) = &self.task {
                debug!("Chunk [{},{}] baked ahead of the stream", coord.x, coord.y);
                baker.bake_chunk(&self.ctx, &mut self.chunks, coord);
            }
        }
        self.chunks.get_mut(coord)
    }

    /// Stores a chunk at its coordinate, returning the one it replaced.
    ///
    /// Chunks outside the grid or with the wrong size are handed back as `Err`.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> Result<Option<Chunk>, Chunk> {
        if chunk.size != self.chunks.chunk_size() {
            return Err(chunk);
        }
        self.chunks.insert(chunk)
    }

    /// Chunk containing a world pixel, with the pixel's local index.
    #[inline]
    #[must_use]
    pub fn locate(&self, x: i32, y: i32) -> Option<(ChunkCoord, usize)> {
        self.chunks.locate(x, y)
    }

    /// Material at a world pixel.
    ///
    /// `None` out of bounds, in unbaked chunks, or for a corrupt pixel.
    #[must_use]
    pub fn material_at(&self, x: i32, y: i32) -> Option<&Material> {
        let (coord, index) = self.chunks.locate(x, y)?;
        let pixel = self.chunks.get(coord)?.pixel(index)?;
        self.decode(pixel, x, y)
    }

    /// Normalized height at a world pixel.
    #[must_use]
    pub fn height_at(&self, x: i32, y: i32) -> Option<f32> {
        let (coord, index) = self.chunks.locate(x, y)?;
        let byte = *self.chunks.get(coord)?.height_data.get(index)?;
        Some(f32::from(byte) / 255.0)
    }

    /// Water at a world pixel.
    #[must_use]
    pub fn water_at(&self, x: i32, y: i32) -> Option<WaterInfo<'_>> {
        let (coord, index) = self.chunks.locate(x, y)?;
        let chunk = self.chunks.get(coord)?;
        let depth = *chunk.water_data.get(index)?;
        let material = chunk.pixel(index).and_then(|pixel| self.decode(pixel, x, y));
        Some(WaterInfo {
            has_water: depth > 0,
            water_level: self.ctx.params.sea_level as f32,
            depth: f32::from(depth) / 255.0,
            material,
        })
    }

    fn decode(&self, pixel: PackedPixel, x: i32, y: i32) -> Option<&Material> {
        match self.ctx.materials.decode(pixel) {
            Ok(material) => Some(material),
            Err(error) => {
                warn!("Corrupt pixel at ({}, {}): {}", x, y, error);
                None
            }
        }
    }

    /// Replaces the world contents with already-built chunks and regions.
    pub(crate) fn restore(&mut self, chunks: ChunkGrid, regions: Vec<Region>, zones: Vec<AmbienceZone>) {
        debug!("World restored: {} chunks, {} regions", chunks.baked_count(), regions.len());
        self.chunks = chunks;
        self.regions = regions;
        self.zones = zones;
        self.task = None;
        self.generated = true;
    }
}
