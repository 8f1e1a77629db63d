//! # STRATA Procedural Generation
//!
//! Deterministic generation of large 2D tile worlds.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed + params always produce the same world
//! 2. **Chunked**: The world is stored and synced as fixed-size chunks
//! 3. **Cooperative**: Every pass yields about ten times, never blocks the host
//! 4. **Packed**: One byte per pixel for material and color
//!
//! ## Pipeline
//!
//! ```text
//! seed -> cells -> erosion -> hydration -> baker -> regions -> zones
//! ```
//!
//! ## Core Components
//!
//! - `NoiseProvider`: seeded Perlin, ridged, Worley and Voronoi fields
//! - `MaterialCatalog` / `LayerCatalog`: material and height band tables
//! - `CellPass`, `ErosionPass`, `HydrationPass`: full-grid passes
//! - `ChunkBaker`: distance-ordered chunk streaming
//! - `RegionClassifier`: flood-fill region naming
//! - `World`: queries, edits hooks, export/import
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_procedural::{generate_world, GenerationParams, WorldSeed};
//!
//! let world = generate_world(WorldSeed::new(12345), GenerationParams::default())?;
//! let material = world.material_at(100, 200).map(|m| m.name.as_str());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod baker;
pub mod cells;
pub mod chunk;
pub mod context;
pub mod erosion;
pub mod error;
pub mod export;
pub mod hydration;
pub mod layer;
pub mod material;
pub mod noise;
pub mod params;
pub mod progress;
pub mod region;
pub mod world;
pub mod zone;

pub use baker::ChunkBaker;
pub use cells::{generate_cells, CellData, CellPass};
pub use chunk::{Chunk, ChunkCoord, ChunkGrid, PixelField};
pub use context::GenerationContext;
pub use erosion::ErosionPass;
pub use error::{WorldError, WorldResult};
pub use export::{ByteEncoding, ChunkRecord, ExportMetadata, WorldExport};
pub use hydration::HydrationPass;
pub use layer::{LayerCatalog, LayerMaterial, WorldLayer};
pub use material::{Material, MaterialCatalog, MaterialKind, MaterialPhysics, PackedPixel};
pub use noise::{hash01, noise, NoiseKind, NoiseProvider, NoiseSettings, WorldSeed};
pub use params::{EdgeShaping, ErosionSettings, GenerationParams, HydrationSettings};
pub use progress::{Progress, Stage};
pub use region::{Region, RegionBounds, RegionClassifier, RegionKind};
pub use world::{generate_world, GenerationStep, WaterInfo, World};
pub use zone::{AmbienceZone, PixelBounds};
