//! # Generation Parameters
//!
//! One immutable value passed through every pass. Builders return a
//! modified copy, so a run never observes a parameter changing mid-flight.
//!
//! Values are not range-checked: a sea level outside [0, 1] or a zero cell
//! size produces a degenerate world, not an error.
//!
//! ## TOML
//!
//! Every field has a default, so a config file only lists what it changes:
//!
//! ```toml
//! width = 512
//! height = 512
//! edge_shaping = "island"
//!
//! [terrain]
//! kind = "perlin"
//! scale = 0.006
//! octaves = 6
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{WorldError, WorldResult};
use crate::noise::NoiseSettings;

/// How terrain height behaves near the world edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeShaping {
    /// No shaping.
    #[default]
    None,
    /// Pull the edges down toward deep ocean.
    Island,
    /// Pull the edges up toward peaks.
    Valley,
}

/// Erosion pass settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErosionSettings {
    /// Pixels below this height are never eroded.
    pub min_height: f64,
    /// Combined noise must exceed this to erode.
    pub threshold: f64,
    /// Strength multiplier.
    pub intensity: f64,
    /// Fraction of height a fully soft material can lose.
    pub hardness: f64,
}

impl Default for ErosionSettings {
    fn default() -> Self {
        Self { min_height: 0.15, threshold: 0.45, intensity: 1.0, hardness: 0.35 }
    }
}

/// Hydration pass settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationSettings {
    /// Box blur radius in pixels.
    pub blur_radius: u32,
    /// Number of blur passes.
    pub blur_passes: u32,
    /// Wetness above which absorbent materials may turn wet.
    pub dry_threshold: f64,
    /// Multiplier on the wetting probability.
    pub wetting_chance: f64,
}

impl Default for HydrationSettings {
    fn default() -> Self {
        Self { blur_radius: 5, blur_passes: 3, dry_threshold: 0.35, wetting_chance: 1.0 }
    }
}

/// Parameters of one generation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// World width in pixels.
    pub width: u32,
    /// World height in pixels.
    pub height: u32,
    /// Side of a generation cell in pixels.
    pub cell_size: u32,
    /// Side of a chunk in pixels.
    pub chunk_size: u32,
    /// Streaming origin in pixels; the world centre when unset.
    pub spawn: Option<(u32, u32)>,

    /// Cell height field.
    pub terrain: NoiseSettings,
    /// Per-pixel material roll.
    pub material: NoiseSettings,
    /// Per-pixel color variant.
    pub material_detail: NoiseSettings,
    /// Broad erosion field.
    pub erosion: NoiseSettings,
    /// Fine erosion field, also used for exposed color variants.
    pub erosion_detail: NoiseSettings,
    /// Low-frequency moisture modulation.
    pub moisture: NoiseSettings,
    /// Jitter on the edge shaping blend.
    pub edge: NoiseSettings,

    /// Heights below this are under water.
    pub sea_level: f64,
    /// Floor for shaped heights.
    pub lowest_depth: f64,
    /// Exponent applied to cell heights.
    pub height_curve: f64,
    /// Contrast around 0.5.
    pub intensity: f64,
    /// Edge shaping mode.
    pub edge_shaping: EdgeShaping,
    /// Width of the shaping band as a fraction of half the shorter side.
    pub shaping_band: f64,

    /// Erosion pass settings.
    pub erosion_settings: ErosionSettings,
    /// Hydration pass settings.
    pub hydration: HydrationSettings,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            cell_size: 32,
            chunk_size: 64,
            spawn: None,

            terrain: NoiseSettings::perlin(0.004, 5, 0.5),
            material: NoiseSettings::worley(0.05, 1),
            material_detail: NoiseSettings::perlin(0.35, 2, 0.5),
            erosion: NoiseSettings::ridged(0.01, 4, 0.5),
            erosion_detail: NoiseSettings::perlin(0.08, 3, 0.5),
            moisture: NoiseSettings::perlin(0.01, 2, 0.5),
            edge: NoiseSettings::perlin(0.02, 2, 0.5),

            sea_level: 0.32,
            lowest_depth: 0.02,
            height_curve: 1.1,
            intensity: 1.2,
            edge_shaping: EdgeShaping::None,
            shaping_band: 0.5,

            erosion_settings: ErosionSettings::default(),
            hydration: HydrationSettings::default(),
        }
    }
}

impl GenerationParams {
    /// Parses params from TOML; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `WorldError::ConfigParse` for malformed documents.
    pub fn from_toml_str(text: &str) -> WorldResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads params from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns IO and parse errors.
    pub fn from_toml_file(path: &Path) -> WorldResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| WorldError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Copy with a different world size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Copy with a different cell size.
    #[must_use]
    pub fn with_cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = cell_size;
        self
    }

    /// Copy with a different chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Copy with an explicit spawn point.
    #[must_use]
    pub fn with_spawn(mut self, x: u32, y: u32) -> Self {
        self.spawn = Some((x, y));
        self
    }

    /// Copy with a different edge shaping mode.
    #[must_use]
    pub fn with_edge_shaping(mut self, shaping: EdgeShaping) -> Self {
        self.edge_shaping = shaping;
        self
    }

    /// Copy with a different sea level.
    #[must_use]
    pub fn with_sea_level(mut self, sea_level: f64) -> Self {
        self.sea_level = sea_level;
        self
    }

    /// Copy with different terrain noise.
    #[must_use]
    pub fn with_terrain(mut self, terrain: NoiseSettings) -> Self {
        self.terrain = terrain;
        self
    }

    /// Copy with different erosion settings.
    #[must_use]
    pub fn with_erosion(mut self, erosion: ErosionSettings) -> Self {
        self.erosion_settings = erosion;
        self
    }

    /// Copy with different hydration settings.
    #[must_use]
    pub fn with_hydration(mut self, hydration: HydrationSettings) -> Self {
        self.hydration = hydration;
        self
    }

    /// Spawn point, defaulting to the world centre.
    #[must_use]
    pub fn spawn_point(&self) -> (u32, u32) {
        self.spawn.unwrap_or((self.width / 2, self.height / 2))
    }

    /// Number of pixels in the world.
    #[inline]
    #[must_use]
    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Chunk grid dimensions `(columns, rows)`.
    #[must_use]
    pub fn chunk_grid(&self) -> (u32, u32) {
        let size = self.chunk_size.max(1);
        (self.width.div_ceil(size), self.height.div_ceil(size))
    }

    /// Cell grid dimensions `(columns, rows)`.
    #[must_use]
    pub fn cell_grid(&self) -> (u32, u32) {
        let size = self.cell_size.max(1);
        (self.width.div_ceil(size), self.height.div_ceil(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseKind;

    #[test]
    fn test_builders_return_modified_copy() {
        let base = GenerationParams::default();
        let island = base.clone().with_edge_shaping(EdgeShaping::Island).with_size(100, 50);

        assert_eq!(base.edge_shaping, EdgeShaping::None);
        assert_eq!(island.edge_shaping, EdgeShaping::Island);
        assert_eq!((island.width, island.height), (100, 50));
    }

    #[test]
    fn test_grid_dimensions_round_up() {
        let params = GenerationParams::default()
            .with_size(130, 64)
            .with_chunk_size(64)
            .with_cell_size(30);
        assert_eq!(params.chunk_grid(), (3, 1));
        assert_eq!(params.cell_grid(), (5, 3));
    }

    #[test]
    fn test_spawn_defaults_to_centre() {
        let params = GenerationParams::default().with_size(200, 100);
        assert_eq!(params.spawn_point(), (100, 50));
        assert_eq!(params.with_spawn(3, 4).spawn_point(), (3, 4));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let params = GenerationParams::from_toml_str(
            r#"
            width = 256
            edge_shaping = "valley"

            [terrain]
            kind = "ridged"
            scale = 0.01

            [hydration]
            blur_passes = 1
            "#,
        )
        .unwrap();

        assert_eq!(params.width, 256);
        assert_eq!(params.height, 1024);
        assert_eq!(params.edge_shaping, EdgeShaping::Valley);
        assert_eq!(params.terrain.kind, NoiseKind::Ridged);
        assert_eq!(params.terrain.octaves, 4);
        assert_eq!(params.hydration.blur_passes, 1);
        assert_eq!(params.hydration.blur_radius, 5);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let result = GenerationParams::from_toml_str("width = \"wide\"");
        assert!(matches!(result, Err(WorldError::ConfigParse(_))));
    }
}
