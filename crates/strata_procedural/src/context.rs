//! Everything a pass reads but never writes.

use crate::layer::LayerCatalog;
use crate::material::MaterialCatalog;
use crate::noise::{NoiseProvider, WorldSeed};
use crate::params::GenerationParams;

/// Sub-seed purposes. Each noise field gets its own stream.
pub(crate) mod purpose {
    pub const TERRAIN: u64 = 0x01;
    pub const MATERIAL: u64 = 0x02;
    pub const MATERIAL_DETAIL: u64 = 0x03;
    pub const EDGE: u64 = 0x04;
    pub const EROSION: u64 = 0x10;
    pub const EROSION_DETAIL: u64 = 0x11;
    pub const EXPOSED_DETAIL: u64 = 0x12;
    pub const MOISTURE: u64 = 0x20;
    pub const WETTING: u64 = 0x21;
}

/// Inputs shared by every pass of one run.
#[derive(Clone, Debug)]
pub struct GenerationContext {
    /// Root seed.
    pub seed: WorldSeed,
    /// Run parameters.
    pub params: GenerationParams,
    /// Material table.
    pub materials: MaterialCatalog,
    /// Layer table.
    pub layers: LayerCatalog,
}

impl GenerationContext {
    /// Bundles the inputs of a run.
    #[must_use]
    pub fn new(
        seed: WorldSeed,
        params: GenerationParams,
        materials: MaterialCatalog,
        layers: LayerCatalog,
    ) -> Self {
        Self { seed, params, materials, layers }
    }

    /// Noise source for one purpose.
    pub(crate) fn noise(&self, purpose: u64) -> NoiseProvider {
        NoiseProvider::new(self.seed.derive(purpose))
    }

    /// Sub-seed for one purpose.
    pub(crate) fn sub_seed(&self, purpose: u64) -> WorldSeed {
        self.seed.derive(purpose)
    }
}
