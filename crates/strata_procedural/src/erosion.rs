//! # Erosion
//!
//! Second full-grid pass. Where two combined noise fields exceed a threshold
//! the terrain is worn down in proportion to how soft its material is, and
//! the exposed material is swapped for a harder one from the exposure
//! ladder:
//!
//! ```text
//! silt -> sand -> gravel -> clay -> stone -> granite -> basalt -> bedrock
//! ```
//!
//! The ladder is filtered to materials present in the catalog and ordered
//! by erosion durability.

use tracing::{debug, info};

use crate::cells::{pick_variant, to_byte, CellData};
use crate::context::{purpose, GenerationContext};
use crate::material::{MaterialCatalog, PackedPixel};
use crate::noise::NoiseProvider;
use crate::progress::{step_budget, PassStep, Progress, Stage};

/// Materials erosion can expose, softest first.
pub const EXPOSURE_LADDER: [&str; 8] =
    ["silt", "sand", "gravel", "clay", "stone", "granite", "basalt", "bedrock"];

const BROAD_WEIGHT: f64 = 0.7;
const DETAIL_WEIGHT: f64 = 0.3;

/// Resumable erosion pass.
pub struct ErosionPass {
    broad: NoiseProvider,
    detail: NoiseProvider,
    exposed_detail: NoiseProvider,
    /// `(material_index, durability)` ordered by durability.
    ladder: Vec<(u8, f32)>,
    next_pixel: usize,
    data: Option<CellData>,
}

impl ErosionPass {
    /// Takes ownership of the cell grids.
    #[must_use]
    pub fn new(ctx: &GenerationContext, data: CellData) -> Self {
        Self {
            broad: ctx.noise(purpose::EROSION),
            detail: ctx.noise(purpose::EROSION_DETAIL),
            exposed_detail: ctx.noise(purpose::EXPOSED_DETAIL),
            ladder: exposure_ladder(&ctx.materials),
            next_pixel: 0,
            data: Some(data),
        }
    }

    /// Erodes the next batch of pixels.
    pub fn step(&mut self, ctx: &GenerationContext) -> PassStep<CellData> {
        let Some(mut data) = self.data.take() else {
            return PassStep::Pending(Progress::new(Stage::Erosion, 0, 0));
        };

        let total = data.pixel_data.len();
        let end = (self.next_pixel + step_budget(total)).min(total);
        let width = data.width.max(1) as usize;

        for index in self.next_pixel..end {
            self.erode_pixel(ctx, &mut data, index, (index % width) as u32, (index / width) as u32);
        }
        self.next_pixel = end;

        if self.next_pixel < total {
            debug!("Erosion pass: {}/{}", self.next_pixel, total);
            self.data = Some(data);
            return PassStep::Pending(Progress::new(Stage::Erosion, self.next_pixel, total));
        }

        info!("Erosion pass complete: {} pixels, {} ladder steps", total, self.ladder.len());
        PassStep::Done(data)
    }

    fn erode_pixel(&self, ctx: &GenerationContext, data: &mut CellData, index: usize, x: u32, y: u32) {
        let settings = &ctx.params.erosion_settings;
        let original = f64::from(data.height_data[index]) / 255.0;
        if original < settings.min_height || settings.threshold >= 1.0 {
            return;
        }

        let (fx, fy) = (f64::from(x), f64::from(y));
        let combined = BROAD_WEIGHT * self.broad.sample(&ctx.params.erosion, fx, fy)
            + DETAIL_WEIGHT * self.detail.sample(&ctx.params.erosion_detail, fx, fy);
        if combined < settings.threshold {
            return;
        }

        let pixel = PackedPixel(data.pixel_data[index]);
        let Some(material) = ctx.materials.get(pixel.material_index()) else {
            return;
        };
        let durability = material.erosion_durability();

        let strength = (combined - settings.threshold) / (1.0 - settings.threshold) * settings.intensity;
        let lowered = (original - original * strength * (1.0 - f64::from(durability)) * settings.hardness).max(0.0);
        let depth = (original - lowered) / original.max(0.01);
        data.height_data[index] = to_byte(lowered);

        let start = self.ladder.partition_point(|(_, d)| *d < durability);
        let Some(exposed) = pick_exposed(&self.ladder[start..], depth) else {
            return;
        };

        let colors = ctx.materials.get(exposed).map_or(1, |m| m.color_count());
        let variant = pick_variant(self.exposed_detail.sample(&ctx.params.erosion_detail, fx, fy), colors);
        data.pixel_data[index] = PackedPixel::encode(exposed, variant).0;
    }
}

/// Builds the durability-ordered exposure ladder for a catalog.
#[must_use]
pub fn exposure_ladder(materials: &MaterialCatalog) -> Vec<(u8, f32)> {
    let mut ladder: Vec<(u8, f32)> = EXPOSURE_LADDER
        .iter()
        .filter_map(|name| {
            let index = materials.index_of(name)?;
            let material = materials.get(index)?;
            Some((index, material.erosion_durability()))
        })
        .collect();
    ladder.sort_by(|a, b| a.1.total_cmp(&b.1));
    ladder
}

/// Maps an erosion depth in [0, 1] linearly onto the candidates.
fn pick_exposed(candidates: &[(u8, f32)], depth: f64) -> Option<u8> {
    if candidates.is_empty() {
        return None;
    }
    let slot = (depth.clamp(0.0, 1.0) * candidates.len() as f64) as usize;
    candidates.get(slot.min(candidates.len() - 1)).map(|(index, _)| *index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::generate_cells;
    use crate::layer::LayerCatalog;
    use crate::noise::WorldSeed;
    use crate::params::{ErosionSettings, GenerationParams};

    fn context(params: GenerationParams) -> GenerationContext {
        let materials = MaterialCatalog::builtin();
        let layers = LayerCatalog::builtin(&materials).unwrap();
        GenerationContext::new(WorldSeed::new(11), params, materials, layers)
    }

    fn run(ctx: &GenerationContext, data: CellData) -> CellData {
        let mut pass = ErosionPass::new(ctx, data);
        loop {
            if let PassStep::Done(data) = pass.step(ctx) {
                return data;
            }
        }
    }

    #[test]
    fn test_ladder_is_durability_ordered() {
        let materials = MaterialCatalog::builtin();
        let ladder = exposure_ladder(&materials);
        assert_eq!(ladder.len(), 8);
        assert!(ladder.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(ladder.last().unwrap().0, materials.index_of("bedrock").unwrap());
    }

    #[test]
    fn test_ladder_skips_missing_materials() {
        let materials = MaterialCatalog::new(
            crate::material::builtin_materials()
                .into_iter()
                .filter(|m| m.name != "granite" && m.name != "basalt")
                .collect(),
        )
        .unwrap();
        assert_eq!(exposure_ladder(&materials).len(), 6);
    }

    #[test]
    fn test_erosion_never_raises_terrain() {
        let ctx = context(GenerationParams::default().with_size(96, 96).with_cell_size(16));
        let before = generate_cells(&ctx);
        let after = run(&ctx, before.clone());

        assert!(before
            .height_data
            .iter()
            .zip(&after.height_data)
            .all(|(b, a)| a <= b));
        for byte in &after.pixel_data {
            assert!(ctx.materials.decode(PackedPixel(*byte)).is_ok());
        }
    }

    #[test]
    fn test_exposed_material_is_never_softer() {
        let materials = MaterialCatalog::builtin();
        let layers = LayerCatalog::builtin(&materials).unwrap();
        let params = GenerationParams::default().with_size(256, 256);
        let ctx = GenerationContext::new(WorldSeed::new(5), params, materials, layers);

        let before = generate_cells(&ctx);
        let after = run(&ctx, before.clone());
        let durability = |byte: u8| {
            ctx.materials.decode(PackedPixel(byte)).unwrap().erosion_durability()
        };

        let mut swapped = 0;
        for (old, new) in before.pixel_data.iter().zip(&after.pixel_data) {
            if PackedPixel(*old).material_index() == PackedPixel(*new).material_index() {
                continue;
            }
            swapped += 1;
            assert!(
                durability(*new) >= durability(*old),
                "{old:#04x} replaced by softer {new:#04x}"
            );
        }
        assert!(swapped > 0, "erosion exposed nothing");
    }

    #[test]
    fn test_threshold_above_noise_disables_erosion() {
        let params = GenerationParams::default()
            .with_size(64, 64)
            .with_erosion(ErosionSettings { threshold: 1.0, ..ErosionSettings::default() });
        let ctx = context(params);
        let before = generate_cells(&ctx);
        let after = run(&ctx, before.clone());
        assert_eq!(before, after);
    }

    #[test]
    fn test_pick_exposed_maps_depth() {
        let candidates = [(4, 0.1), (5, 0.2), (6, 0.3), (7, 0.4)];
        assert_eq!(pick_exposed(&candidates, 0.0), Some(4));
        assert_eq!(pick_exposed(&candidates, 0.5), Some(6));
        assert_eq!(pick_exposed(&candidates, 1.0), Some(7));
        assert_eq!(pick_exposed(&[], 0.5), None);
    }
}
