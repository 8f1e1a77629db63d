//! # Hydration
//!
//! Third full-grid pass:
//!
//! 1. Pixels below sea level become direct water with wetness 1.
//! 2. Wetness diffuses into dry land through separable box blurs, with
//!    direct water re-pinned at 1 after every blur.
//! 3. A low-frequency moisture field modulates the result.
//! 4. Absorbent materials above the dry threshold may turn into their wet
//!    variant, keeping their color index.
//!
//! Work is counted in lines: one row per unit for seeding and wetting, one
//! row or column per unit for each half of a blur.

use tracing::{debug, info};

use crate::cells::CellData;
use crate::context::{purpose, GenerationContext};
use crate::material::{PackedPixel, TAG_ABSORBENT};
use crate::noise::{hash01, NoiseProvider};
use crate::progress::{step_budget, PassStep, Progress, Stage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Seed,
    BlurRows(u32),
    BlurColumns(u32),
    Wet,
}

/// Resumable hydration pass.
pub struct HydrationPass {
    moisture: NoiseProvider,
    phase: Phase,
    line: usize,
    completed: usize,
    total: usize,
    wetness: Vec<f32>,
    scratch: Vec<f32>,
    direct: Vec<bool>,
    data: Option<CellData>,
}

impl HydrationPass {
    /// Takes ownership of the eroded grids.
    #[must_use]
    pub fn new(ctx: &GenerationContext, data: CellData) -> Self {
        let area = data.pixel_data.len();
        let (width, height) = (data.width as usize, data.height as usize);
        let passes = ctx.params.hydration.blur_passes as usize;

        Self {
            moisture: ctx.noise(purpose::MOISTURE),
            phase: Phase::Seed,
            line: 0,
            completed: 0,
            total: height * 2 + passes * (width + height),
            wetness: vec![0.0; area],
            scratch: vec![0.0; area],
            direct: vec![false; area],
            data: Some(data),
        }
    }

    /// Processes the next batch of lines.
    pub fn step(&mut self, ctx: &GenerationContext) -> PassStep<CellData> {
        let Some(mut data) = self.data.take() else {
            return PassStep::Pending(Progress::new(Stage::Hydration, 0, 0));
        };

        let mut budget = step_budget(self.total);
        while budget > 0 {
            let lines = self.phase_lines(&data);
            if self.line >= lines {
                if !self.advance(ctx) {
                    info!("Hydration pass complete: {} lines", self.total);
                    return PassStep::Done(data);
                }
                continue;
            }

            match self.phase {
                Phase::Seed => self.seed_row(ctx, &mut data, self.line),
                Phase::BlurRows(_) => self.blur_row(ctx, &data, self.line),
                Phase::BlurColumns(_) => self.blur_column(ctx, &data, self.line),
                Phase::Wet => self.wet_row(ctx, &mut data, self.line),
            }
            self.line += 1;
            self.completed += 1;
            budget -= 1;
        }

        debug!("Hydration pass: {}/{}", self.completed, self.total);
        self.data = Some(data);
        PassStep::Pending(Progress::new(Stage::Hydration, self.completed, self.total))
    }

    fn phase_lines(&self, data: &CellData) -> usize {
        match self.phase {
            Phase::Seed | Phase::BlurRows(_) | Phase::Wet => data.height as usize,
            Phase::BlurColumns(_) => data.width as usize,
        }
    }

    /// Moves to the next phase; false when the pass is finished.
    fn advance(&mut self, ctx: &GenerationContext) -> bool {
        let passes = ctx.params.hydration.blur_passes;
        self.line = 0;
        self.phase = match self.phase {
            Phase::Seed if passes > 0 => Phase::BlurRows(0),
            Phase::Seed => Phase::Wet,
            Phase::BlurRows(pass) => Phase::BlurColumns(pass),
            Phase::BlurColumns(pass) if pass + 1 < passes => Phase::BlurRows(pass + 1),
            Phase::BlurColumns(_) => Phase::Wet,
            Phase::Wet => return false,
        };
        true
    }

    fn seed_row(&mut self, ctx: &GenerationContext, data: &mut CellData, y: usize) {
        let sea = ctx.params.sea_level;
        let width = data.width as usize;
        for index in y * width..(y + 1) * width {
            let height = f64::from(data.height_data[index]) / 255.0;
            if height < sea {
                data.water_data[index] = water_depth_byte(sea, height);
                self.wetness[index] = 1.0;
                self.direct[index] = true;
            }
        }
    }

    /// Horizontal half of a blur: wetness -> scratch.
    fn blur_row(&mut self, ctx: &GenerationContext, data: &CellData, y: usize) {
        let width = data.width as usize;
        let row = y * width..(y + 1) * width;
        box_blur_line(
            &self.wetness[row.clone()],
            &mut self.scratch[row],
            ctx.params.hydration.blur_radius as usize,
        );
    }

    /// Vertical half of a blur: scratch -> wetness, re-pinning direct water.
    fn blur_column(&mut self, ctx: &GenerationContext, data: &CellData, x: usize) {
        let (width, height) = (data.width as usize, data.height as usize);
        let column: Vec<f32> = (0..height).map(|y| self.scratch[y * width + x]).collect();
        let mut blurred = vec![0.0; height];
        box_blur_line(&column, &mut blurred, ctx.params.hydration.blur_radius as usize);

        for (y, value) in blurred.into_iter().enumerate() {
            let index = y * width + x;
            self.wetness[index] = if self.direct[index] { 1.0 } else { value };
        }
    }

    fn wet_row(&mut self, ctx: &GenerationContext, data: &mut CellData, y: usize) {
        let settings = &ctx.params.hydration;
        let dry = settings.dry_threshold;
        let wetting_seed = ctx.sub_seed(purpose::WETTING);
        let width = data.width as usize;

        for x in 0..width {
            let index = y * width + x;
            let modulation = 0.9 + self.moisture.sample(&ctx.params.moisture, x as f64, y as f64) * 0.3;
            let wetness = (f64::from(self.wetness[index]) * modulation).clamp(0.0, 1.0);
            self.wetness[index] = wetness as f32;

            if wetness <= dry || dry >= 1.0 {
                continue;
            }

            let pixel = PackedPixel(data.pixel_data[index]);
            let material_index = pixel.material_index();
            let absorbent = ctx
                .materials
                .get(material_index)
                .is_some_and(|m| m.has_tag(TAG_ABSORBENT));
            let Some(wet) = ctx.materials.wet_variant_of(material_index).filter(|_| absorbent) else {
                continue;
            };

            let chance = (wetness - dry) / (1.0 - dry) * settings.wetting_chance;
            if hash01(x as i64, y as i64, wetting_seed) < chance {
                data.pixel_data[index] = pixel.with_material(wet).0;
            }
        }
    }
}

/// Water byte of a pixel below sea level; never 0.
#[inline]
#[must_use]
pub fn water_depth_byte(sea_level: f64, height: f64) -> u8 {
    let depth = ((sea_level - height) / sea_level * 255.0).round();
    depth.clamp(1.0, 255.0) as u8
}

/// Box blur of one line with a clamped window (edges average fewer samples).
fn box_blur_line(input: &[f32], output: &mut [f32], radius: usize) {
    let len = input.len();
    if len == 0 {
        return;
    }

    let mut sum: f32 = input[..=radius.min(len - 1)].iter().sum();
    for i in 0..len {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(len - 1);
        output[i] = sum / (hi - lo + 1) as f32;

        // Slide the window to [i + 1 - radius, i + 1 + radius]
        if i + 1 + radius < len {
            sum += input[i + 1 + radius];
        }
        if i >= radius {
            sum -= input[i - radius];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cells::generate_cells;
    use crate::layer::LayerCatalog;
    use crate::material::MaterialCatalog;
    use crate::noise::WorldSeed;
    use crate::params::{GenerationParams, HydrationSettings};

    fn context(params: GenerationParams) -> GenerationContext {
        let materials = MaterialCatalog::builtin();
        let layers = LayerCatalog::builtin(&materials).unwrap();
        GenerationContext::new(WorldSeed::new(21), params, materials, layers)
    }

    fn run(ctx: &GenerationContext, data: CellData) -> CellData {
        let mut pass = HydrationPass::new(ctx, data);
        loop {
            if let PassStep::Done(data) = pass.step(ctx) {
                return data;
            }
        }
    }

    #[test]
    fn test_water_depth_byte() {
        assert_eq!(water_depth_byte(0.5, 0.0), 255);
        assert_eq!(water_depth_byte(0.5, 0.25), 128);
        assert_eq!(water_depth_byte(0.5, 0.4999), 1);
    }

    #[test]
    fn test_box_blur_line() {
        let input = [0.0, 0.0, 3.0, 0.0, 0.0];
        let mut output = [0.0; 5];
        box_blur_line(&input, &mut output, 1);
        assert_eq!(output, [0.0, 1.0, 1.0, 1.0, 0.0]);

        box_blur_line(&input, &mut output, 10);
        assert!(output.iter().all(|v| (*v - 0.6).abs() < 1e-6));
    }

    #[test]
    fn test_water_matches_sea_level() {
        let ctx = context(GenerationParams::default().with_size(80, 80).with_cell_size(8));
        let cells = generate_cells(&ctx);
        let hydrated = run(&ctx, cells.clone());

        assert_eq!(hydrated.height_data, cells.height_data);
        for (height, water) in hydrated.height_data.iter().zip(&hydrated.water_data) {
            let below = f64::from(*height) / 255.0 < ctx.params.sea_level;
            assert_eq!(below, *water > 0);
        }
    }

    #[test]
    fn test_wetting_only_swaps_to_wet_variants() {
        let params = GenerationParams::default()
            .with_size(80, 80)
            .with_cell_size(8)
            .with_sea_level(0.6)
            .with_hydration(HydrationSettings { dry_threshold: 0.0, ..HydrationSettings::default() });
        let ctx = context(params);
        let cells = generate_cells(&ctx);
        let hydrated = run(&ctx, cells.clone());

        let mut changed = 0;
        for (before, after) in cells.pixel_data.iter().zip(&hydrated.pixel_data) {
            let (before, after) = (PackedPixel(*before), PackedPixel(*after));
            if before != after {
                changed += 1;
                assert_eq!(before.color_variant(), after.color_variant());
                assert_eq!(ctx.materials.wet_variant_of(before.material_index()), Some(after.material_index()));
            }
        }
        assert!(changed > 0, "a flooded world should soak some absorbent pixels");
    }

    #[test]
    fn test_no_blur_passes_still_completes() {
        let params = GenerationParams::default()
            .with_size(40, 30)
            .with_hydration(HydrationSettings { blur_passes: 0, ..HydrationSettings::default() });
        let ctx = context(params);
        let hydrated = run(&ctx, generate_cells(&ctx));
        assert_eq!(hydrated.water_data.len(), 40 * 30);
    }
}
