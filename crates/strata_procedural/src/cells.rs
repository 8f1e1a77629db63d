//! # Cell Generation
//!
//! The world is covered by a coarse grid of `cell_size x cell_size` cells.
//! Each cell samples terrain noise once at its centre to get a height and a
//! layer, then every pixel inside the cell rolls its own material from that
//! layer.
//!
//! Cells and chunks are independent grids; neither size has to divide the
//! other or the world size. Pixels of edge cells that fall outside the world
//! are skipped.

use tracing::{debug, info};

use crate::context::{purpose, GenerationContext};
use crate::material::PackedPixel;
use crate::noise::NoiseProvider;
use crate::params::EdgeShaping;
use crate::progress::{step_budget, PassStep, Progress, Stage};

/// Edge noise amplitude added to the shaping blend.
const EDGE_NOISE_AMPLITUDE: f64 = 0.1;

/// Baseline height of valley edges.
const VALLEY_BASELINE: f64 = 0.95;

/// Full-world grids produced by the generation passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellData {
    /// World width in pixels.
    pub width: u32,
    /// World height in pixels.
    pub height: u32,
    /// Side of a generation cell.
    pub cell_size: u32,
    /// Packed material/color byte per pixel, row-major.
    pub pixel_data: Vec<u8>,
    /// Height byte per pixel, row-major.
    pub height_data: Vec<u8>,
    /// Water depth byte per pixel (0 = dry). All zero until hydration.
    pub water_data: Vec<u8>,
    /// Layer index per cell, `cell_layers[cell_y][cell_x]`.
    pub cell_layers: Vec<Vec<usize>>,
}

impl CellData {
    /// Row-major index of an in-world pixel.
    #[inline]
    #[must_use]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Height byte of a cell, read at the cell origin.
    #[must_use]
    pub fn cell_height(&self, cell_x: usize, cell_y: usize) -> Option<u8> {
        let x = u32::try_from(cell_x).ok()?.checked_mul(self.cell_size)?;
        let y = u32::try_from(cell_y).ok()?.checked_mul(self.cell_size)?;
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.height_data[self.index(x, y)])
    }
}

/// Resumable cell generation.
pub struct CellPass {
    terrain: NoiseProvider,
    material: NoiseProvider,
    detail: NoiseProvider,
    edge: NoiseProvider,
    columns: usize,
    rows: usize,
    next_cell: usize,
    data: CellData,
}

impl CellPass {
    /// Prepares an empty world grid.
    #[must_use]
    pub fn new(ctx: &GenerationContext) -> Self {
        let params = &ctx.params;
        let (columns, rows) = params.cell_grid();
        let (columns, rows) = (columns as usize, rows as usize);
        let area = params.area();

        Self {
            terrain: ctx.noise(purpose::TERRAIN),
            material: ctx.noise(purpose::MATERIAL),
            detail: ctx.noise(purpose::MATERIAL_DETAIL),
            edge: ctx.noise(purpose::EDGE),
            columns,
            rows,
            next_cell: 0,
            data: CellData {
                width: params.width,
                height: params.height,
                cell_size: params.cell_size.max(1),
                pixel_data: vec![0; area],
                height_data: vec![0; area],
                water_data: vec![0; area],
                cell_layers: vec![vec![0; columns]; rows],
            },
        }
    }

    /// Generates the next batch of cells.
    pub fn step(&mut self, ctx: &GenerationContext) -> PassStep<CellData> {
        let total = self.columns * self.rows;
        let end = (self.next_cell + step_budget(total)).min(total);

        for cell in self.next_cell..end {
            self.generate_cell(ctx, cell % self.columns, cell / self.columns);
        }
        self.next_cell = end;

        if self.next_cell < total {
            debug!("Cell pass: {}/{}", self.next_cell, total);
            return PassStep::Pending(Progress::new(Stage::Cells, self.next_cell, total));
        }

        info!("Cell pass complete: {} cells", total);
        PassStep::Done(std::mem::replace(&mut self.data, empty_cells()))
    }

    fn generate_cell(&mut self, ctx: &GenerationContext, cell_x: usize, cell_y: usize) {
        let size = self.data.cell_size;
        let centre_x = f64::from(cell_x as u32 * size) + f64::from(size) / 2.0;
        let centre_y = f64::from(cell_y as u32 * size) + f64::from(size) / 2.0;

        let height = self.cell_height(ctx, centre_x, centre_y);
        let layer = ctx.layers.nearest(height);
        self.data.cell_layers[cell_y][cell_x] = layer;

        let height_byte = to_byte(height);
        let x0 = cell_x as u32 * size;
        let y0 = cell_y as u32 * size;
        let x1 = x0.saturating_add(size).min(self.data.width);
        let y1 = y0.saturating_add(size).min(self.data.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let (fx, fy) = (f64::from(x), f64::from(y));
                let roll = self.material.sample(&ctx.params.material, fx, fy).clamp(0.0, 1.0);
                let material = ctx.layers.roll_material(layer, roll);
                let colors = ctx.materials.get(material).map_or(1, |m| m.color_count());
                let detail = self.detail.sample(&ctx.params.material_detail, fx, fy);
                let variant = pick_variant(detail, colors);

                let index = self.data.index(x, y);
                self.data.pixel_data[index] = PackedPixel::encode(material, variant).0;
                self.data.height_data[index] = height_byte;
            }
        }
    }

    fn cell_height(&self, ctx: &GenerationContext, x: f64, y: f64) -> f64 {
        let params = &ctx.params;
        let raw = self.terrain.sample(&params.terrain, x, y).clamp(0.0, 1.0);
        let contrasted = (0.5 + (raw - 0.5) * params.intensity).clamp(0.0, 1.0);
        let curved = libm::pow(contrasted, params.height_curve).clamp(0.0, 1.0);

        let baseline = match params.edge_shaping {
            EdgeShaping::None => return curved,
            EdgeShaping::Island => params.sea_level * 0.5,
            EdgeShaping::Valley => VALLEY_BASELINE,
        };

        let width = f64::from(params.width);
        let height = f64::from(params.height);
        let half_short_side = (width.min(height) / 2.0).max(1.0);
        let edge_distance = x.min(y).min(width - x).min(height - y).max(0.0) / half_short_side;

        let band = params.shaping_band.max(f64::EPSILON);
        let jitter = (self.edge.sample(&params.edge, x, y) - 0.5) * EDGE_NOISE_AMPLITUDE;
        let t = (smoothstep((edge_distance / band).clamp(0.0, 1.0)) + jitter).clamp(0.0, 1.0);

        (baseline + (curved - baseline) * t).clamp(params.lowest_depth, 1.0)
    }
}

/// Runs the cell pass to completion.
#[must_use]
pub fn generate_cells(ctx: &GenerationContext) -> CellData {
    let mut pass = CellPass::new(ctx);
    loop {
        if let PassStep::Done(data) = pass.step(ctx) {
            return data;
        }
    }
}

/// Color variant from a detail sample in [0, 1].
#[inline]
pub(crate) fn pick_variant(sample: f64, colors: usize) -> u8 {
    let colors = colors.max(1);
    ((sample.clamp(0.0, 1.0) * colors as f64) as usize).min(colors - 1) as u8
}

/// Normalized height to a byte.
#[inline]
pub(crate) fn to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn empty_cells() -> CellData {
    CellData {
        width: 0,
        height: 0,
        cell_size: 1,
        pixel_data: Vec::new(),
        height_data: Vec::new(),
        water_data: Vec::new(),
        cell_layers: Vec::new(),
    }
}
