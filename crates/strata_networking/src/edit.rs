//! # Local Edits
//!
//! Carves craters into the local world and produces the message that
//! replicates the edit to peers.
//!
//! ## Message Choice
//!
//! Small edits go out as a sparse `ChunkPatch`. Once the change set covers
//! more than `full_chunk_ratio` of the chunk, the whole chunk is sent
//! instead since the patch list would be larger than the payload.
//!
//! ## Stamping
//!
//! Every field an edit changes is stamped `(chunk.version + 1, origin)`.
//! The chunk version is the highest version the peer has seen, so a local
//! edit always beats what it overwrites, and two peers editing the same
//! pixel at the same version are ordered by origin.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_procedural::{ChunkCoord, PackedPixel, PixelField, World};
use strata_shared::{ChunkMessage, EditStamp, PixelPatch};
use tracing::debug;

/// Crater shape and message thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditorConfig {
    /// Crater radius in pixels.
    pub crater_radius: u32,
    /// Height removed per edited pixel.
    pub height_step: u8,
    /// Changed fraction of the chunk above which a full chunk is sent.
    pub full_chunk_ratio: f32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            crater_radius: 3,
            height_step: 8,
            full_chunk_ratio: 0.25,
        }
    }
}

/// Applies local edits and builds their outbound messages.
///
/// Edit effects are cosmetic and use a session RNG, never the world seed.
pub struct ChunkEditor {
    origin: u32,
    rng: ChaCha8Rng,
    config: EditorConfig,
}

impl ChunkEditor {
    /// Creates an editor with the default crater.
    ///
    /// `origin` identifies this peer in edit stamps and must differ between
    /// peers of one session.
    #[must_use]
    pub fn new(origin: u32, session_seed: u64) -> Self {
        Self::with_config(origin, session_seed, EditorConfig::default())
    }

    /// Creates an editor with a custom crater.
    #[must_use]
    pub fn with_config(origin: u32, session_seed: u64, config: EditorConfig) -> Self {
        Self {
            origin,
            rng: ChaCha8Rng::seed_from_u64(session_seed),
            config,
        }
    }

    /// Peer id stamped on this editor's writes.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> u32 {
        self.origin
    }

    /// Current configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Carves a crater centred on a world pixel.
    ///
    /// The crater is clipped to the chunk containing the centre and to the
    /// world. Returns `None` when the pixel is outside the world, its chunk
    /// is not baked yet, or the edit changed nothing. Otherwise the chunk
    /// version has been bumped and the returned message carries it.
    pub fn request_edit_at(&mut self, world: &mut World, x: i32, y: i32) -> Option<ChunkMessage> {
        let (coord, _) = world.locate(x, y)?;
        world.chunk(coord)?;

        let hardest = world.materials().hardest();
        let colors = world
            .materials()
            .get(hardest)
            .map_or(1, |m| m.color_count())
            .clamp(1, 4);
        let targets = crater_indices(world, coord, x, y, self.config.crater_radius);

        let step = self.config.height_step;
        let variants: Vec<u8> = targets
            .iter()
            .map(|_| self.rng.gen_range(0..colors) as u8)
            .collect();

        let chunk = world.chunk_mut(coord)?;
        let stamp = EditStamp::new(chunk.version + 1, self.origin);
        let mut patches = Vec::with_capacity(targets.len());
        for (&index, &variant) in targets.iter().zip(&variants) {
            let mut patch = PixelPatch::at(index as u32);

            let pixel = PackedPixel::encode(hardest, variant).0;
            if chunk.pixel_data[index] != pixel && chunk.write_field(PixelField::Pixel, index, pixel, stamp) {
                patch.pixel = Some(pixel);
            }
            let height = chunk.height_data[index].saturating_sub(step);
            if chunk.height_data[index] != height && chunk.write_field(PixelField::Height, index, height, stamp) {
                patch.height = Some(height);
            }

            if !patch.is_empty() {
                patches.push(patch);
            }
        }

        if patches.is_empty() {
            return None;
        }

        let threshold = f64::from(self.config.full_chunk_ratio) * chunk.area() as f64;
        debug!(
            "Edit at ({}, {}) changed {} pixels in chunk [{},{}] -> v{}",
            x,
            y,
            patches.len(),
            coord.x,
            coord.y,
            chunk.version
        );

        if patches.len() as f64 > threshold {
            Some(ChunkMessage::ChunkUpdate { chunk: chunk.to_network() })
        } else {
            Some(ChunkMessage::ChunkPatch {
                position: coord.into(),
                version: chunk.version,
                origin: self.origin,
                patches,
            })
        }
    }
}

/// Local indices of in-world pixels within `radius` of the centre that lie
/// in the centre's chunk.
fn crater_indices(world: &World, coord: ChunkCoord, x: i32, y: i32, radius: u32) -> Vec<usize> {
    let r = radius as i32;
    let mut indices = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            match world.locate(x + dx, y + dy) {
                Some((c, index)) if c == coord => indices.push(index),
                _ => {}
            }
        }
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_procedural::{GenerationParams, WorldSeed};

    fn small_world() -> World {
        let params = GenerationParams::default()
            .with_size(128, 128)
            .with_cell_size(16)
            .with_chunk_size(32);
        let mut world = World::new(WorldSeed::new(9), params).unwrap();
        world.generate_blocking();
        world
    }

    #[test]
    fn test_crater_is_clipped_to_chunk() {
        let world = small_world();
        let coord = ChunkCoord::new(0, 0);
        // Centre on the corner pixel: only the in-chunk quarter remains
        let indices = crater_indices(&world, coord, 0, 0, 3);
        assert!(!indices.is_empty());
        assert!(indices.len() < 29);
        for index in indices {
            assert!(index % 32 <= 3 && index / 32 <= 3);
        }
    }

    #[test]
    fn test_edit_bumps_version_and_patches() {
        let mut world = small_world();
        let mut editor = ChunkEditor::new(7, 1);
        let message = editor.request_edit_at(&mut world, 40, 40).unwrap();

        let coord = ChunkCoord::new(1, 1);
        let chunk = world.chunk(coord).unwrap();
        assert_eq!(chunk.version, 1);
        match message {
            ChunkMessage::ChunkPatch { position, version, origin, patches } => {
                assert_eq!(ChunkCoord::from(position), coord);
                assert_eq!((version, origin), (1, 7));
                assert!(!patches.is_empty());
                let hardest = world.materials().hardest();
                for patch in patches {
                    if let Some(pixel) = patch.pixel {
                        assert_eq!(PackedPixel(pixel).material_index(), hardest);
                    }
                    if patch.height.is_some() {
                        let stamp = chunk.field_stamp(PixelField::Height, patch.index as usize);
                        assert_eq!(stamp, Some(EditStamp::new(1, 7)));
                    }
                }
            }
            ChunkMessage::ChunkUpdate { .. } => panic!("small crater must patch"),
        }
    }

    #[test]
    fn test_large_edit_sends_full_chunk() {
        let mut world = small_world();
        let config = EditorConfig { full_chunk_ratio: 0.0, ..EditorConfig::default() };
        let mut editor = ChunkEditor::with_config(1, 1, config);
        let message = editor.request_edit_at(&mut world, 40, 40).unwrap();

        match message {
            ChunkMessage::ChunkUpdate { chunk } => {
                assert_eq!(chunk.version, 1);
                assert_eq!(chunk.size, 32);
            }
            ChunkMessage::ChunkPatch { .. } => panic!("zero ratio must send the chunk"),
        }
    }

    #[test]
    fn test_second_edit_outranks_the_first() {
        let mut world = small_world();
        let mut editor = ChunkEditor::new(3, 1);
        editor.request_edit_at(&mut world, 40, 40).unwrap();
        editor.request_edit_at(&mut world, 40, 40).unwrap();

        let chunk = world.chunk(ChunkCoord::new(1, 1)).unwrap();
        assert_eq!(chunk.version, 2);
        let (_, centre) = world.locate(40, 40).unwrap();
        if chunk.height_data[centre] > 0 {
            assert_eq!(chunk.field_stamp(PixelField::Height, centre), Some(EditStamp::new(2, 3)));
        }
    }

    #[test]
    fn test_edit_outside_world_is_none() {
        let mut world = small_world();
        let mut editor = ChunkEditor::new(1, 1);
        assert!(editor.request_edit_at(&mut world, -1, 10).is_none());
        assert!(editor.request_edit_at(&mut world, 10, 128).is_none());
    }

    #[test]
    fn test_edit_before_bake_is_none() {
        let params = GenerationParams::default().with_size(64, 64).with_cell_size(16).with_chunk_size(32);
        let mut world = World::new(WorldSeed::new(9), params).unwrap();
        let mut editor = ChunkEditor::new(1, 1);
        assert!(editor.request_edit_at(&mut world, 5, 5).is_none());
    }
}
