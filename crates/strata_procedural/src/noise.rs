//! # Seeded Noise
//!
//! Deterministic 2D noise fields for every generation pass.
//!
//! ## Kinds
//!
//! - **Perlin**: multi-octave value noise with persistence falloff
//! - **Ridged**: inverted absolute value per octave, for ridge lines
//! - **Worley**: distance to the nearest feature point
//! - **Voronoi**: hashed identity of the nearest feature point's cell
//!
//! ## Determinism Guarantee
//!
//! Given the same `WorldSeed` and `NoiseSettings`, every sample is
//! **exactly** the same on any platform, any time. The permutation table is
//! derived from the seed, never from a global RNG, and sampling uses only
//! the correctly rounded IEEE operations (`+ - * / sqrt floor`). Platform
//! libm functions (`hypot`, `powf`, `exp`, trig) differ in the last bit
//! between C runtimes and are not allowed here; passes that need them call
//! the pure Rust `libm` crate.

use serde::{Deserialize, Serialize};

/// World seed for deterministic generation.
///
/// All procedural generation derives from this seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Creates a new world seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (e.g., erosion noise).
    ///
    /// Uses a hash function to create independent streams from one seed.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Noise algorithm with its kind-specific options.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NoiseKind {
    /// Fractal value noise.
    Perlin,
    /// Ridged fractal noise.
    Ridged,
    /// Nearest feature point distance.
    Worley {
        /// Feature points scattered in each unit cell (at least 1 is used).
        points_per_cell: u32,
    },
    /// Nearest feature point cell value.
    Voronoi {
        /// Feature points scattered in each unit cell (at least 1 is used).
        points_per_cell: u32,
    },
}

const fn default_octaves() -> u32 {
    4
}

const fn default_persistence() -> f64 {
    0.5
}

/// Full description of one noise field.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseSettings {
    /// Algorithm and its options.
    #[serde(flatten)]
    pub kind: NoiseKind,
    /// Frequency applied to world pixel coordinates.
    pub scale: f64,
    /// Number of fractal octaves (0 is treated as 1).
    #[serde(default = "default_octaves")]
    pub octaves: u32,
    /// Amplitude decay per octave.
    #[serde(default = "default_persistence")]
    pub persistence: f64,
}

impl NoiseSettings {
    /// Fractal value noise settings.
    #[must_use]
    pub const fn perlin(scale: f64, octaves: u32, persistence: f64) -> Self {
        Self { kind: NoiseKind::Perlin, scale, octaves, persistence }
    }

    /// Ridged noise settings.
    #[must_use]
    pub const fn ridged(scale: f64, octaves: u32, persistence: f64) -> Self {
        Self { kind: NoiseKind::Ridged, scale, octaves, persistence }
    }

    /// Single-octave Worley settings.
    #[must_use]
    pub const fn worley(scale: f64, points_per_cell: u32) -> Self {
        Self {
            kind: NoiseKind::Worley { points_per_cell },
            scale,
            octaves: 1,
            persistence: 0.5,
        }
    }

    /// Single-octave Voronoi settings.
    #[must_use]
    pub const fn voronoi(scale: f64, points_per_cell: u32) -> Self {
        Self {
            kind: NoiseKind::Voronoi { points_per_cell },
            scale,
            octaves: 1,
            persistence: 0.5,
        }
    }
}

/// Largest distance to a feature point inside a 3x3 neighbourhood, in unit
/// cells, used to normalize Worley output.
const WORLEY_MAX_DISTANCE: f64 = 1.5;

/// Pre-computed permutation table for lattice values.
///
/// This is computed once from the seed and reused.
struct PermutationTable {
    /// 512-entry permutation table (256 entries, doubled for overflow handling).
    perm: [u8; 512],
}

impl PermutationTable {
    /// Creates a new permutation table from a seed.
    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];

        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates shuffle with xorshift64; the state must never be zero
        let mut rng_state = splitmix64(seed.value()) | 1;
        for i in (1..256).rev() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 7;
            rng_state ^= rng_state << 17;

            let j = (rng_state as usize) % (i + 1);
            perm.swap(i, j);
        }

        for i in 0..256 {
            perm[256 + i] = perm[i];
        }

        Self { perm }
    }

    /// Gets a permutation value (with automatic wrapping).
    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }
}

/// Seeded noise source.
///
/// Holds only seed-derived state, so `sample` is a pure function of
/// `(seed, settings, x, y)`.
///
/// # Example
///
/// ```rust,ignore
/// let noise = NoiseProvider::new(WorldSeed::new(42));
/// let settings = NoiseSettings::perlin(0.01, 4, 0.5);
///
/// let value = noise.sample(&settings, 100.0, 200.0);
/// assert!((0.0..=1.0).contains(&value));
/// ```
pub struct NoiseProvider {
    perm_table: PermutationTable,
    salt: u64,
}

impl NoiseProvider {
    /// Creates a new noise provider from a seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
            salt: splitmix64(seed.value()),
        }
    }

    /// Samples the configured noise field at world coordinates.
    ///
    /// # Returns
    ///
    /// A value in the range [0, 1].
    #[must_use]
    pub fn sample(&self, settings: &NoiseSettings, x: f64, y: f64) -> f64 {
        let sx = x * settings.scale;
        let sy = y * settings.scale;

        let value = match settings.kind {
            NoiseKind::Perlin => self.fractal(settings, sx, sy, |n, x, y, octave| {
                n.value_noise(x, y, octave)
            }),
            NoiseKind::Ridged => self.fractal(settings, sx, sy, |n, x, y, octave| {
                let ridge = 1.0 - (n.value_noise(x, y, octave) * 2.0 - 1.0).abs();
                ridge * ridge
            }),
            NoiseKind::Worley { points_per_cell } => {
                self.fractal(settings, sx, sy, |n, x, y, octave| {
                    let (distance, _) = n.nearest_feature(x, y, points_per_cell, octave);
                    (distance / WORLEY_MAX_DISTANCE).min(1.0)
                })
            }
            NoiseKind::Voronoi { points_per_cell } => {
                self.fractal(settings, sx, sy, |n, x, y, octave| {
                    let (_, cell_hash) = n.nearest_feature(x, y, points_per_cell, octave);
                    unit_interval(cell_hash)
                })
            }
        };

        value.clamp(0.0, 1.0)
    }

    /// Sums octaves of a base field and normalizes by total amplitude.
    #[inline]
    fn fractal<F>(&self, settings: &NoiseSettings, x: f64, y: f64, base: F) -> f64
    where
        F: Fn(&Self, f64, f64, u32) -> f64,
    {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for octave in 0..settings.octaves.max(1) {
            total += base(self, x * frequency, y * frequency, octave) * amplitude;
            max_amplitude += amplitude;
            amplitude *= settings.persistence;
            frequency *= 2.0;
        }

        if max_amplitude <= 0.0 {
            0.0
        } else {
            total / max_amplitude
        }
    }

    /// Lattice value in [0, 1] at an integer grid point.
    #[inline]
    fn lattice(&self, ix: i64, iy: i64, octave: u32) -> f64 {
        let ii = (ix & 255) as usize;
        let jj = (iy & 255) as usize;
        let oo = (octave as usize).wrapping_mul(57);
        let hash = self.perm_table.get(ii + self.perm_table.get(jj + oo) as usize);
        f64::from(hash) / 255.0
    }

    /// Smoothly interpolated lattice noise in [0, 1].
    fn value_noise(&self, x: f64, y: f64, octave: u32) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let ix = x0 as i64;
        let iy = y0 as i64;

        let u = fade(x - x0);
        let v = fade(y - y0);

        let a = self.lattice(ix, iy, octave);
        let b = self.lattice(ix + 1, iy, octave);
        let c = self.lattice(ix, iy + 1, octave);
        let d = self.lattice(ix + 1, iy + 1, octave);

        lerp(lerp(a, b, u), lerp(c, d, u), v)
    }

    /// Finds the nearest feature point in the 3x3 cell neighbourhood.
    ///
    /// Returns the distance and the hash identifying the winning cell.
    fn nearest_feature(&self, x: f64, y: f64, points_per_cell: u32, octave: u32) -> (f64, u64) {
        let points = points_per_cell.max(1);
        let cell_x = x.floor() as i64;
        let cell_y = y.floor() as i64;
        let salt = self.salt ^ u64::from(octave).wrapping_mul(0x9E37_79B9_7F4A_7C15);

        let mut best_distance = f64::MAX;
        let mut best_hash = 0u64;

        for dy in -1..=1 {
            for dx in -1..=1 {
                let gx = cell_x + dx;
                let gy = cell_y + dy;
                let cell_hash = hash_coords(gx, gy, salt);

                for k in 0..u64::from(points) {
                    let hx = splitmix64(cell_hash ^ (k << 1));
                    let hy = splitmix64(cell_hash ^ ((k << 1) | 1));
                    let px = gx as f64 + unit_interval(hx);
                    let py = gy as f64 + unit_interval(hy);

                    let (ox, oy) = (px - x, py - y);
                    let distance = (ox * ox + oy * oy).sqrt();
                    if distance < best_distance {
                        best_distance = distance;
                        best_hash = cell_hash;
                    }
                }
            }
        }

        (best_distance, best_hash)
    }
}

/// Samples a noise field without keeping a provider around.
///
/// Pure function of its inputs; prefer a cached `NoiseProvider` in loops.
#[must_use]
pub fn noise(settings: &NoiseSettings, x: f64, y: f64, seed: WorldSeed) -> f64 {
    NoiseProvider::new(seed).sample(settings, x, y)
}

/// Deterministic per-coordinate roll in [0, 1).
///
/// Used where a pass needs a probability check without hidden randomness.
#[inline]
#[must_use]
pub fn hash01(x: i64, y: i64, seed: WorldSeed) -> f64 {
    unit_interval(hash_coords(x, y, splitmix64(seed.value())))
}

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn hash_coords(x: i64, y: i64, salt: u64) -> u64 {
    splitmix64(splitmix64((x as u64) ^ salt) ^ (y as u64))
}

/// Maps the top 53 bits of a hash to [0, 1).
#[inline]
fn unit_interval(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Quintic fade curve.
#[inline]
fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> [NoiseSettings; 4] {
        [
            NoiseSettings::perlin(0.05, 4, 0.5),
            NoiseSettings::ridged(0.05, 3, 0.5),
            NoiseSettings::worley(0.05, 2),
            NoiseSettings::voronoi(0.05, 1),
        ]
    }

    #[test]
    fn test_determinism() {
        let seed = WorldSeed::new(12345);
        let noise1 = NoiseProvider::new(seed);
        let noise2 = NoiseProvider::new(seed);

        for settings in all_kinds() {
            for i in 0..100 {
                let x = f64::from(i) * 3.1;
                let y = f64::from(i) * 1.7;
                assert_eq!(
                    noise1.sample(&settings, x, y),
                    noise2.sample(&settings, x, y),
                    "Noise should be deterministic for {:?}",
                    settings.kind
                );
            }
        }
    }

    #[test]
    fn test_free_function_matches_provider() {
        let seed = WorldSeed::new(9);
        let provider = NoiseProvider::new(seed);
        let settings = NoiseSettings::ridged(0.02, 4, 0.6);

        assert_eq!(
            noise(&settings, 17.0, -4.0, seed),
            provider.sample(&settings, 17.0, -4.0)
        );
    }

    #[test]
    fn test_different_seeds_different_results() {
        let settings = NoiseSettings::perlin(0.05, 4, 0.5);
        let noise1 = NoiseProvider::new(WorldSeed::new(1));
        let noise2 = NoiseProvider::new(WorldSeed::new(2));

        let differs = (0..50).any(|i| {
            let x = f64::from(i) * 7.3;
            noise1.sample(&settings, x, x * 0.5) != noise2.sample(&settings, x, x * 0.5)
        });
        assert!(differs, "Different seeds should produce different results");
    }

    #[test]
    fn test_range() {
        let provider = NoiseProvider::new(WorldSeed::new(42));

        for settings in all_kinds() {
            for i in 0..5000 {
                let x = f64::from(i) * 0.37 - 500.0;
                let y = f64::from(i) * 0.53 - 650.0;
                let value = provider.sample(&settings, x, y);

                assert!(
                    (0.0..=1.0).contains(&value),
                    "Value {value} out of range at ({x}, {y}) for {:?}",
                    settings.kind
                );
            }
        }
    }

    #[test]
    fn test_continuity() {
        let provider = NoiseProvider::new(WorldSeed::new(42));
        let settings = NoiseSettings::perlin(0.01, 1, 0.5);

        let v1 = provider.sample(&settings, 100.0, 100.0);
        let v2 = provider.sample(&settings, 100.01, 100.0);
        let v3 = provider.sample(&settings, 100.0, 100.01);

        assert!((v1 - v2).abs() < 0.01, "Noise should be continuous");
        assert!((v1 - v3).abs() < 0.01, "Noise should be continuous");
    }

    #[test]
    fn test_worley_zero_points_per_cell() {
        let provider = NoiseProvider::new(WorldSeed::new(3));
        let zero = NoiseSettings::worley(0.1, 0);
        let one = NoiseSettings::worley(0.1, 1);

        for i in 0..200 {
            let x = f64::from(i) * 1.3;
            let value = provider.sample(&zero, x, x * 0.7);
            assert!(value.is_finite());
            assert_eq!(value, provider.sample(&one, x, x * 0.7));
        }
    }

    #[test]
    fn test_worley_is_zero_near_feature_points() {
        let provider = NoiseProvider::new(WorldSeed::new(11));
        let settings = NoiseSettings::worley(1.0, 4);

        // With 4 points per unit cell the minimum over a fine grid gets close to 0
        let mut min = 1.0f64;
        for i in 0..100 {
            for j in 0..100 {
                let value = provider.sample(&settings, f64::from(i) * 0.05, f64::from(j) * 0.05);
                min = min.min(value);
            }
        }
        assert!(min < 0.05, "Worley minimum {min} should approach 0");
    }

    #[test]
    fn test_seed_derivation() {
        let base = WorldSeed::new(42);
        let derived1 = base.derive(1);
        let derived2 = base.derive(2);
        let derived1_again = base.derive(1);

        assert_ne!(derived1, derived2, "Different purposes should give different seeds");
        assert_eq!(derived1, derived1_again, "Same purpose should give same seed");
        assert_ne!(derived1, base, "Derived seed should differ from base");
    }

    #[test]
    fn test_zero_seed_is_not_degenerate() {
        let provider = NoiseProvider::new(WorldSeed::new(0));
        let settings = NoiseSettings::perlin(0.1, 1, 0.5);

        let first = provider.sample(&settings, 0.5, 0.5);
        let varies = (1..100).any(|i| {
            let x = f64::from(i) * 2.7;
            (provider.sample(&settings, x, x) - first).abs() > 1e-6
        });
        assert!(varies, "Seed 0 must still shuffle the permutation table");
    }

    #[test]
    fn test_hash01_range_and_determinism() {
        let seed = WorldSeed::new(77);
        for i in -50..50 {
            let a = hash01(i, i * 3, seed);
            assert!((0.0..1.0).contains(&a));
            assert_eq!(a, hash01(i, i * 3, seed));
        }
    }

    #[test]
    fn test_settings_from_toml() {
        let settings: NoiseSettings =
            toml::from_str("kind = \"worley\"\npoints_per_cell = 3\nscale = 0.2\n").unwrap();
        assert_eq!(settings.kind, NoiseKind::Worley { points_per_cell: 3 });
        assert_eq!(settings.octaves, 4);
        assert!((settings.persistence - 0.5).abs() < f64::EPSILON);
    }
}
