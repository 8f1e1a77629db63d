//! # Region Classification
//!
//! Groups baked chunks into named regions:
//!
//! 1. Flood-fill 4-connected chunks sharing a dominant layer.
//! 2. Drop candidates of 5 chunks or fewer, classify the rest by water
//!    ratio and layer name.
//! 3. Give every chunk left unclassified the name of the nearest
//!    classified chunk (expanding Chebyshev rings), or plains if the world
//!    has none.
//! 4. Flood-fill the completed name grid again into the final regions.
//!
//! Every baked chunk ends up in exactly one region.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunk::{ChunkCoord, ChunkGrid};

/// Region names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Mostly water.
    Ocean,
    /// Partly flooded low sediment.
    Shore,
    /// Steep colluvium.
    Cliffs,
    /// Summit layers.
    Mountains,
    /// Soil and substrate.
    Plains,
}

impl RegionKind {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ocean => "ocean",
            Self::Shore => "shore",
            Self::Cliffs => "cliffs",
            Self::Mountains => "mountains",
            Self::Plains => "plains",
        }
    }

    /// Classifies a candidate region by water ratio and layer name.
    ///
    /// Returns `None` when no rule matches.
    #[must_use]
    pub fn classify(water_ratio: f64, layer_name: &str) -> Option<Self> {
        let layer = layer_name.to_ascii_lowercase();
        if water_ratio >= OCEAN_WATER_RATIO {
            Some(Self::Ocean)
        } else if water_ratio > 0.0 && (layer.contains("alluvium") || layer.contains("sediment")) {
            Some(Self::Shore)
        } else if layer.contains("colluvium") {
            Some(Self::Cliffs)
        } else if layer.contains("summit") {
            Some(Self::Mountains)
        } else if ["soil", "substrate", "foundation"].iter().any(|k| layer.contains(k)) {
            Some(Self::Plains)
        } else {
            None
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Water ratio at or above which a region is ocean.
pub const OCEAN_WATER_RATIO: f64 = 0.9;

/// Candidates with this many chunks or fewer are discarded.
pub const MIN_REGION_CHUNKS: usize = 5;

/// Inclusive chunk-coordinate bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBounds {
    /// Smallest column and row.
    pub min: ChunkCoord,
    /// Largest column and row.
    pub max: ChunkCoord,
}

impl RegionBounds {
    fn around(coord: ChunkCoord) -> Self {
        Self { min: coord, max: coord }
    }

    fn include(&mut self, coord: ChunkCoord) {
        self.min.x = self.min.x.min(coord.x);
        self.min.y = self.min.y.min(coord.y);
        self.max.x = self.max.x.max(coord.x);
        self.max.y = self.max.y.max(coord.y);
    }
}

/// A named group of contiguous chunks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Sequential id.
    pub id: u32,
    /// Region name.
    pub name: RegionKind,
    /// Most frequent dominant layer of its chunks.
    pub layer_name: String,
    /// Bounding box in chunk coordinates.
    pub bounds: RegionBounds,
    /// Member chunks.
    pub chunk_coords: Vec<ChunkCoord>,
    /// Number of chunks.
    pub area: usize,
}

/// Flood-fill classifier over a chunk grid.
pub struct RegionClassifier<'a> {
    grid: &'a ChunkGrid,
    columns: usize,
}

impl<'a> RegionClassifier<'a> {
    /// Creates a classifier for a grid.
    #[must_use]
    pub fn new(grid: &'a ChunkGrid) -> Self {
        Self { grid, columns: grid.columns() as usize }
    }

    /// Classifies every baked chunk.
    #[must_use]
    pub fn classify(&self) -> Vec<Region> {
        let slots = self.grid.capacity();
        if self.grid.baked_count() == 0 {
            return Vec::new();
        }

        // 1-2. Candidate regions by dominant layer
        let mut names: Vec<Option<RegionKind>> = vec![None; slots];
        let candidates = self.flood_fill(|a, b| {
            let (a, b) = (self.grid.get(a), self.grid.get(b));
            matches!((a, b), (Some(a), Some(b)) if a.dominant_layer == b.dominant_layer)
        });
        let mut discarded = 0;
        for members in &candidates {
            if members.len() <= MIN_REGION_CHUNKS {
                discarded += 1;
                continue;
            }
            let layer = self.grid.get(members[0]).map_or("", |c| c.dominant_layer.as_str());
            if let Some(kind) = RegionKind::classify(self.water_ratio(members), layer) {
                for coord in members {
                    names[self.slot(*coord)] = Some(kind);
                }
            }
        }

        // 3. Fill the gaps from what was classified originally
        let classified = names.clone();
        let has_classified = classified.iter().any(Option::is_some);
        if !has_classified {
            warn!("No classified chunks among {}, filling with plains", self.grid.baked_count());
        }
        for chunk in self.grid.iter() {
            let slot = self.slot(chunk.coord);
            if names[slot].is_none() {
                names[slot] = Some(if has_classified {
                    self.nearest_classified(chunk.coord, &classified).unwrap_or(RegionKind::Plains)
                } else {
                    RegionKind::Plains
                });
            }
        }

        // 4. Final regions from the completed name grid
        let regions: Vec<Region> = self
            .flood_fill(|a, b| {
                self.grid.contains(a)
                    && self.grid.contains(b)
                    && names[self.slot(a)].is_some()
                    && names[self.slot(a)] == names[self.slot(b)]
            })
            .into_iter()
            .enumerate()
            .map(|(id, members)| {
                let name = names[self.slot(members[0])].unwrap_or(RegionKind::Plains);
                self.build_region(id as u32, name, members)
            })
            .collect();

        info!(
            "Classified {} regions ({} candidates, {} discarded)",
            regions.len(),
            candidates.len(),
            discarded
        );
        regions
    }

    fn slot(&self, coord: ChunkCoord) -> usize {
        coord.y as usize * self.columns + coord.x as usize
    }

    /// 4-connected components of baked chunks, seeded in row-major order.
    fn flood_fill(&self, same: impl Fn(ChunkCoord, ChunkCoord) -> bool) -> Vec<Vec<ChunkCoord>> {
        let mut visited = vec![false; self.grid.capacity()];
        let mut components = Vec::new();
        let mut queue = VecDeque::new();

        for start in self.grid.iter() {
            let start = start.coord;
            if visited[self.slot(start)] {
                continue;
            }
            visited[self.slot(start)] = true;
            queue.push_back(start);

            let mut members = Vec::new();
            while let Some(coord) = queue.pop_front() {
                members.push(coord);
                for next in coord.neighbours() {
                    if self.grid.get(next).is_none() || visited[self.slot(next)] {
                        continue;
                    }
                    if same(coord, next) {
                        visited[self.slot(next)] = true;
                        queue.push_back(next);
                    }
                }
            }
            components.push(members);
        }

        components
    }

    /// Water pixels over in-world pixels.
    fn water_ratio(&self, members: &[ChunkCoord]) -> f64 {
        let mut water = 0usize;
        let mut total = 0usize;
        for coord in members {
            let Some(chunk) = self.grid.get(*coord) else {
                continue;
            };
            let (w, h) = self.grid.extent(*coord);
            for y in 0..h as usize {
                let row = &chunk.water_data[y * chunk.size as usize..][..w as usize];
                water += row.iter().filter(|depth| **depth > 0).count();
            }
            total += w as usize * h as usize;
        }
        if total == 0 {
            0.0
        } else {
            water as f64 / total as f64
        }
    }

    /// Nearest originally classified chunk by expanding Chebyshev rings.
    ///
    /// Inside the first ring with hits the Euclidean nearest wins; ties go
    /// to the lower row, then column.
    fn nearest_classified(&self, origin: ChunkCoord, classified: &[Option<RegionKind>]) -> Option<RegionKind> {
        let max_radius = self.grid.columns().max(self.grid.rows()) as i32;
        for radius in 1..=max_radius {
            let mut best: Option<(i64, i32, i32, RegionKind)> = None;
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs() != radius && dy.abs() != radius {
                        continue;
                    }
                    let coord = ChunkCoord::new(origin.x + dx, origin.y + dy);
                    if self.grid.get(coord).is_none() {
                        continue;
                    }
                    let Some(kind) = classified[self.slot(coord)] else {
                        continue;
                    };
                    let distance = i64::from(dx).pow(2) + i64::from(dy).pow(2);
                    let candidate = (distance, coord.y, coord.x, kind);
                    if best.map_or(true, |b| (candidate.0, candidate.1, candidate.2) < (b.0, b.1, b.2)) {
                        best = Some(candidate);
                    }
                }
            }
            if let Some((.., kind)) = best {
                return Some(kind);
            }
        }
        None
    }

    fn build_region(&self, id: u32, name: RegionKind, members: Vec<ChunkCoord>) -> Region {
        let mut bounds = RegionBounds::around(members[0]);
        let mut layers: BTreeMap<&str, usize> = BTreeMap::new();
        for coord in &members {
            bounds.include(*coord);
            if let Some(chunk) = self.grid.get(*coord) {
                *layers.entry(chunk.dominant_layer.as_str()).or_default() += 1;
            }
        }

        // Most frequent, alphabetical on ties
        let mut layer_name = "";
        let mut best = 0;
        for (layer, count) in layers {
            if count > best {
                layer_name = layer;
                best = count;
            }
        }

        Region {
            id,
            name,
            layer_name: layer_name.to_string(),
            bounds,
            area: members.len(),
            chunk_coords: members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use std::collections::HashSet;

    /// Builds a grid from rows of layer names; `~` marks a flooded chunk.
    fn grid(rows: &[&[&str]]) -> ChunkGrid {
        let size = 4;
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut grid = ChunkGrid::new(width * size, height * size, size);
        for (y, row) in rows.iter().enumerate() {
            for (x, name) in row.iter().enumerate() {
                let (layer, flooded) = name.strip_prefix('~').map_or((*name, false), |l| (l, true));
                let mut chunk = Chunk::new(ChunkCoord::new(x as i32, y as i32), size, layer);
                if flooded {
                    chunk.water_data.fill(10);
                }
                grid.insert(chunk).unwrap();
            }
        }
        grid
    }

    fn assert_partition(grid: &ChunkGrid, regions: &[Region]) {
        let mut seen = HashSet::new();
        for region in regions {
            assert_eq!(region.area, region.chunk_coords.len());
            for coord in &region.chunk_coords {
                assert!(seen.insert(*coord), "{coord:?} in two regions");
            }
        }
        let baked: HashSet<_> = grid.iter().map(|c| c.coord).collect();
        assert_eq!(seen, baked);
    }

    #[test]
    fn test_classify_rules() {
        assert_eq!(RegionKind::classify(0.95, "topsoil"), Some(RegionKind::Ocean));
        assert_eq!(RegionKind::classify(0.3, "alluvium"), Some(RegionKind::Shore));
        assert_eq!(RegionKind::classify(0.0, "abyssal_sediment"), None);
        assert_eq!(RegionKind::classify(0.0, "colluvium"), Some(RegionKind::Cliffs));
        assert_eq!(RegionKind::classify(0.0, "summit"), Some(RegionKind::Mountains));
        assert_eq!(RegionKind::classify(0.0, "topsoil"), Some(RegionKind::Plains));
        assert_eq!(RegionKind::classify(0.0, "foundation"), Some(RegionKind::Plains));
        assert_eq!(RegionKind::classify(0.0, "magma"), None);
    }

    #[test]
    fn test_small_candidates_take_nearest_name() {
        let s = "summit";
        let t = "topsoil";
        let c = "colluvium";
        // A 2-chunk colluvium island inside summit and topsoil halves
        let grid = grid(&[
            &[s, s, s, t, t, t],
            &[s, s, c, c, t, t],
            &[s, s, s, t, t, t],
        ]);
        let regions = RegionClassifier::new(&grid).classify();
        assert_partition(&grid, &regions);

        let kinds: HashSet<_> = regions.iter().map(|r| r.name).collect();
        assert!(!kinds.contains(&RegionKind::Cliffs));
        let mountain = regions.iter().find(|r| r.name == RegionKind::Mountains).unwrap();
        assert!(mountain.chunk_coords.contains(&ChunkCoord::new(2, 1)));
        let plains = regions.iter().find(|r| r.name == RegionKind::Plains).unwrap();
        assert!(plains.chunk_coords.contains(&ChunkCoord::new(3, 1)));
        assert_eq!(plains.layer_name, "topsoil");
    }

    #[test]
    fn test_flooded_sediment_is_ocean_or_shore() {
        let w = "~abyssal_sediment";
        let a = "~alluvium";
        let grid = grid(&[
            &[w, w, w, a, a, a, a],
            &[w, w, w, "alluvium", "alluvium", "alluvium", a],
        ]);
        let regions = RegionClassifier::new(&grid).classify();
        assert_partition(&grid, &regions);

        let ocean = regions.iter().find(|r| r.name == RegionKind::Ocean).unwrap();
        assert_eq!(ocean.area, 6);
        assert_eq!(ocean.bounds, RegionBounds { min: ChunkCoord::new(0, 0), max: ChunkCoord::new(2, 1) });
        let shore = regions.iter().find(|r| r.name == RegionKind::Shore).unwrap();
        assert_eq!(shore.area, 8);
    }

    #[test]
    fn test_degenerate_world_is_plains() {
        let grid = grid(&[&["magma", "magma"], &["ash", "ash"]]);
        let regions = RegionClassifier::new(&grid).classify();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, RegionKind::Plains);
        assert_eq!(regions[0].area, 4);
        assert_eq!(regions[0].layer_name, "ash");
    }

    #[test]
    fn test_empty_grid_has_no_regions() {
        let grid = ChunkGrid::new(16, 16, 4);
        assert!(RegionClassifier::new(&grid).classify().is_empty());
    }
}
