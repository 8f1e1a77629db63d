//! # Chunk Grid
//!
//! The world is stored as fixed-size square chunks for:
//! - Streaming (bake nearest first, the rest in the background)
//! - Edits (a crater touches one chunk and bumps its version)
//! - Sync (a chunk is the unit of a network message)
//!
//! ## Chunk Format
//!
//! Each chunk owns three row-major `size x size` byte arrays: packed
//! pixels, heights and water depths. Chunks on the right and bottom edge of
//! the world may overrun it; the overrun bytes stay zero and are never
//! addressable through world queries.
//!
//! The grid is a flat `Vec<Option<Chunk>>` indexed `cy * columns + cx`.
//!
//! ## Edit Stamps
//!
//! Edited fields carry the `EditStamp` of the write that set them. A write
//! lands only when its stamp beats the recorded one, so peers applying the
//! same writes in any order end with identical chunks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_shared::{ChunkPosition, EditStamp, FieldStamps, NetworkChunk, PixelStamp};

use crate::material::{as_packed, PackedPixel};

/// Chunk coordinate (identifies a chunk in the grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Column (in chunks, not pixels).
    pub x: i32,
    /// Row (in chunks, not pixels).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing a world pixel.
    #[inline]
    #[must_use]
    pub const fn from_world_pos(x: i32, y: i32, chunk_size: u32) -> Self {
        Self {
            x: x.div_euclid(chunk_size as i32),
            y: y.div_euclid(chunk_size as i32),
        }
    }

    /// World X of the chunk origin.
    #[inline]
    #[must_use]
    pub const fn world_x(self, chunk_size: u32) -> i32 {
        self.x * chunk_size as i32
    }

    /// World Y of the chunk origin.
    #[inline]
    #[must_use]
    pub const fn world_y(self, chunk_size: u32) -> i32 {
        self.y * chunk_size as i32
    }

    /// The four edge neighbours.
    #[must_use]
    pub const fn neighbours(self) -> [Self; 4] {
        [
            Self::new(self.x + 1, self.y),
            Self::new(self.x - 1, self.y),
            Self::new(self.x, self.y + 1),
            Self::new(self.x, self.y - 1),
        ]
    }
}

impl From<ChunkPosition> for ChunkCoord {
    fn from(position: ChunkPosition) -> Self {
        Self::new(position.x, position.y)
    }
}

impl From<ChunkCoord> for ChunkPosition {
    fn from(coord: ChunkCoord) -> Self {
        Self::new(coord.x, coord.y)
    }
}

/// One of the three per-pixel byte arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelField {
    /// Packed material/color byte.
    Pixel,
    /// Height byte.
    Height,
    /// Water depth byte.
    Water,
}

impl PixelField {
    /// Every field, in wire order.
    pub const ALL: [Self; 3] = [Self::Pixel, Self::Height, Self::Water];

    /// This field's stamp inside a pixel's stamps.
    #[inline]
    #[must_use]
    pub const fn stamp(self, stamps: &FieldStamps) -> Option<EditStamp> {
        match self {
            Self::Pixel => stamps.pixel,
            Self::Height => stamps.height,
            Self::Water => stamps.water,
        }
    }

    fn stamp_mut(self, stamps: &mut FieldStamps) -> &mut Option<EditStamp> {
        match self {
            Self::Pixel => &mut stamps.pixel,
            Self::Height => &mut stamps.height,
            Self::Water => &mut stamps.water,
        }
    }
}

/// A baked chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the chunk grid.
    pub coord: ChunkCoord,
    /// Side length in pixels.
    pub size: u32,
    /// Most common layer among the generation cells it overlaps.
    pub dominant_layer: String,
    /// Highest edit version seen; 0 when baked.
    pub version: u64,
    /// Packed material/color bytes.
    pub pixel_data: Vec<u8>,
    /// Height bytes.
    pub height_data: Vec<u8>,
    /// Water depth bytes (0 = dry).
    pub water_data: Vec<u8>,
    /// Stamps of edited pixels, by local index.
    pub stamps: BTreeMap<u32, FieldStamps>,
}

impl Chunk {
    /// Creates a zeroed chunk.
    #[must_use]
    pub fn new(coord: ChunkCoord, size: u32, dominant_layer: impl Into<String>) -> Self {
        let area = size as usize * size as usize;
        Self {
            coord,
            size,
            dominant_layer: dominant_layer.into(),
            version: 0,
            pixel_data: vec![0; area],
            height_data: vec![0; area],
            water_data: vec![0; area],
            stamps: BTreeMap::new(),
        }
    }

    /// Number of pixels, including any overrun.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> usize {
        self.size as usize * self.size as usize
    }

    /// Row-major index of a local pixel.
    #[inline]
    #[must_use]
    pub fn local_index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.size && y < self.size).then(|| y as usize * self.size as usize + x as usize)
    }

    /// Packed pixel at a local index.
    #[inline]
    #[must_use]
    pub fn pixel(&self, index: usize) -> Option<PackedPixel> {
        as_packed(&self.pixel_data).get(index).copied()
    }

    /// Byte of one field at a local index.
    #[inline]
    #[must_use]
    pub fn field(&self, field: PixelField, index: usize) -> Option<u8> {
        let bytes = match field {
            PixelField::Pixel => &self.pixel_data,
            PixelField::Height => &self.height_data,
            PixelField::Water => &self.water_data,
        };
        bytes.get(index).copied()
    }

    /// Stamp of the last write to one field, `None` if it was never edited.
    #[inline]
    #[must_use]
    pub fn field_stamp(&self, field: PixelField, index: usize) -> Option<EditStamp> {
        let key = u32::try_from(index).ok()?;
        self.stamps.get(&key).and_then(|stamps| field.stamp(stamps))
    }

    /// Writes one field if `stamp` beats the stamp already recorded for it.
    ///
    /// A winning write records the stamp (even when the byte is unchanged)
    /// and raises `version` to at least `stamp.version`. Returns true if
    /// the write won.
    pub fn write_field(&mut self, field: PixelField, index: usize, value: u8, stamp: EditStamp) -> bool {
        if index >= self.area() {
            return false;
        }
        let Ok(key) = u32::try_from(index) else {
            return false;
        };

        let slot = field.stamp_mut(self.stamps.entry(key).or_default());
        if slot.is_some_and(|current| current >= stamp) {
            return false;
        }
        *slot = Some(stamp);

        let bytes = match field {
            PixelField::Pixel => &mut self.pixel_data,
            PixelField::Height => &mut self.height_data,
            PixelField::Water => &mut self.water_data,
        };
        bytes[index] = value;
        self.version = self.version.max(stamp.version);
        true
    }

    /// Merges every stamped field of `other` into this chunk.
    ///
    /// Unstamped fields of `other` are ignored. Returns the local indices
    /// where at least one field was written, ascending.
    pub fn merge_from(&mut self, other: &Self) -> Vec<usize> {
        let mut touched = Vec::new();
        for (&key, stamps) in &other.stamps {
            let index = key as usize;
            let mut wrote = false;
            for field in PixelField::ALL {
                let (Some(stamp), Some(value)) = (field.stamp(stamps), other.field(field, index)) else {
                    continue;
                };
                wrote |= self.write_field(field, index, value, stamp);
            }
            if wrote {
                touched.push(index);
            }
        }
        touched
    }

    /// Wire form of this chunk.
    #[must_use]
    pub fn to_network(&self) -> NetworkChunk {
        NetworkChunk {
            position: self.coord.into(),
            version: self.version,
            size: self.size,
            layer_name: self.dominant_layer.clone(),
            pixel_data: self.pixel_data.clone(),
            height_data: self.height_data.clone(),
            water_data: self.water_data.clone(),
            stamps: self.wire_stamps(),
        }
    }

    /// Stamps as a wire list, ascending by index.
    #[must_use]
    pub fn wire_stamps(&self) -> Vec<PixelStamp> {
        self.stamps
            .iter()
            .map(|(&index, &stamps)| PixelStamp { index, stamps })
            .collect()
    }

    /// Rebuilds a chunk from its wire form.
    ///
    /// Returns `None` if the byte arrays do not match the declared size, or
    /// a stamp lies outside the chunk or repeats an index.
    #[must_use]
    pub fn from_network(chunk: NetworkChunk) -> Option<Self> {
        if !chunk.is_well_formed() {
            return None;
        }
        let stamps = stamp_map(&chunk.stamps)?;
        Some(Self {
            coord: chunk.position.into(),
            size: chunk.size,
            dominant_layer: chunk.layer_name,
            version: chunk.version,
            pixel_data: chunk.pixel_data,
            height_data: chunk.height_data,
            water_data: chunk.water_data,
            stamps,
        })
    }
}

/// Indexes wire stamps, rejecting repeated indices.
#[must_use]
pub fn stamp_map(stamps: &[PixelStamp]) -> Option<BTreeMap<u32, FieldStamps>> {
    let mut map = BTreeMap::new();
    for stamp in stamps {
        if map.insert(stamp.index, stamp.stamps).is_some() {
            return None;
        }
    }
    Some(map)
}

/// Owner of every chunk in the world.
#[derive(Clone, Debug, Default)]
pub struct ChunkGrid {
    columns: u32,
    rows: u32,
    chunk_size: u32,
    world_width: u32,
    world_height: u32,
    slots: Vec<Option<Chunk>>,
    baked: usize,
}

impl ChunkGrid {
    /// Creates an empty grid covering a `world_width x world_height` world.
    #[must_use]
    pub fn new(world_width: u32, world_height: u32, chunk_size: u32) -> Self {
        let chunk_size = chunk_size.max(1);
        let columns = world_width.div_ceil(chunk_size);
        let rows = world_height.div_ceil(chunk_size);
        Self {
            columns,
            rows,
            chunk_size,
            world_width,
            world_height,
            slots: vec![None; columns as usize * rows as usize],
            baked: 0,
        }
    }

    /// Grid columns.
    #[inline]
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Grid rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Chunk side length in pixels.
    #[inline]
    #[must_use]
    pub const fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Number of chunk slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of chunks present.
    #[inline]
    #[must_use]
    pub const fn baked_count(&self) -> usize {
        self.baked
    }

    /// Returns true if the coordinate lies inside the grid.
    #[inline]
    #[must_use]
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.slot(coord).is_some()
    }

    fn slot(&self, coord: ChunkCoord) -> Option<usize> {
        let x = u32::try_from(coord.x).ok()?;
        let y = u32::try_from(coord.y).ok()?;
        (x < self.columns && y < self.rows).then(|| y as usize * self.columns as usize + x as usize)
    }

    /// Gets a chunk.
    #[inline]
    #[must_use]
    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.slot(coord).and_then(|i| self.slots[i].as_ref())
    }

    /// Gets a chunk mutably.
    #[inline]
    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.slot(coord).and_then(|i| self.slots[i].as_mut())
    }

    /// Stores a chunk at its own coordinate, returning the previous one.
    ///
    /// Chunks outside the grid are handed back unchanged as `Err`.
    pub fn insert(&mut self, chunk: Chunk) -> Result<Option<Chunk>, Chunk> {
        let Some(slot) = self.slot(chunk.coord) else {
            return Err(chunk);
        };
        let previous = self.slots[slot].replace(chunk);
        if previous.is_none() {
            self.baked += 1;
        }
        Ok(previous)
    }

    /// Iterates present chunks in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.slots.iter().flatten()
    }

    /// In-world pixel extent `(width, height)` of a chunk.
    #[must_use]
    pub fn extent(&self, coord: ChunkCoord) -> (u32, u32) {
        if !self.contains(coord) {
            return (0, 0);
        }
        let x0 = coord.x as u32 * self.chunk_size;
        let y0 = coord.y as u32 * self.chunk_size;
        (
            self.chunk_size.min(self.world_width - x0),
            self.chunk_size.min(self.world_height - y0),
        )
    }

    /// Chunk and local index of an in-world pixel.
    #[must_use]
    pub fn locate(&self, x: i32, y: i32) -> Option<(ChunkCoord, usize)> {
        let (ux, uy) = (u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        if ux >= self.world_width || uy >= self.world_height {
            return None;
        }
        let coord = ChunkCoord::from_world_pos(x, y, self.chunk_size);
        let local = (uy % self.chunk_size) as usize * self.chunk_size as usize
            + (ux % self.chunk_size) as usize;
        Some((coord, local))
    }

    /// Removes every chunk.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.baked = 0;
    }
}
