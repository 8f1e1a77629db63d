//! # World Snapshots
//!
//! Flat JSON export of a generated world: metadata, the params it was built
//! from, every baked chunk, the regions and the derived zones.
//!
//! Chunk byte arrays are base64 strings. With `ByteEncoding::Lz4` each array
//! is LZ4-compressed (size-prepended) before base64 encoding.
//!
//! Snapshots are a save/load round trip for one build, not a long-term save
//! format: importing checks `format_version` and rejects anything else.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use serde::{Deserialize, Serialize};
use strata_shared::{decode_base64, encode_base64, ChunkPosition, PixelStamp};
use tracing::info;

use crate::chunk::{stamp_map, Chunk, ChunkCoord, ChunkGrid};
use crate::error::{WorldError, WorldResult};
use crate::layer::LayerCatalog;
use crate::material::{as_packed, MaterialCatalog};
use crate::noise::WorldSeed;
use crate::params::GenerationParams;
use crate::region::Region;
use crate::world::World;
use crate::zone::AmbienceZone;

/// Snapshot layout version written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// How chunk byte arrays are stored before base64.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteEncoding {
    /// Plain bytes.
    #[default]
    Raw,
    /// LZ4 block with a prepended uncompressed size.
    Lz4,
}

impl ByteEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Self::Raw => encode_base64(bytes),
            Self::Lz4 => encode_base64(&compress_prepend_size(bytes)),
        }
    }

    fn decode(self, text: &str) -> Result<Vec<u8>, String> {
        let bytes = decode_base64(text).map_err(|e| format!("invalid base64: {e}"))?;
        match self {
            Self::Raw => Ok(bytes),
            Self::Lz4 => decompress_size_prepended(&bytes).map_err(|e| format!("invalid lz4 block: {e}")),
        }
    }
}

/// Snapshot header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Layout version.
    pub format_version: u32,
    /// World seed.
    pub seed: u64,
    /// Export time, milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// World width in pixels.
    pub width: u32,
    /// World height in pixels.
    pub height: u32,
    /// Number of chunk records.
    pub chunk_count: usize,
    /// Number of regions.
    pub region_count: usize,
    /// Number of zones.
    pub zone_count: usize,
    /// Encoding of chunk byte arrays.
    pub encoding: ByteEncoding,
}

/// One baked chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Chunk column.
    pub cx: i32,
    /// Chunk row.
    pub cy: i32,
    /// Chunk position (same as `cx`, `cy`).
    pub position: ChunkPosition,
    /// Side length in pixels.
    pub size: u32,
    /// Chunk version.
    pub version: u64,
    /// Dominant layer name.
    pub dominant_layer_name: String,
    /// Encoded pixel bytes.
    pub pixel_data: String,
    /// Encoded height bytes.
    pub height_data: String,
    /// Encoded water bytes.
    pub water_data: String,
    /// Stamps of edited pixels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stamps: Vec<PixelStamp>,
}

/// A complete world snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldExport {
    /// Header.
    pub metadata: ExportMetadata,
    /// Params the world was generated from.
    pub params: GenerationParams,
    /// Baked chunks in row-major order.
    pub chunks: Vec<ChunkRecord>,
    /// Regions.
    pub regions: Vec<Region>,
    /// Zones.
    pub zones: Vec<AmbienceZone>,
}

impl WorldExport {
    /// Serializes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `WorldError::SnapshotJson` if serialization fails.
    pub fn to_json(&self) -> WorldResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `WorldError::SnapshotJson` for malformed documents.
    pub fn from_json(text: &str) -> WorldResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl World {
    /// Exports the world with raw byte arrays.
    #[must_use]
    pub fn export(&self) -> WorldExport {
        self.export_with(ByteEncoding::Raw)
    }

    /// Exports the world with the given byte encoding.
    #[must_use]
    pub fn export_with(&self, encoding: ByteEncoding) -> WorldExport {
        let chunks: Vec<ChunkRecord> = self
            .chunks()
            .iter()
            .map(|chunk| ChunkRecord {
                cx: chunk.coord.x,
                cy: chunk.coord.y,
                position: chunk.coord.into(),
                size: chunk.size,
                version: chunk.version,
                dominant_layer_name: chunk.dominant_layer.clone(),
                pixel_data: encoding.encode(&chunk.pixel_data),
                height_data: encoding.encode(&chunk.height_data),
                water_data: encoding.encode(&chunk.water_data),
                stamps: chunk.wire_stamps(),
            })
            .collect();

        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        let params = self.params().clone();
        info!("World exported: {} chunks ({:?})", chunks.len(), encoding);
        WorldExport {
            metadata: ExportMetadata {
                format_version: SNAPSHOT_FORMAT_VERSION,
                seed: self.seed().value(),
                timestamp_ms,
                width: params.width,
                height: params.height,
                chunk_count: chunks.len(),
                region_count: self.regions().len(),
                zone_count: self.zones().len(),
                encoding,
            },
            params,
            chunks,
            regions: self.regions().to_vec(),
            zones: self.zones().to_vec(),
        }
    }

    /// Rebuilds a world from a snapshot using the built-in catalogs.
    ///
    /// # Errors
    ///
    /// Returns `WorldError::SnapshotMismatch` when the metadata disagrees
    /// with the contents and `WorldError::SnapshotChunk` for unusable chunk
    /// records.
    pub fn import(snapshot: WorldExport) -> WorldResult<Self> {
        let materials = MaterialCatalog::builtin();
        let layers = LayerCatalog::builtin(&materials)?;
        Self::import_with_catalogs(snapshot, materials, layers)
    }

    /// Rebuilds a world from a snapshot with custom catalogs.
    ///
    /// # Errors
    ///
    /// Same as [`Self::import`].
    pub fn import_with_catalogs(
        snapshot: WorldExport,
        materials: MaterialCatalog,
        layers: LayerCatalog,
    ) -> WorldResult<Self> {
        let WorldExport { metadata, params, chunks, regions, zones } = snapshot;
        check_metadata(&metadata, &params, chunks.len(), regions.len(), zones.len())?;

        let mut grid = ChunkGrid::new(params.width, params.height, params.chunk_size);
        let mut seen = HashSet::with_capacity(chunks.len());
        for record in chunks {
            let chunk = decode_record(record, metadata.encoding, &grid, &materials)?;
            if !seen.insert(chunk.coord) {
                return Err(chunk_error(chunk.coord, "duplicate chunk"));
            }
            grid.insert(chunk)
                .map_err(|chunk| chunk_error(chunk.coord, "outside the chunk grid"))?;
        }

        check_regions(&regions, &zones, &grid)?;

        let mut world = Self::with_catalogs(WorldSeed::new(metadata.seed), params, materials, layers);
        world.restore(grid, regions, zones);
        info!("World imported: {} chunks", world.baked_chunks());
        Ok(world)
    }
}

fn check_metadata(
    metadata: &ExportMetadata,
    params: &GenerationParams,
    chunks: usize,
    regions: usize,
    zones: usize,
) -> WorldResult<()> {
    if metadata.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(WorldError::SnapshotMismatch(format!(
            "format version {} is not supported",
            metadata.format_version
        )));
    }
    if (metadata.width, metadata.height) != (params.width, params.height) {
        return Err(WorldError::SnapshotMismatch("world size differs from params".to_string()));
    }
    let counts = [
        ("chunk", metadata.chunk_count, chunks),
        ("region", metadata.region_count, regions),
        ("zone", metadata.zone_count, zones),
    ];
    for (what, declared, found) in counts {
        if declared != found {
            return Err(WorldError::SnapshotMismatch(format!(
                "metadata declares {declared} {what}s, snapshot holds {found}"
            )));
        }
    }
    Ok(())
}

/// Regions must partition the baked chunks and every zone must name one.
fn check_regions(regions: &[Region], zones: &[AmbienceZone], grid: &ChunkGrid) -> WorldResult<()> {
    let mut covered = HashSet::with_capacity(grid.baked_count());
    let mut ids = HashSet::with_capacity(regions.len());
    for region in regions {
        if !ids.insert(region.id) {
            return Err(WorldError::SnapshotMismatch(format!("region id {} is used twice", region.id)));
        }
        if region.area != region.chunk_coords.len() {
            return Err(WorldError::SnapshotMismatch(format!(
                "region {} declares {} chunks, lists {}",
                region.id,
                region.area,
                region.chunk_coords.len()
            )));
        }
        for coord in &region.chunk_coords {
            if grid.get(*coord).is_none() {
                return Err(WorldError::SnapshotMismatch(format!(
                    "region {} lists chunk ({}, {}) which is not in the snapshot",
                    region.id, coord.x, coord.y
                )));
            }
            if !covered.insert(*coord) {
                return Err(WorldError::SnapshotMismatch(format!(
                    "chunk ({}, {}) belongs to more than one region",
                    coord.x, coord.y
                )));
            }
        }
    }
    if covered.len() != grid.baked_count() {
        return Err(WorldError::SnapshotMismatch(format!(
            "regions cover {} of {} chunks",
            covered.len(),
            grid.baked_count()
        )));
    }
    if let Some(zone) = zones.iter().find(|zone| !ids.contains(&zone.region_id)) {
        return Err(WorldError::SnapshotMismatch(format!(
            "zone {} refers to unknown region {}",
            zone.id, zone.region_id
        )));
    }
    Ok(())
}

fn decode_record(
    record: ChunkRecord,
    encoding: ByteEncoding,
    grid: &ChunkGrid,
    materials: &MaterialCatalog,
) -> WorldResult<Chunk> {
    let coord = ChunkCoord::new(record.cx, record.cy);
    if ChunkCoord::from(record.position) != coord {
        return Err(chunk_error(coord, "position disagrees with cx/cy"));
    }
    if record.size != grid.chunk_size() {
        return Err(chunk_error(coord, "chunk size differs from params"));
    }

    let area = record.size as usize * record.size as usize;
    let decode = |text: &str, what: &str| -> WorldResult<Vec<u8>> {
        let bytes = encoding.decode(text).map_err(|reason| chunk_error(coord, &format!("{what}: {reason}")))?;
        if bytes.len() != area {
            return Err(chunk_error(coord, &format!("{what} holds {} bytes, expected {area}", bytes.len())));
        }
        Ok(bytes)
    };

    let pixel_data = decode(&record.pixel_data, "pixel data")?;
    let height_data = decode(&record.height_data, "height data")?;
    let water_data = decode(&record.water_data, "water data")?;

    // Overrun bytes are zero, which is not necessarily a valid pixel
    let (w, h) = grid.extent(coord);
    let pixels = as_packed(&pixel_data);
    for y in 0..h as usize {
        for pixel in &pixels[y * record.size as usize..][..w as usize] {
            materials.decode(*pixel).map_err(|e| chunk_error(coord, &e.to_string()))?;
        }
    }

    if record.stamps.iter().any(|stamp| stamp.index as usize >= area) {
        return Err(chunk_error(coord, "stamp outside chunk"));
    }
    let stamps = stamp_map(&record.stamps).ok_or_else(|| chunk_error(coord, "repeated stamp index"))?;

    Ok(Chunk {
        coord,
        size: record.size,
        dominant_layer: record.dominant_layer_name,
        version: record.version,
        pixel_data,
        height_data,
        water_data,
        stamps,
    })
}

fn chunk_error(coord: ChunkCoord, reason: &str) -> WorldError {
    WorldError::SnapshotChunk { cx: coord.x, cy: coord.y, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use strata_shared::EditStamp;

    use super::*;
    use crate::chunk::PixelField;
    use crate::world::generate_world;

    fn world() -> World {
        let params = GenerationParams::default().with_size(96, 80).with_chunk_size(32).with_cell_size(16);
        generate_world(WorldSeed::new(77), params).unwrap()
    }

    #[test]
    fn test_metadata_counts() {
        let world = world();
        let snapshot = world.export();
        assert_eq!(snapshot.metadata.chunk_count, 9);
        assert_eq!(snapshot.metadata.seed, 77);
        assert_eq!(snapshot.metadata.region_count, world.regions().len());
        assert_eq!(snapshot.chunks[4].position, ChunkPosition::new(1, 1));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut snapshot = world().export();
        snapshot.metadata.chunk_count += 1;
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotMismatch(_))));
    }

    #[test]
    fn test_regions_must_cover_chunks() {
        let world = world();

        // A chunk dropped from its region leaves it uncovered
        let mut snapshot = world.export();
        let region = snapshot.regions.iter_mut().find(|r| r.area > 1).unwrap();
        region.chunk_coords.pop();
        region.area -= 1;
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotMismatch(_))));

        // A chunk listed twice
        let mut snapshot = world.export();
        let extra = snapshot.regions[0].chunk_coords[0];
        snapshot.regions.last_mut().unwrap().chunk_coords.push(extra);
        snapshot.regions.last_mut().unwrap().area += 1;
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotMismatch(_))));

        // A zone pointing nowhere
        let mut snapshot = world.export();
        snapshot.zones[0].region_id = u32::MAX;
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotMismatch(_))));

        assert!(World::import(world.export()).is_ok());
    }

    #[test]
    fn test_truncated_chunk_rejected() {
        let mut snapshot = world().export();
        snapshot.chunks[0].height_data = encode_base64(&[1, 2, 3]);
        assert!(matches!(
            World::import(snapshot),
            Err(WorldError::SnapshotChunk { cx: 0, cy: 0, .. })
        ));
    }

    #[test]
    fn test_corrupt_pixel_rejected() {
        let mut snapshot = world().export();
        let mut pixels = decode_base64(&snapshot.chunks[0].pixel_data).unwrap();
        pixels[0] = 63 << 2;
        snapshot.chunks[0].pixel_data = encode_base64(&pixels);
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotChunk { .. })));
    }

    #[test]
    fn test_stamps_survive_round_trip() {
        let mut world = world();
        let coord = ChunkCoord::new(1, 1);
        let chunk = world.chunk_mut(coord).unwrap();
        let height = chunk.height_data[40];
        chunk.write_field(PixelField::Height, 40, height / 2, EditStamp::new(3, 2));

        let snapshot = world.export_with(ByteEncoding::Lz4);
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = World::import(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.chunk(coord), world.chunk(coord));
        assert_eq!(restored.chunk(coord).unwrap().version, 3);

        let mut snapshot = world.export();
        let record = snapshot.chunks.iter_mut().find(|c| !c.stamps.is_empty()).unwrap();
        record.stamps.push(record.stamps[0]);
        assert!(matches!(World::import(snapshot), Err(WorldError::SnapshotChunk { cx: 1, cy: 1, .. })));
    }

    #[test]
    fn test_lz4_is_smaller_for_water_bytes() {
        let world = world();
        let raw = world.export_with(ByteEncoding::Raw);
        let lz4 = world.export_with(ByteEncoding::Lz4);
        let raw_len: usize = raw.chunks.iter().map(|c| c.water_data.len()).sum();
        let lz4_len: usize = lz4.chunks.iter().map(|c| c.water_data.len()).sum();
        assert!(lz4_len < raw_len);
    }
}
