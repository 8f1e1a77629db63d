//! # Inbound Chunk Sync
//!
//! Applies chunk messages received from peers.
//!
//! ## Rules
//!
//! Each field write carries an `EditStamp` and lands only if it beats the
//! stamp recorded for that field, so peers converge whatever order they
//! receive messages in.
//!
//! - A full chunk is inserted whole when absent. Otherwise its stamped
//!   fields are merged one by one.
//! - Every field of a patch carries the stamp `(version, origin)` of the
//!   message.
//! - A message where no field wins is ignored as stale. Replays are
//!   therefore harmless. Nothing here is fatal.
//!
//! Handlers run while generation may still be streaming. A chunk that
//! arrives before the baker reaches it is kept and the baker skips it. A
//! patch for a chunk still in the baker's queue bakes that chunk first.
//! Patches that arrive before baking starts are dropped.

use strata_procedural::{Chunk, ChunkCoord, PackedPixel, PixelField, World};
use strata_shared::{ChunkMessage, EditStamp, NetworkChunk, PixelPatch, ProtocolError};
use thiserror::Error;
use tracing::debug;

/// Why an inbound message was not applied.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The payload did not parse.
    #[error(transparent)]
    Malformed(#[from] ProtocolError),

    /// Byte arrays do not match the declared size, or the size is not the
    /// world's chunk size.
    #[error("chunk ({x}, {y}) payload does not match a {expected}px chunk")]
    BadPayload {
        /// Chunk column.
        x: i32,
        /// Chunk row.
        y: i32,
        /// The world's chunk size.
        expected: u32,
    },

    /// The chunk lies outside the world grid.
    #[error("chunk ({x}, {y}) is outside the world")]
    OutOfGrid {
        /// Chunk column.
        x: i32,
        /// Chunk row.
        y: i32,
    },

    /// A patch targets a chunk that is not baked locally.
    #[error("chunk ({x}, {y}) is not loaded")]
    UnknownChunk {
        /// Chunk column.
        x: i32,
        /// Chunk row.
        y: i32,
    },

    /// No field of the message beats the local stamps.
    #[error("stale version {incoming}, local chunk is at {local}")]
    Stale {
        /// Version carried by the message.
        incoming: u64,
        /// Local chunk version.
        local: u64,
    },

    /// A patch index lies outside the chunk.
    #[error("patch index {index} outside a chunk of {area} pixels")]
    BadIndex {
        /// Offending index.
        index: u32,
        /// Chunk area.
        area: usize,
    },

    /// A pixel byte does not decode against the local catalog.
    #[error("pixel byte {0:#04x} does not decode")]
    CorruptPixel(u8),
}

/// Result of handling one inbound message.
#[derive(Debug)]
pub enum SyncOutcome {
    /// A full chunk filled an empty slot.
    Inserted(ChunkCoord),
    /// Some fields of a full chunk won over the local copy.
    Merged {
        /// Target chunk.
        coord: ChunkCoord,
        /// Local indices that changed and need re-rendering.
        indices: Vec<usize>,
    },
    /// Some fields of a patch won over the local copy.
    Patched {
        /// Target chunk.
        coord: ChunkCoord,
        /// Local indices that changed and need re-rendering.
        indices: Vec<usize>,
    },
    /// The message was dropped.
    Ignored(SyncError),
}

impl SyncOutcome {
    /// Returns true if the local world changed.
    #[inline]
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}

/// Parses and applies a JSON chunk message.
///
/// Unparseable payloads, unknown message types and missing fields are
/// ignored.
pub fn handle_raw_message(world: &mut World, raw: &str) -> SyncOutcome {
    match ChunkMessage::from_json(raw) {
        Ok(message) => handle_chunk_update(world, &message),
        Err(e) => ignored(SyncError::from(e)),
    }
}

/// Applies a decoded chunk message.
pub fn handle_chunk_update(world: &mut World, message: &ChunkMessage) -> SyncOutcome {
    let result = match message {
        ChunkMessage::ChunkUpdate { chunk } => apply_chunk(world, chunk),
        ChunkMessage::ChunkPatch { position, version, origin, patches } => apply_patches(
            world,
            ChunkCoord::from(*position),
            EditStamp::new(*version, *origin),
            patches,
        ),
    };
    result.unwrap_or_else(ignored)
}

fn ignored(reason: SyncError) -> SyncOutcome {
    debug!("Ignoring chunk message: {}", reason);
    SyncOutcome::Ignored(reason)
}

fn apply_chunk(world: &mut World, incoming: &NetworkChunk) -> Result<SyncOutcome, SyncError> {
    let coord = ChunkCoord::from(incoming.position);
    if !world.chunks().contains(coord) {
        return Err(SyncError::OutOfGrid { x: coord.x, y: coord.y });
    }

    let expected = world.chunks().chunk_size();
    let bad_payload = SyncError::BadPayload { x: coord.x, y: coord.y, expected };
    if incoming.size != expected || !incoming.is_well_formed() {
        return Err(bad_payload);
    }
    if let Some(&byte) = incoming
        .pixel_data
        .iter()
        .find(|b| world.materials().decode(PackedPixel(**b)).is_err())
    {
        return Err(SyncError::CorruptPixel(byte));
    }
    let chunk = Chunk::from_network(incoming.clone()).ok_or(bad_payload)?;

    let Some(local) = world.ensure_chunk(coord) else {
        return match world.insert_chunk(chunk) {
            Ok(_) => {
                debug!("Inserted chunk [{},{}] v{}", coord.x, coord.y, incoming.version);
                Ok(SyncOutcome::Inserted(coord))
            }
            Err(_) => Err(SyncError::BadPayload { x: coord.x, y: coord.y, expected }),
        };
    };

    let indices = local.merge_from(&chunk);
    if indices.is_empty() {
        return Err(SyncError::Stale { incoming: incoming.version, local: local.version });
    }
    debug!(
        "Merged {} pixels of chunk [{},{}] v{} -> v{}",
        indices.len(),
        coord.x,
        coord.y,
        incoming.version,
        local.version
    );
    Ok(SyncOutcome::Merged { coord, indices })
}

fn apply_patches(
    world: &mut World,
    coord: ChunkCoord,
    stamp: EditStamp,
    patches: &[PixelPatch],
) -> Result<SyncOutcome, SyncError> {
    if !world.chunks().contains(coord) {
        return Err(SyncError::OutOfGrid { x: coord.x, y: coord.y });
    }
    // Version 0 is the baked state, no edit produces it
    if stamp.version == 0 {
        let local = world.chunk(coord).map_or(0, |chunk| chunk.version);
        return Err(SyncError::Stale { incoming: 0, local });
    }

    // Validate everything first so a bad entry leaves the chunk untouched
    let size = world.chunks().chunk_size() as usize;
    let area = size * size;
    for patch in patches {
        if patch.index as usize >= area {
            return Err(SyncError::BadIndex { index: patch.index, area });
        }
        if let Some(byte) = patch.pixel {
            if world.materials().decode(PackedPixel(byte)).is_err() {
                return Err(SyncError::CorruptPixel(byte));
            }
        }
    }

    let chunk = world
        .ensure_chunk(coord)
        .ok_or(SyncError::UnknownChunk { x: coord.x, y: coord.y })?;
    let local = chunk.version;

    let mut indices = Vec::with_capacity(patches.len());
    for patch in patches {
        let index = patch.index as usize;
        let mut wrote = false;
        for (field, value) in [
            (PixelField::Pixel, patch.pixel),
            (PixelField::Height, patch.height),
            (PixelField::Water, patch.water),
        ] {
            if let Some(value) = value {
                wrote |= chunk.write_field(field, index, value, stamp);
            }
        }
        if wrote {
            indices.push(index);
        }
    }
    if indices.is_empty() {
        return Err(SyncError::Stale { incoming: stamp.version, local });
    }

    indices.sort_unstable();
    indices.dedup();
    debug!(
        "Patched {} pixels in chunk [{},{}] -> v{}",
        indices.len(),
        coord.x,
        coord.y,
        chunk.version
    );
    Ok(SyncOutcome::Patched { coord, indices })
}
