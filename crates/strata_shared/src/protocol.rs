//! Chunk sync protocol types.
//!
//! These types are serialized as JSON and sent over whatever transport the
//! session layer provides. Both sides must agree on these definitions.
//!
//! ```text
//! { "type": "chunk-update", "chunk": { "position": {..}, "version": 3, .., "stamps": [..] } }
//! { "type": "chunk-patch", "position": {..}, "version": 4, "origin": 2, "patches": [..] }
//! ```
//!
//! ## Stamps
//!
//! Every edited field of every pixel remembers the `EditStamp` of the write
//! that set it. Stamps order by version, then by origin peer, so any two
//! writes to the same field have a single winner on every peer no matter
//! in which order the messages arrive.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while decoding or encoding a chunk message.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The payload was not a valid chunk message.
    #[error("malformed chunk message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Chunk coordinate as it travels on the wire (in chunks, not pixels).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPosition {
    /// Chunk column.
    pub x: i32,
    /// Chunk row.
    pub y: i32,
}

impl ChunkPosition {
    /// Creates a new chunk position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Identity of one write: the chunk version it produced and the peer that
/// made it.
///
/// Ordered by `version`, then `origin`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EditStamp {
    /// Chunk version produced by the write.
    pub version: u64,
    /// Peer that made the write.
    pub origin: u32,
}

impl EditStamp {
    /// Creates a stamp.
    #[inline]
    #[must_use]
    pub const fn new(version: u64, origin: u32) -> Self {
        Self { version, origin }
    }
}

/// Latest write to each field of one pixel. `None` means the generated value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStamps {
    /// Stamp of the packed pixel byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel: Option<EditStamp>,
    /// Stamp of the height byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<EditStamp>,
    /// Stamp of the water byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<EditStamp>,
}

/// Field stamps of one pixel, as carried by a full chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelStamp {
    /// Row-major pixel index inside the chunk.
    pub index: u32,
    /// Stamps of the edited fields.
    #[serde(flatten)]
    pub stamps: FieldStamps,
}

/// Full chunk payload used for whole-chunk sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkChunk {
    /// Chunk position in the chunk grid.
    pub position: ChunkPosition,
    /// Version of the chunk after the edit that produced this payload.
    pub version: u64,
    /// Side length in pixels.
    pub size: u32,
    /// Dominant layer name.
    pub layer_name: String,
    /// Packed material/color bytes, row-major.
    #[serde(with = "crate::bytes::base64_bytes")]
    pub pixel_data: Vec<u8>,
    /// Height bytes, row-major.
    #[serde(with = "crate::bytes::base64_bytes")]
    pub height_data: Vec<u8>,
    /// Water depth bytes, row-major (0 = dry).
    #[serde(with = "crate::bytes::base64_bytes")]
    pub water_data: Vec<u8>,
    /// Stamps of every edited pixel.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stamps: Vec<PixelStamp>,
}

impl NetworkChunk {
    /// Number of pixels the payload claims to carry.
    #[inline]
    #[must_use]
    pub const fn area(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }

    /// Returns true if every byte array matches the declared size and
    /// every stamp addresses a pixel inside the chunk.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        let area = self.area();
        self.size > 0
            && self.pixel_data.len() == area
            && self.height_data.len() == area
            && self.water_data.len() == area
            && self.stamps.iter().all(|s| (s.index as usize) < area)
    }
}

/// Sparse per-pixel delta inside one chunk.
///
/// Absent fields are left untouched by the receiver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPatch {
    /// Row-major pixel index inside the chunk.
    pub index: u32,
    /// New packed pixel byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel: Option<u8>,
    /// New height byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u8>,
    /// New water byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water: Option<u8>,
}

impl PixelPatch {
    /// Creates an empty patch for the given index.
    #[inline]
    #[must_use]
    pub const fn at(index: u32) -> Self {
        Self { index, pixel: None, height: None, water: None }
    }

    /// Returns true if the patch changes nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pixel.is_none() && self.height.is_none() && self.water.is_none()
    }
}

/// Message exchanged between peers when a chunk changes at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChunkMessage {
    /// Whole chunk replacement.
    ChunkUpdate {
        /// The chunk payload.
        chunk: NetworkChunk,
    },
    /// Sparse edit of one chunk.
    ChunkPatch {
        /// Target chunk.
        position: ChunkPosition,
        /// Chunk version produced by the edit.
        version: u64,
        /// Peer that made the edit.
        #[serde(default)]
        origin: u32,
        /// Per-pixel deltas.
        patches: Vec<PixelPatch>,
    },
}

impl ChunkMessage {
    /// Target chunk of this message.
    #[must_use]
    pub const fn position(&self) -> ChunkPosition {
        match self {
            Self::ChunkUpdate { chunk } => chunk.position,
            Self::ChunkPatch { position, .. } => *position,
        }
    }

    /// Write stamp of a patch (`None` for full chunks, whose stamps are
    /// per pixel).
    #[must_use]
    pub const fn stamp(&self) -> Option<EditStamp> {
        match self {
            Self::ChunkUpdate { .. } => None,
            Self::ChunkPatch { version, origin, .. } => Some(EditStamp::new(*version, *origin)),
        }
    }

    /// Version carried by this message.
    #[must_use]
    pub const fn version(&self) -> u64 {
        match self {
            Self::ChunkUpdate { chunk } => chunk.version,
            Self::ChunkPatch { version, .. } => *version,
        }
    }

    /// Encodes the message as JSON.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` if serialization fails.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a message from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Malformed` for unparseable payloads, unknown
    /// message types and missing fields.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}
