//! # STRATA Shared
//!
//! Chunk sync types exchanged between the host and every client.
//!
//! ## CRITICAL RULE
//!
//! Peers never ship the generated grid to each other. The host sends the
//! seed and params, every peer regenerates the same world, and only edits
//! travel over the wire as the messages defined here.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod bytes;
pub mod protocol;

pub use bytes::{decode_base64, encode_base64};
pub use protocol::{
    ChunkMessage, ChunkPosition, EditStamp, FieldStamps, NetworkChunk, PixelPatch, PixelStamp,
    ProtocolError,
};
