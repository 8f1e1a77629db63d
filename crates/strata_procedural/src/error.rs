//! # World Error Types
//!
//! All errors that can occur while configuring, generating, exporting or
//! importing a world. Missing chunks and out-of-bounds queries are not
//! errors; they return `None`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the procedural world system.
#[derive(Error, Debug)]
pub enum WorldError {
    /// A config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        /// The file that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A TOML document did not match the expected schema.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The catalog does not fit in the 6 material bits of a packed pixel.
    #[error("material catalog holds {0} entries, at most 64 fit in a packed pixel")]
    TooManyMaterials(usize),

    /// A material palette is empty or larger than 4 variants.
    #[error("material {name} has {count} colors, expected 1 to 4")]
    InvalidPalette {
        /// Material name.
        name: String,
        /// Number of colors found.
        count: usize,
    },

    /// Two materials share a name.
    #[error("duplicate material name: {0}")]
    DuplicateMaterial(String),

    /// A layer or wet variant names a material that is not in the catalog.
    #[error("unknown material {material} referenced by {referenced_by}")]
    UnknownMaterial {
        /// The missing material.
        material: String,
        /// Who referenced it.
        referenced_by: String,
    },

    /// A wet variant cannot hold every color index of its dry material.
    #[error("wet variant {wet} of {material} has fewer colors than the dry material")]
    WetVariantPalette {
        /// Dry material name.
        material: String,
        /// Wet variant name.
        wet: String,
    },

    /// A layer has no material with positive weight.
    #[error("layer {0} has no materials with positive weight")]
    EmptyLayer(String),

    /// The layer catalog has no layers.
    #[error("layer catalog is empty")]
    NoLayers,

    /// A packed pixel does not decode against the catalog.
    #[error("corrupt pixel byte 0x{byte:02x}: {reason}")]
    CorruptPixel {
        /// The offending byte.
        byte: u8,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// A snapshot document could not be parsed.
    #[error("snapshot decode error: {0}")]
    SnapshotJson(#[from] serde_json::Error),

    /// A chunk record inside a snapshot is unusable.
    #[error("snapshot chunk ({cx}, {cy}): {reason}")]
    SnapshotChunk {
        /// Chunk column.
        cx: i32,
        /// Chunk row.
        cy: i32,
        /// What was wrong with it.
        reason: String,
    },

    /// Snapshot metadata disagrees with its contents.
    #[error("snapshot mismatch: {0}")]
    SnapshotMismatch(String),
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
