//! # STRATA Networking
//!
//! Chunk edit sync between peers.
//!
//! ## Model
//!
//! Peers never exchange the generated world. The host shares seed and
//! params, every peer regenerates locally, and only edits travel:
//!
//! ```text
//! ┌────────────┐  request_edit_at  ┌──────────────┐   JSON    ┌────────────┐
//! │ Local World│ ───────────────►  │ ChunkMessage │ ────────► │ Peer World │
//! └────────────┘                   └──────────────┘           └────────────┘
//!                                                  handle_raw_message
//! ```
//!
//! ## Edit Stamps
//!
//! Every edited field is stamped with the chunk version the edit produced
//! and the editing peer's origin id. Receivers keep, per field, the write
//! with the highest stamp. Concurrent, reordered or duplicated messages
//! therefore leave every peer with the same chunk.
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_networking::{handle_raw_message, ChunkEditor};
//!
//! let mut editor = ChunkEditor::new(peer_id, session_seed);
//! if let Some(message) = editor.request_edit_at(&mut world, 120, 64) {
//!     transport.send(message.to_json()?);
//! }
//!
//! // On the other side
//! let outcome = handle_raw_message(&mut peer_world, &raw);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod edit;
pub mod sync;

pub use edit::{ChunkEditor, EditorConfig};
pub use sync::{handle_chunk_update, handle_raw_message, SyncError, SyncOutcome};
