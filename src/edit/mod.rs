//! Edit Synthesizer
//!
//! Diffs whole-document rewrites into minimal, offset-accurate edits and
//! tracks which edits the engine made itself so their echoes are ignored.

pub mod diff;
pub mod synthesizer;
pub mod suppression;

pub use synthesizer::{EditKind, EditOperation, apply_edits, synthesize};
pub use suppression::{EchoState, Notification, SuppressionTable};
