//! Core types shared between the host and the engine thread: buffer
//! identifiers, positions, content changes, and rope editing helpers.

/// Content change primitives (position/range/change/event).
pub mod change;
/// End-of-line markers.
pub mod eol;
/// Rope utilities for applying changes and splitting lines.
pub mod rope;
/// Buffer identifiers.
pub mod uri;

pub use change::{ChangeEvent, ContentChange, TextPosition, TextRange};
pub use eol::LineEnding;
pub use rope::{apply_change, position_to_char, split_lines};
pub use ropey::Rope;
pub use uri::BufferUri;
