/// Position in line/character coordinates.
///
/// `character` counts Unicode scalar values from the start of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TextPosition {
	/// Zero-based line index.
	pub line: u32,
	/// Zero-based character offset in the line.
	pub character: u32,
}

impl TextPosition {
	/// Creates a new position.
	pub const fn new(line: u32, character: u32) -> Self {
		Self { line, character }
	}
}

/// Half-open range between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
	/// Start position (inclusive).
	pub start: TextPosition,
	/// End position (exclusive).
	pub end: TextPosition,
}

impl TextRange {
	/// Creates a new range.
	pub const fn new(start: TextPosition, end: TextPosition) -> Self {
		Self { start, end }
	}

	/// Creates a zero-length range at a position.
	pub const fn point(pos: TextPosition) -> Self {
		Self { start: pos, end: pos }
	}

	/// Returns true when start and end coincide.
	pub fn is_empty(&self) -> bool {
		self.start == self.end
	}
}

/// One edit inside a [`ChangeEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
	/// The range that was replaced, in pre-change coordinates.
	pub range: TextRange,
	/// The text that replaced the range.
	pub text: String,
	/// Buffer version after this change was applied.
	pub version: u64,
}

impl ContentChange {
	/// Creates a change replacing `range` with `text`, producing `version`.
	pub fn new(range: TextRange, text: impl Into<String>, version: u64) -> Self {
		Self {
			range,
			text: text.into(),
			version,
		}
	}
}

/// Ordered batch of changes emitted by one buffer mutation.
///
/// Changes must be applied in order; each one is expressed against the text
/// produced by its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangeEvent {
	/// The individual edits, in emission order.
	pub changes: Vec<ContentChange>,
}

impl ChangeEvent {
	/// Creates an event from an ordered list of changes.
	pub fn new(changes: Vec<ContentChange>) -> Self {
		Self { changes }
	}

	/// Version after the final change, if any.
	pub fn version(&self) -> Option<u64> {
		self.changes.last().map(|c| c.version)
	}

	/// Returns true if the event carries no edits.
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn event_version_is_last_change_version() {
		let event = ChangeEvent::new(vec![
			ContentChange::new(TextRange::default(), "a", 2),
			ContentChange::new(TextRange::default(), "b", 3),
		]);
		assert_eq!(event.version(), Some(3));
		assert_eq!(ChangeEvent::default().version(), None);
	}

	#[test]
	fn point_range_is_empty() {
		let range = TextRange::point(TextPosition::new(4, 2));
		assert!(range.is_empty());
		assert!(!TextRange::new(TextPosition::new(0, 0), TextPosition::new(0, 1)).is_empty());
	}
}
