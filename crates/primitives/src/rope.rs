use ropey::{Rope, RopeSlice};

use crate::change::{ContentChange, TextPosition};

/// Returns the char length of `line` without its `\n` or `\r\n` terminator.
///
/// Lines break on `\n` only; a `\r` not followed by `\n` is content.
fn line_content_len(line: RopeSlice) -> usize {
	let mut len = line.len_chars();
	if len == 0 || line.char(len - 1) != '\n' {
		return len;
	}
	len -= 1;
	if len > 0 && line.char(len - 1) == '\r' {
		len -= 1;
	}
	len
}

/// Converts a line/character position into a char index.
///
/// Lines past the end clamp to the end of the text; characters past the end
/// of a line clamp to the end of that line's content.
pub fn position_to_char(text: RopeSlice, pos: TextPosition) -> usize {
	let line = pos.line as usize;
	if line >= text.len_lines() {
		return text.len_chars();
	}
	let start = text.line_to_char(line);
	start + (pos.character as usize).min(line_content_len(text.line(line)))
}

/// Applies one change to `rope` in place.
pub fn apply_change(rope: &mut Rope, change: &ContentChange) {
	let start = position_to_char(rope.slice(..), change.range.start);
	let end = position_to_char(rope.slice(..), change.range.end).max(start);
	if end > start {
		rope.remove(start..end);
	}
	if !change.text.is_empty() {
		rope.insert(start, &change.text);
	}
}

/// Splits text into lines with their terminators stripped.
///
/// A trailing line break yields a final empty line.
pub fn split_lines(text: RopeSlice) -> Vec<String> {
	text.lines()
		.map(|line| {
			let len = line_content_len(line);
			line.slice(..len).to_string()
		})
		.collect()
}
