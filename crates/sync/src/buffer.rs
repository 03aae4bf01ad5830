//! Host buffers as seen by the synchronization core.
//!
//! The core only observes buffers through [`BufferModel`]. [`TextBuffer`] is
//! a rope-backed implementation for hosts that do not bring their own.

use mirrorsync_primitives::{BufferUri, ChangeEvent, ContentChange, LineEnding, Rope, TextRange, apply_change, split_lines};
use parking_lot::RwLock;

use crate::config::DEFAULT_SYNC_SIZE_LIMIT;
use crate::event::{Emitter, Subscription};
use crate::protocol::BufferSnapshot;

/// Attach-state listener.
pub type AttachedListener = Box<dyn Fn(bool) + Send + Sync>;
/// Content-change listener.
pub type ContentListener = Box<dyn Fn(&ChangeEvent) + Send + Sync>;
/// Language-change listener.
pub type LanguageListener = Box<dyn Fn(&str) + Send + Sync>;

/// Observable buffer interface consumed by synchronizers.
///
/// Listeners must be invoked without internal locks held, since they read
/// the buffer back (for example to take a snapshot).
pub trait BufferModel: Send + Sync {
	/// Unique identifier.
	fn uri(&self) -> BufferUri;

	/// Current version.
	fn version(&self) -> u64;

	/// Consistent copy of the full content and metadata.
	fn snapshot(&self) -> BufferSnapshot;

	/// Whether the buffer is shown in at least one editor.
	fn is_attached(&self) -> bool;

	/// Whether the buffer exceeds the sync size limit. Fixed for the buffer's lifetime.
	fn is_too_large_for_sync(&self) -> bool;

	/// Notifies on attach-state transitions.
	fn on_did_change_attached(&self, listener: AttachedListener) -> Subscription;

	/// Notifies after each edit batch.
	fn on_did_change_content(&self, listener: ContentListener) -> Subscription;

	/// Notifies after the language identifier changes.
	fn on_did_change_language(&self, listener: LanguageListener) -> Subscription;
}

#[derive(Debug)]
struct BufferState {
	text: Rope,
	version: u64,
	eol: LineEnding,
	language_id: String,
	attached: bool,
}

/// Rope-backed [`BufferModel`].
///
/// Versions start at 1 and increase by one per applied change. The text uses
/// one line terminator throughout: the one detected at creation. Inserted
/// text is rewritten to it before the change is applied and emitted, so
/// `lines` plus `eol` always reconstruct the exact content. Mutators must be
/// called from one thread at a time; they emit after releasing the state
/// lock.
#[derive(Debug)]
pub struct TextBuffer {
	uri: BufferUri,
	too_large: bool,
	state: RwLock<BufferState>,
	attached_changed: Emitter<bool>,
	content_changed: Emitter<ChangeEvent>,
	language_changed: Emitter<String>,
}

impl TextBuffer {
	/// Creates a detached buffer using the default sync size limit.
	pub fn new(uri: impl Into<BufferUri>, text: &str, language_id: impl Into<String>) -> Self {
		Self::with_sync_limit(uri, text, language_id, DEFAULT_SYNC_SIZE_LIMIT)
	}

	/// Creates a detached buffer, flagging it too large when `text` exceeds `limit` bytes.
	pub fn with_sync_limit(uri: impl Into<BufferUri>, text: &str, language_id: impl Into<String>, limit: u64) -> Self {
		let eol = LineEnding::detect(text);
		Self {
			uri: uri.into(),
			too_large: text.len() as u64 > limit,
			state: RwLock::new(BufferState {
				text: Rope::from_str(&eol.normalize(text)),
				version: 1,
				eol,
				language_id: language_id.into(),
				attached: false,
			}),
			attached_changed: Emitter::new(),
			content_changed: Emitter::new(),
			language_changed: Emitter::new(),
		}
	}

	/// Returns the full text.
	pub fn text(&self) -> String {
		self.state.read().text.to_string()
	}

	/// Returns the language identifier.
	pub fn language_id(&self) -> String {
		self.state.read().language_id.clone()
	}

	/// Sets the attach state, notifying only on an actual transition.
	pub fn set_attached(&self, attached: bool) {
		{
			let mut state = self.state.write();
			if state.attached == attached {
				return;
			}
			state.attached = attached;
		}
		self.attached_changed.emit(&attached);
	}

	/// Applies edits in order and emits them as one change event.
	///
	/// Each range is expressed against the text left by the previous edit.
	/// Line breaks in inserted text are rewritten to the buffer's terminator.
	/// Returns the emitted event, or `None` when `edits` is empty.
	pub fn edit<I, S>(&self, edits: I) -> Option<ChangeEvent>
	where
		I: IntoIterator<Item = (TextRange, S)>,
		S: Into<String>,
	{
		let event = {
			let mut state = self.state.write();
			let mut changes = Vec::new();
			for (range, text) in edits {
				state.version += 1;
				let text: String = text.into();
				let text = state.eol.normalize(&text).into_owned();
				let change = ContentChange::new(range, text, state.version);
				apply_change(&mut state.text, &change);
				changes.push(change);
			}
			ChangeEvent::new(changes)
		};
		if event.is_empty() {
			return None;
		}
		self.content_changed.emit(&event);
		Some(event)
	}

	/// Changes the language identifier, notifying only when it differs.
	pub fn set_language(&self, language_id: impl Into<String>) {
		let language_id = language_id.into();
		{
			let mut state = self.state.write();
			if state.language_id == language_id {
				return;
			}
			state.language_id = language_id.clone();
		}
		self.language_changed.emit(&language_id);
	}
}

impl BufferModel for TextBuffer {
	fn uri(&self) -> BufferUri {
		self.uri.clone()
	}

	fn version(&self) -> u64 {
		self.state.read().version
	}

	fn snapshot(&self) -> BufferSnapshot {
		let state = self.state.read();
		BufferSnapshot {
			uri: self.uri.clone(),
			version: state.version,
			lines: split_lines(state.text.slice(..)),
			eol: state.eol,
			language_id: state.language_id.clone(),
		}
	}

	fn is_attached(&self) -> bool {
		self.state.read().attached
	}

	fn is_too_large_for_sync(&self) -> bool {
		self.too_large
	}

	fn on_did_change_attached(&self, listener: AttachedListener) -> Subscription {
		self.attached_changed.subscribe(move |attached: &bool| listener(*attached))
	}

	fn on_did_change_content(&self, listener: ContentListener) -> Subscription {
		self.content_changed.subscribe(listener)
	}

	fn on_did_change_language(&self, listener: LanguageListener) -> Subscription {
		self.language_changed.subscribe(move |language_id: &String| listener(language_id))
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use mirrorsync_primitives::TextPosition;
	use parking_lot::Mutex;
	use pretty_assertions::assert_eq;

	use super::*;

	fn at(line: u32, character: u32) -> TextRange {
		TextRange::point(TextPosition::new(line, character))
	}

	#[test]
	fn snapshot_reflects_content_and_eol() {
		let buffer = TextBuffer::new("file:///a.rs", "fn a() {}\r\nfn b() {}", "rust");
		let snapshot = buffer.snapshot();
		assert_eq!(snapshot.version, 1);
		assert_eq!(snapshot.lines, vec!["fn a() {}", "fn b() {}"]);
		assert_eq!(snapshot.eol, LineEnding::CrLf);
		assert_eq!(snapshot.text(), "fn a() {}\r\nfn b() {}");
	}

	#[test]
	fn text_uses_detected_eol_throughout() {
		let buffer = TextBuffer::new("file:///mixed.txt", "x\r\ny\nz\rw", "plaintext");
		assert_eq!(buffer.text(), "x\r\ny\r\nz\r\nw");
		assert_eq!(buffer.snapshot().lines, vec!["x", "y", "z", "w"]);

		let event = buffer.edit([(at(3, 1), "\n!\r")]).unwrap();
		assert_eq!(event.changes[0].text, "\r\n!\r\n");
		assert_eq!(buffer.text(), "x\r\ny\r\nz\r\nw\r\n!\r\n");
		assert_eq!(buffer.snapshot().text(), buffer.text());
	}

	#[test]
	fn unicode_separators_are_content() {
		let buffer = TextBuffer::new("file:///sep.txt", "a\u{2028}b\nc", "plaintext");
		assert_eq!(buffer.snapshot().lines, vec!["a\u{2028}b", "c"]);
		assert_eq!(buffer.snapshot().text(), buffer.text());
	}

	#[test]
	fn edit_bumps_version_per_change() {
		let buffer = TextBuffer::new("file:///a.txt", "ac", "plaintext");
		let event = buffer.edit([(at(0, 1), "b"), (at(0, 3), "d")]).unwrap();

		assert_eq!(buffer.text(), "abcd");
		assert_eq!(buffer.version(), 3);
		assert_eq!(event.changes.iter().map(|c| c.version).collect::<Vec<_>>(), vec![2, 3]);
		assert!(buffer.edit(Vec::<(TextRange, String)>::new()).is_none());
		assert_eq!(buffer.version(), 3);
	}

	#[test]
	fn attach_notifies_on_transitions_only() {
		let buffer = TextBuffer::new("file:///a.txt", "", "plaintext");
		let seen = Arc::new(Mutex::new(Vec::new()));
		let _sub = {
			let seen = Arc::clone(&seen);
			buffer.on_did_change_attached(Box::new(move |attached: bool| seen.lock().push(attached)))
		};

		buffer.set_attached(true);
		buffer.set_attached(true);
		buffer.set_attached(false);
		assert_eq!(*seen.lock(), vec![true, false]);
	}

	#[test]
	fn language_change_notifies_when_different() {
		let buffer = TextBuffer::new("file:///a.txt", "", "plaintext");
		let seen = Arc::new(Mutex::new(Vec::new()));
		let _sub = {
			let seen = Arc::clone(&seen);
			buffer.on_did_change_language(Box::new(move |lang: &str| seen.lock().push(lang.to_string())))
		};

		buffer.set_language("plaintext");
		buffer.set_language("markdown");
		assert_eq!(*seen.lock(), vec!["markdown".to_string()]);
		assert_eq!(buffer.language_id(), "markdown");
	}

	#[test]
	fn size_limit_is_fixed_at_creation() {
		let buffer = TextBuffer::with_sync_limit("file:///big.txt", "0123456789", "plaintext", 4);
		assert!(buffer.is_too_large_for_sync());
		buffer.edit([(TextRange::new(TextPosition::new(0, 0), TextPosition::new(0, 10)), "")]);
		assert!(buffer.is_too_large_for_sync());
		assert!(!TextBuffer::with_sync_limit("file:///s.txt", "0123", "plaintext", 4).is_too_large_for_sync());
	}

	#[test]
	fn listener_can_read_buffer_during_emit() {
		let buffer = Arc::new(TextBuffer::new("file:///a.txt", "x", "plaintext"));
		let versions = Arc::new(Mutex::new(Vec::new()));
		let _sub = {
			let weak = Arc::downgrade(&buffer);
			let versions = Arc::clone(&versions);
			buffer.on_did_change_content(Box::new(move |_: &ChangeEvent| {
				if let Some(buffer) = weak.upgrade() {
					versions.lock().push(buffer.snapshot().version);
				}
			}))
		};

		buffer.edit([(at(0, 1), "y")]);
		assert_eq!(*versions.lock(), vec![2]);
	}
}
