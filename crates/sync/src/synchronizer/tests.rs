use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use mirrorsync_primitives::{TextPosition, TextRange};
use mirrorsync_worker::GenerationClock;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tokio::sync::mpsc;

use super::*;
use crate::buffer::{AttachedListener, ContentListener, LanguageListener, TextBuffer};
use crate::engine::{Engine, MirrorEngine, MirrorStore};
use crate::event::{Emitter, Subscription};
use crate::protocol::BufferSnapshot;

fn proxy() -> (WorkerProxy, mpsc::UnboundedReceiver<WorkerMessage>) {
	let (tx, rx) = mpsc::unbounded_channel();
	(WorkerProxy::new(GenerationClock::new().next(), tx), rx)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<WorkerMessage>) -> Vec<WorkerMessage> {
	let mut out = Vec::new();
	while let Ok(msg) = rx.try_recv() {
		out.push(msg);
	}
	out
}

fn kinds(messages: &[WorkerMessage]) -> Vec<&'static str> {
	messages.iter().map(WorkerMessage::kind).collect()
}

fn new_buffer(text: &str) -> (Arc<TextBuffer>, Arc<dyn BufferModel>) {
	let buffer = Arc::new(TextBuffer::new("file:///sync.txt", text, "plaintext"));
	let model: Arc<dyn BufferModel> = buffer.clone();
	(buffer, model)
}

fn append(buffer: &TextBuffer, text: &str) {
	let end = buffer.text().chars().count() as u32;
	buffer.edit([(TextRange::point(TextPosition::new(0, end)), text)]);
}

#[test]
fn detached_buffer_sends_nothing_until_attached() {
	let (buffer, model) = new_buffer("a");
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	append(&buffer, "b");
	assert!(drain(&mut rx).is_empty());
	assert!(!sync.is_synced());

	buffer.set_attached(true);
	let messages = drain(&mut rx);
	let [WorkerMessage::Snapshot(snapshot)] = messages.as_slice() else {
		panic!("expected one snapshot, got {messages:?}");
	};
	assert_eq!(snapshot.version, 2);
	assert_eq!(snapshot.lines, vec!["ab"]);
	assert!(sync.is_synced());
}

#[test]
fn attached_buffer_syncs_on_construction() {
	let (buffer, model) = new_buffer("x");
	buffer.set_attached(true);
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	assert_eq!(kinds(&drain(&mut rx)), vec!["snapshot"]);
	assert!(sync.is_synced());
}

#[test]
fn attach_edit_detach_reattach() {
	let (buffer, model) = new_buffer("");
	let (proxy, mut rx) = proxy();
	let _sync = BufferSynchronizer::new(proxy, &model);

	buffer.set_attached(true);
	append(&buffer, "a");
	buffer.set_attached(false);
	append(&buffer, "b");
	append(&buffer, "c");
	buffer.set_attached(true);

	let messages = drain(&mut rx);
	assert_eq!(kinds(&messages), vec!["snapshot", "edits", "removed", "snapshot"]);
	let WorkerMessage::Edits { event, .. } = &messages[1] else {
		unreachable!()
	};
	assert_eq!(event.version(), Some(2));
	let WorkerMessage::Snapshot(last) = &messages[3] else {
		unreachable!()
	};
	assert_eq!(last.version, 4);
	assert_eq!(last.text(), "abc");
}

#[test]
fn language_change_forwarded_only_while_synced() {
	let (buffer, model) = new_buffer("");
	let (proxy, mut rx) = proxy();
	let _sync = BufferSynchronizer::new(proxy, &model);

	buffer.set_language("markdown");
	assert!(drain(&mut rx).is_empty());

	buffer.set_attached(true);
	buffer.set_language("rust");
	let messages = drain(&mut rx);
	assert_eq!(kinds(&messages), vec!["snapshot", "language"]);
	let WorkerMessage::Snapshot(snapshot) = &messages[0] else {
		unreachable!()
	};
	assert_eq!(snapshot.language_id, "markdown");
}

#[test]
fn dispose_sends_one_removal_and_unsubscribes() {
	let (buffer, model) = new_buffer("");
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	sync.dispose();
	sync.dispose();
	buffer.set_attached(true);
	append(&buffer, "late");

	assert_eq!(kinds(&drain(&mut rx)), vec!["removed"]);
	assert!(sync.is_disposed());
	assert!(!sync.is_synced());
}

#[test]
fn dispose_after_detach_sends_second_removal() {
	let (buffer, model) = new_buffer("");
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	buffer.set_attached(true);
	buffer.set_attached(false);
	drop(sync);

	assert_eq!(kinds(&drain(&mut rx)), vec!["snapshot", "removed", "removed"]);
}

#[test]
fn explicit_begin_and_end_are_guarded() {
	let (buffer, model) = new_buffer("");
	buffer.set_attached(true);
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	sync.begin_sync();
	sync.end_sync();
	sync.end_sync();

	assert_eq!(kinds(&drain(&mut rx)), vec!["snapshot", "removed"]);
}

#[test]
fn dropped_buffer_never_syncs() {
	let (buffer, model) = new_buffer("");
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);
	drop((buffer, model));

	sync.begin_sync();
	assert!(!sync.is_synced());
	drop(sync);
	assert_eq!(kinds(&drain(&mut rx)), vec!["removed"]);
}

#[test]
fn batch_already_in_snapshot_is_not_forwarded() {
	let (buffer, model) = new_buffer("a");
	buffer.set_attached(true);
	let pending = buffer.edit([(TextRange::point(TextPosition::new(0, 1)), "b")]).unwrap();
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);

	// Notification for a batch applied before the snapshot was taken.
	sync.inner.on_content_changed(&pending);
	append(&buffer, "c");

	let messages = drain(&mut rx);
	assert_eq!(kinds(&messages), vec!["snapshot", "edits"]);
	let WorkerMessage::Edits { event, .. } = &messages[1] else {
		unreachable!()
	};
	assert_eq!(event.version(), Some(3));

	let store = MirrorStore::new();
	let mut engine = MirrorEngine::new(store.clone());
	for message in messages {
		engine.handle(message);
	}
	assert_eq!(store.text(sync.uri()), Some(buffer.text()));
	assert_eq!(store.version_gaps(), 0);
}

/// Reports itself attached once, then announces a detach from another
/// thread, as a host thread would while a synchronizer is being built
/// elsewhere.
struct DetachingBuffer {
	text: TextBuffer,
	attached: AtomicBool,
	attached_changed: Arc<Emitter<bool>>,
	detacher: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl DetachingBuffer {
	fn new(text: &str) -> Self {
		Self {
			text: TextBuffer::new("file:///racing.txt", text, "plaintext"),
			attached: AtomicBool::new(true),
			attached_changed: Arc::new(Emitter::new()),
			detacher: parking_lot::Mutex::new(None),
		}
	}

	fn join_detacher(&self) {
		if let Some(handle) = self.detacher.lock().take() {
			handle.join().unwrap();
		}
	}
}

impl BufferModel for DetachingBuffer {
	fn uri(&self) -> BufferUri {
		self.text.uri()
	}

	fn version(&self) -> u64 {
		self.text.version()
	}

	fn snapshot(&self) -> BufferSnapshot {
		self.text.snapshot()
	}

	fn is_attached(&self) -> bool {
		if !self.attached.swap(false, Ordering::AcqRel) {
			return false;
		}
		let emitter = Arc::clone(&self.attached_changed);
		*self.detacher.lock() = Some(std::thread::spawn(move || emitter.emit(&false)));
		true
	}

	fn is_too_large_for_sync(&self) -> bool {
		false
	}

	fn on_did_change_attached(&self, listener: AttachedListener) -> Subscription {
		self.attached_changed.subscribe(move |attached: &bool| listener(*attached))
	}

	fn on_did_change_content(&self, listener: ContentListener) -> Subscription {
		self.text.on_did_change_content(listener)
	}

	fn on_did_change_language(&self, listener: LanguageListener) -> Subscription {
		self.text.on_did_change_language(listener)
	}
}

#[test]
fn detach_during_construction_ends_sync() {
	let buffer = Arc::new(DetachingBuffer::new("text"));
	let model: Arc<dyn BufferModel> = buffer.clone();
	let (proxy, mut rx) = proxy();
	let sync = BufferSynchronizer::new(proxy, &model);
	buffer.join_detacher();

	assert_eq!(kinds(&drain(&mut rx)), vec!["snapshot", "removed"]);
	assert!(!sync.is_synced());
}

proptest! {
	/// Snapshot and removal counts track attach transitions, and every edit
	/// batch sent while attached arrives exactly once, in order.
	#[test]
	fn messages_follow_attach_transitions(steps in prop::collection::vec(prop_oneof![
		Just(None),
		any::<bool>().prop_map(Some),
	], 0..40)) {
		let (buffer, model) = new_buffer("");
		let (proxy, mut rx) = proxy();
		let sync = BufferSynchronizer::new(proxy, &model);

		let mut attached = false;
		let mut expected = Vec::new();
		for step in steps {
			match step {
				Some(next) => {
					if next && !attached {
						expected.push("snapshot");
					} else if !next && attached {
						expected.push("removed");
					}
					attached = next;
					buffer.set_attached(next);
				}
				None => {
					if attached {
						expected.push("edits");
					}
					append(&buffer, "x");
				}
			}
		}

		let messages = drain(&mut rx);
		prop_assert_eq!(kinds(&messages), expected);
		prop_assert_eq!(sync.is_synced(), attached);

		let versions: Vec<u64> = messages
			.iter()
			.filter_map(|m| match m {
				WorkerMessage::Edits { event, .. } => event.version(),
				_ => None,
			})
			.collect();
		prop_assert!(versions.windows(2).all(|w| w[0] < w[1]));
	}
}
