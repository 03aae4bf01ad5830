//! Per-buffer bridge from buffer events to worker messages.
//!
//! A [`BufferSynchronizer`] is synced exactly while its buffer is attached.
//! Entering sync sends a full snapshot, leaving it sends a removal, and while
//! synced every content batch and language change is forwarded verbatim.
//! Anything that happens while unsynced is dropped; the next snapshot
//! supersedes it.
//!
//! Buffers release their own lock before notifying, so a synchronizer built
//! off the host thread can take a snapshot that already contains a batch it
//! is about to be notified of. Batches at or below the snapshot version are
//! skipped, and the attach state is read under the synchronizer's lock so
//! that a concurrent detach always lands after the snapshot.

use std::sync::{Arc, Weak};

use mirrorsync_primitives::{BufferUri, ChangeEvent};
use mirrorsync_worker::WorkerGeneration;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::BufferModel;
use crate::event::SubscriptionSet;
use crate::protocol::WorkerMessage;
use crate::proxy::WorkerProxy;

#[derive(Debug, Default)]
struct SyncState {
	synced: bool,
	snapshot_version: u64,
	disposed: bool,
	subscriptions: SubscriptionSet,
}

struct Inner {
	uri: BufferUri,
	buffer: Weak<dyn BufferModel>,
	proxy: WorkerProxy,
	state: Mutex<SyncState>,
}

/// Mirrors one buffer into one worker generation.
///
/// Owns its buffer subscriptions. Dropping the synchronizer disposes it.
pub struct BufferSynchronizer {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for BufferSynchronizer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("BufferSynchronizer")
			.field("uri", &self.inner.uri)
			.field("generation", &self.inner.proxy.generation())
			.field("synced", &state.synced)
			.field("disposed", &state.disposed)
			.finish()
	}
}

impl BufferSynchronizer {
	/// Subscribes to `buffer` and begins sync right away if it is attached.
	pub fn new(proxy: WorkerProxy, buffer: &Arc<dyn BufferModel>) -> Self {
		let inner = Arc::new(Inner {
			uri: buffer.uri(),
			buffer: Arc::downgrade(buffer),
			proxy,
			state: Mutex::new(SyncState::default()),
		});

		let mut subscriptions = SubscriptionSet::new();
		let weak = Arc::downgrade(&inner);
		subscriptions.push(buffer.on_did_change_attached(Box::new(move |attached: bool| {
			if let Some(inner) = weak.upgrade() {
				inner.on_attached_changed(attached);
			}
		})));
		let weak = Arc::downgrade(&inner);
		subscriptions.push(buffer.on_did_change_content(Box::new(move |event: &ChangeEvent| {
			if let Some(inner) = weak.upgrade() {
				inner.on_content_changed(event);
			}
		})));
		let weak = Arc::downgrade(&inner);
		subscriptions.push(buffer.on_did_change_language(Box::new(move |language_id: &str| {
			if let Some(inner) = weak.upgrade() {
				inner.on_language_changed(language_id);
			}
		})));
		inner.state.lock().subscriptions = subscriptions;

		inner.begin_sync_if_attached();
		Self { inner }
	}

	/// The buffer this synchronizer mirrors.
	pub fn uri(&self) -> &BufferUri {
		&self.inner.uri
	}

	/// Worker generation messages are sent to.
	pub fn generation(&self) -> WorkerGeneration {
		self.inner.proxy.generation()
	}

	/// Whether the worker currently holds a mirror established by this synchronizer.
	pub fn is_synced(&self) -> bool {
		self.inner.state.lock().synced
	}

	/// Whether [`Self::dispose`] has run.
	pub fn is_disposed(&self) -> bool {
		self.inner.state.lock().disposed
	}

	/// Sends a full snapshot and starts forwarding. No-op while already synced.
	pub fn begin_sync(&self) {
		self.inner.begin_sync();
	}

	/// Sends a removal and stops forwarding. No-op while unsynced.
	pub fn end_sync(&self) {
		self.inner.end_sync();
	}

	/// Unsubscribes from the buffer and sends one unconditional removal.
	///
	/// Later calls do nothing.
	pub fn dispose(&self) {
		self.inner.dispose();
	}
}

impl Drop for BufferSynchronizer {
	fn drop(&mut self) {
		self.inner.dispose();
	}
}

impl Inner {
	fn on_attached_changed(&self, attached: bool) {
		if attached {
			self.begin_sync();
		} else {
			self.end_sync();
		}
	}

	fn on_content_changed(&self, event: &ChangeEvent) {
		let state = self.state.lock();
		if !state.synced {
			trace!(uri = %self.uri, changes = event.changes.len(), "sync.edits_dropped");
			return;
		}
		if event.version().is_some_and(|version| version <= state.snapshot_version) {
			trace!(uri = %self.uri, version = event.version(), "sync.edits_superseded");
			return;
		}
		trace!(uri = %self.uri, version = event.version(), changes = event.changes.len(), "sync.edits");
		self.proxy.send(WorkerMessage::Edits {
			uri: self.uri.clone(),
			event: event.clone(),
		});
	}

	fn on_language_changed(&self, language_id: &str) {
		let state = self.state.lock();
		if !state.synced {
			trace!(uri = %self.uri, language_id, "sync.language_dropped");
			return;
		}
		debug!(uri = %self.uri, language_id, "sync.language");
		self.proxy.send(WorkerMessage::LanguageChanged {
			uri: self.uri.clone(),
			language_id: language_id.to_string(),
		});
	}

	fn begin_sync(&self) {
		self.start(false);
	}

	fn begin_sync_if_attached(&self) {
		self.start(true);
	}

	fn start(&self, require_attached: bool) {
		let Some(buffer) = self.buffer.upgrade() else {
			return;
		};
		let mut state = self.state.lock();
		if state.synced || state.disposed || (require_attached && !buffer.is_attached()) {
			return;
		}
		state.synced = true;
		let snapshot = buffer.snapshot();
		state.snapshot_version = snapshot.version;
		debug!(
			uri = %self.uri,
			version = snapshot.version,
			generation = self.proxy.generation().get(),
			"sync.begin"
		);
		self.proxy.send(WorkerMessage::Snapshot(snapshot));
	}

	fn end_sync(&self) {
		let mut state = self.state.lock();
		if !state.synced {
			return;
		}
		state.synced = false;
		debug!(uri = %self.uri, generation = self.proxy.generation().get(), "sync.end");
		self.proxy.send(WorkerMessage::Removed { uri: self.uri.clone() });
	}

	fn dispose(&self) {
		let mut subscriptions = {
			let mut state = self.state.lock();
			if state.disposed {
				return;
			}
			state.disposed = true;
			state.synced = false;
			std::mem::take(&mut state.subscriptions)
		};
		subscriptions.release_all();
		debug!(uri = %self.uri, generation = self.proxy.generation().get(), "sync.dispose");
		self.proxy.send(WorkerMessage::Removed { uri: self.uri.clone() });
	}
}

#[cfg(test)]
mod tests;
