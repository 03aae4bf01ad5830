//! Buffer registry collaborator.

use std::sync::Arc;

use mirrorsync_primitives::BufferUri;
use parking_lot::RwLock;

use crate::buffer::{BufferModel, TextBuffer};
use crate::config::{DEFAULT_SYNC_SIZE_LIMIT, SyncConfig};
use crate::event::{Emitter, Subscription};

/// Buffer-added listener.
pub type AddedListener = Box<dyn Fn(&Arc<dyn BufferModel>) + Send + Sync>;
/// Buffer-removed listener.
pub type RemovedListener = Box<dyn Fn(&BufferUri) + Send + Sync>;

/// Source of buffer add/remove notifications.
pub trait BufferSource: Send + Sync {
	/// Every currently known buffer.
	fn buffers(&self) -> Vec<Arc<dyn BufferModel>>;

	/// Notifies after a buffer is added.
	fn on_did_add(&self, listener: AddedListener) -> Subscription;

	/// Notifies after a buffer is removed.
	fn on_did_remove(&self, listener: RemovedListener) -> Subscription;
}

/// In-memory [`BufferSource`] keeping buffers in insertion order.
pub struct BufferRegistry {
	sync_size_limit: u64,
	buffers: RwLock<Vec<Arc<dyn BufferModel>>>,
	added: Emitter<Arc<dyn BufferModel>>,
	removed: Emitter<BufferUri>,
}

impl std::fmt::Debug for BufferRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BufferRegistry")
			.field("sync_size_limit", &self.sync_size_limit)
			.field("buffers", &self.len())
			.finish()
	}
}

impl Default for BufferRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_SYNC_SIZE_LIMIT)
	}
}

impl BufferRegistry {
	/// Creates an empty registry whose created buffers use `sync_size_limit`.
	pub fn new(sync_size_limit: u64) -> Self {
		Self {
			sync_size_limit,
			buffers: RwLock::new(Vec::new()),
			added: Emitter::new(),
			removed: Emitter::new(),
		}
	}

	/// Creates an empty registry using the configured size limit.
	pub fn from_config(config: &SyncConfig) -> Self {
		Self::new(config.sync_size_limit)
	}

	/// Creates a [`TextBuffer`] and adds it.
	pub fn create(&self, uri: impl Into<BufferUri>, text: &str, language_id: impl Into<String>) -> Arc<TextBuffer> {
		let buffer = Arc::new(TextBuffer::with_sync_limit(uri, text, language_id, self.sync_size_limit));
		self.add(buffer.clone());
		buffer
	}

	/// Adds a buffer, first removing any buffer already registered under its URI.
	pub fn add(&self, buffer: Arc<dyn BufferModel>) {
		let uri = buffer.uri();
		self.remove(&uri);
		self.buffers.write().push(Arc::clone(&buffer));
		tracing::trace!(uri = %uri, "registry.add");
		self.added.emit(&buffer);
	}

	/// Removes a buffer. Returns it if it was registered.
	pub fn remove(&self, uri: &BufferUri) -> Option<Arc<dyn BufferModel>> {
		let removed = {
			let mut buffers = self.buffers.write();
			let idx = buffers.iter().position(|b| &b.uri() == uri)?;
			buffers.remove(idx)
		};
		tracing::trace!(uri = %uri, "registry.remove");
		self.removed.emit(uri);
		Some(removed)
	}

	/// Looks up a buffer.
	pub fn get(&self, uri: &BufferUri) -> Option<Arc<dyn BufferModel>> {
		self.buffers.read().iter().find(|b| &b.uri() == uri).cloned()
	}

	/// Number of registered buffers.
	pub fn len(&self) -> usize {
		self.buffers.read().len()
	}

	/// Returns true when no buffers are registered.
	pub fn is_empty(&self) -> bool {
		self.buffers.read().is_empty()
	}
}

impl BufferSource for BufferRegistry {
	fn buffers(&self) -> Vec<Arc<dyn BufferModel>> {
		self.buffers.read().clone()
	}

	fn on_did_add(&self, listener: AddedListener) -> Subscription {
		self.added.subscribe(listener)
	}

	fn on_did_remove(&self, listener: RemovedListener) -> Subscription {
		self.removed.subscribe(listener)
	}
}
