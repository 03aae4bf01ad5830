//! Worker lifecycle and synchronizer registry.
//!
//! The manager owns at most one live worker and one [`BufferSynchronizer`]
//! per buffer URI. Grammar-set events drive kill/respawn; buffer registry
//! events create and dispose synchronizers.
//!
//! # Spawn races
//!
//! Proxy resolution is asynchronous. Each spawn draws a fresh
//! [`WorkerGeneration`]; when the resolution arrives it is only applied if
//! that generation is still the live worker. A resolution for a killed or
//! replaced worker is counted and dropped without touching the registry.
//!
//! # Locking
//!
//! Worker, proxy and synchronizer map share one mutex. Synchronizers are
//! created under it so that no URI ever has two live synchronizers; the lock
//! is released before synchronizers are disposed in bulk and is never held
//! across an await or while a registry or grammar listener runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mirrorsync_primitives::BufferUri;
use mirrorsync_worker::{GenerationClock, TaskClass, WorkerGeneration};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::bridge::{FileService, LocalFileService};
use crate::buffer::BufferModel;
use crate::config::SyncConfig;
use crate::engine::{EngineProvider, WorkerInstance};
use crate::error::Result;
use crate::event::SubscriptionSet;
use crate::grammar::{GrammarSet, GrammarSetEvent, GrammarSource};
use crate::proxy::WorkerProxy;
use crate::registry::BufferSource;
use crate::synchronizer::BufferSynchronizer;

/// Collaborators and configuration handed to the manager at construction.
pub struct ManagerContext {
	pub config: SyncConfig,
	pub buffers: Arc<dyn BufferSource>,
	pub grammars: Arc<dyn GrammarSource>,
	pub engines: Arc<dyn EngineProvider>,
	pub files: Arc<dyn FileService>,
}

impl ManagerContext {
	/// Creates a context reading files from the local filesystem.
	pub fn new(
		config: SyncConfig,
		buffers: Arc<dyn BufferSource>,
		grammars: Arc<dyn GrammarSource>,
		engines: Arc<dyn EngineProvider>,
	) -> Self {
		Self {
			config,
			buffers,
			grammars,
			engines,
			files: Arc::new(LocalFileService),
		}
	}

	/// Replaces the file service answering engine reads.
	#[must_use]
	pub fn with_files(mut self, files: Arc<dyn FileService>) -> Self {
		self.files = files;
		self
	}
}

impl std::fmt::Debug for ManagerContext {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ManagerContext").field("config", &self.config).finish_non_exhaustive()
	}
}

/// Fields drop in order: synchronizers queue their removals before the
/// worker queues its stop request.
#[derive(Default)]
struct ManagerState {
	synchronizers: HashMap<BufferUri, BufferSynchronizer>,
	proxy: Option<WorkerProxy>,
	worker: Option<WorkerInstance>,
	subscriptions: SubscriptionSet,
	shut_down: bool,
}

impl ManagerState {
	fn take_worker(&mut self) -> Option<(WorkerInstance, Vec<BufferSynchronizer>)> {
		self.proxy = None;
		let synchronizers = self.synchronizers.drain().map(|(_, s)| s).collect();
		self.worker.take().map(|worker| (worker, synchronizers))
	}
}

struct Inner {
	config: SyncConfig,
	buffers: Arc<dyn BufferSource>,
	grammars: Arc<dyn GrammarSource>,
	engines: Arc<dyn EngineProvider>,
	files: Arc<dyn FileService>,
	clock: GenerationClock,
	state: Mutex<ManagerState>,
	stale_resolutions: AtomicUsize,
}

/// Owns the worker lifecycle and the per-URI synchronizers.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WorkerLifecycleManager {
	inner: Arc<Inner>,
}

impl std::fmt::Debug for WorkerLifecycleManager {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let state = self.inner.state.lock();
		f.debug_struct("WorkerLifecycleManager")
			.field("generation", &state.worker.as_ref().map(WorkerInstance::generation))
			.field("ready", &state.proxy.is_some())
			.field("synchronizers", &state.synchronizers.len())
			.finish()
	}
}

impl WorkerLifecycleManager {
	/// Subscribes to the registry and grammar source, and spawns a worker if
	/// offload is enabled and a grammar set already exists.
	pub fn new(ctx: ManagerContext) -> Self {
		let inner = Arc::new(Inner {
			config: ctx.config,
			buffers: ctx.buffers,
			grammars: ctx.grammars,
			engines: ctx.engines,
			files: ctx.files,
			clock: GenerationClock::new(),
			state: Mutex::new(ManagerState::default()),
			stale_resolutions: AtomicUsize::new(0),
		});

		let mut subscriptions = SubscriptionSet::new();
		let weak = Arc::downgrade(&inner);
		subscriptions.push(inner.buffers.on_did_add(Box::new(move |buffer: &Arc<dyn BufferModel>| {
			if let Some(inner) = weak.upgrade() {
				inner.on_buffer_added(buffer);
			}
		})));
		let weak = Arc::downgrade(&inner);
		subscriptions.push(inner.buffers.on_did_remove(Box::new(move |uri: &BufferUri| {
			if let Some(inner) = weak.upgrade() {
				inner.on_buffer_removed(uri);
			}
		})));
		let weak = Arc::downgrade(&inner);
		subscriptions.push(inner.grammars.on_did_change(Box::new(move |event: &GrammarSetEvent| {
			if let Some(inner) = weak.upgrade() {
				inner.handle_grammar_event(event);
			}
		})));
		inner.state.lock().subscriptions = subscriptions;

		debug!(worker_offload = inner.config.worker_offload, "worker.manager_init");
		if inner.config.worker_offload
			&& let Some(set) = inner.grammars.current()
		{
			inner.spawn(set);
		}
		Self { inner }
	}

	/// Kills any live worker and starts a new one for `grammars`.
	///
	/// Returns once the worker is started; synchronizers appear after it
	/// reports ready.
	pub fn spawn(&self, grammars: Arc<GrammarSet>) {
		self.inner.spawn(grammars);
	}

	/// Disposes every synchronizer and the live worker. No-op without one.
	pub fn kill(&self) {
		self.inner.kill();
	}

	/// Creates a synchronizer for a newly added buffer when eligible.
	pub fn on_buffer_added(&self, buffer: &Arc<dyn BufferModel>) {
		self.inner.on_buffer_added(buffer);
	}

	/// Disposes the synchronizer registered for a removed buffer.
	pub fn on_buffer_removed(&self, uri: &BufferUri) {
		self.inner.on_buffer_removed(uri);
	}

	/// Reacts to a grammar set being created or disposed.
	pub fn handle_grammar_event(&self, event: &GrammarSetEvent) {
		self.inner.handle_grammar_event(event);
	}

	/// Unsubscribes from all collaborators and kills the worker. Later
	/// events and spawns are ignored.
	pub fn shutdown(&self) {
		self.inner.shutdown();
	}

	/// Whether a worker has been started and not killed.
	pub fn has_live_worker(&self) -> bool {
		self.inner.state.lock().worker.is_some()
	}

	/// Whether the live worker's proxy has resolved.
	pub fn is_ready(&self) -> bool {
		self.inner.state.lock().proxy.is_some()
	}

	/// Generation of the live worker.
	pub fn generation(&self) -> Option<WorkerGeneration> {
		self.inner.state.lock().worker.as_ref().map(WorkerInstance::generation)
	}

	/// Number of registered synchronizers.
	pub fn synchronizer_count(&self) -> usize {
		self.inner.state.lock().synchronizers.len()
	}

	/// Whether a synchronizer is registered for `uri`.
	pub fn has_synchronizer(&self, uri: &BufferUri) -> bool {
		self.inner.state.lock().synchronizers.contains_key(uri)
	}

	/// URIs whose synchronizer is currently synced, sorted.
	pub fn synced_uris(&self) -> Vec<BufferUri> {
		let mut uris: Vec<_> = self
			.inner
			.state
			.lock()
			.synchronizers
			.values()
			.filter(|s| s.is_synced())
			.map(|s| s.uri().clone())
			.collect();
		uris.sort();
		uris
	}

	/// Number of proxy resolutions discarded because their worker was no
	/// longer live.
	pub fn stale_resolution_count(&self) -> usize {
		self.inner.stale_resolutions.load(Ordering::Acquire)
	}
}

impl Inner {
	fn spawn(self: &Arc<Self>, grammars: Arc<GrammarSet>) {
		self.kill();
		if self.state.lock().shut_down {
			return;
		}

		let generation = self.clock.next();
		let spawned = WorkerInstance::spawn(
			generation,
			Arc::clone(&grammars),
			Arc::clone(&self.engines),
			Arc::clone(&self.files),
			&self.config.engine_thread_name,
		);
		let (worker, ready) = match spawned {
			Ok(spawned) => spawned,
			Err(err) => {
				warn!(generation = generation.get(), error = %err, "worker.spawn_failed");
				return;
			}
		};

		let replaced = {
			let mut state = self.state.lock();
			if state.shut_down {
				return;
			}
			let replaced = state.take_worker();
			state.worker = Some(worker);
			replaced
		};
		if let Some(replaced) = replaced {
			retire(replaced);
		}
		debug!(
			generation = generation.get(),
			grammar_version = grammars.version,
			grammars = grammars.definitions.len(),
			"worker.spawn"
		);

		let weak = Arc::downgrade(self);
		mirrorsync_worker::spawn(TaskClass::Host, async move {
			let resolved = ready.await;
			if let Some(inner) = weak.upgrade() {
				inner.on_worker_resolved(generation, resolved);
			}
		});
	}

	fn on_worker_resolved(&self, generation: WorkerGeneration, resolved: Result<WorkerProxy>) {
		let mut state = self.state.lock();
		if state.worker.as_ref().map(WorkerInstance::generation) != Some(generation) {
			self.stale_resolutions.fetch_add(1, Ordering::AcqRel);
			debug!(generation = generation.get(), ok = resolved.is_ok(), "worker.stale");
			return;
		}

		let proxy = match resolved {
			Ok(proxy) => proxy,
			Err(err) => {
				warn!(generation = generation.get(), error = %err, "worker.spawn_failed");
				state.worker = None;
				return;
			}
		};
		state.proxy = Some(proxy.clone());

		let mut caught_up = 0usize;
		for buffer in self.buffers.buffers() {
			if !buffer.is_attached() || buffer.is_too_large_for_sync() {
				continue;
			}
			let uri = buffer.uri();
			if state.synchronizers.contains_key(&uri) {
				continue;
			}
			state
				.synchronizers
				.insert(uri, BufferSynchronizer::new(proxy.clone(), &buffer));
			caught_up += 1;
		}
		debug!(generation = generation.get(), caught_up, "worker.ready");
	}

	fn kill(&self) {
		let taken = self.state.lock().take_worker();
		if let Some(taken) = taken {
			retire(taken);
		}
	}

	fn on_buffer_added(&self, buffer: &Arc<dyn BufferModel>) {
		if buffer.is_too_large_for_sync() {
			trace!(uri = %buffer.uri(), "sync.skip_oversized");
			return;
		}
		let mut state = self.state.lock();
		let Some(proxy) = state.proxy.clone() else {
			return;
		};
		let uri = buffer.uri();
		if let Some(old) = state.synchronizers.remove(&uri) {
			old.dispose();
		}
		state.synchronizers.insert(uri, BufferSynchronizer::new(proxy, buffer));
	}

	fn on_buffer_removed(&self, uri: &BufferUri) {
		let removed = self.state.lock().synchronizers.remove(uri);
		if let Some(synchronizer) = removed {
			synchronizer.dispose();
		}
	}

	fn handle_grammar_event(self: &Arc<Self>, event: &GrammarSetEvent) {
		match event {
			GrammarSetEvent::Created(set) if self.config.worker_offload => self.spawn(Arc::clone(set)),
			GrammarSetEvent::Created(_) | GrammarSetEvent::Disposed => self.kill(),
		}
	}

	fn shutdown(&self) {
		let mut subscriptions = {
			let mut state = self.state.lock();
			if state.shut_down {
				return;
			}
			state.shut_down = true;
			std::mem::take(&mut state.subscriptions)
		};
		subscriptions.release_all();
		self.kill();
		debug!("worker.shutdown");
	}
}

/// Disposes synchronizers before the worker so their removals are queued
/// ahead of the stop request.
fn retire((worker, synchronizers): (WorkerInstance, Vec<BufferSynchronizer>)) {
	let disposed = synchronizers.len();
	for synchronizer in &synchronizers {
		synchronizer.dispose();
	}
	debug!(generation = worker.generation().get(), disposed, "worker.kill");
	drop(worker);
}
