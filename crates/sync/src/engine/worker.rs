use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use mirrorsync_worker::{EngineThread, TaskClass, WorkerGeneration};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Engine, EngineProvider, HostChannel};
use crate::bridge::{FileService, RemoteReadBridge};
use crate::error::{Result, SyncError};
use crate::grammar::GrammarSet;
use crate::protocol::WorkerMessage;
use crate::proxy::WorkerProxy;

/// One live worker: an engine thread plus the host task answering its reads.
///
/// Dropping the instance stops the thread once the messages already queued
/// are handled, and aborts the read bridge.
pub(crate) struct WorkerInstance {
	generation: WorkerGeneration,
	thread: EngineThread<WorkerMessage>,
	bridge: JoinHandle<()>,
}

impl std::fmt::Debug for WorkerInstance {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerInstance")
			.field("generation", &self.generation)
			.field("thread", &self.thread.name())
			.finish()
	}
}

impl WorkerInstance {
	/// Starts a worker for `grammars`.
	///
	/// Returns the instance immediately together with a future that resolves
	/// to the worker's proxy once the engine is built, or to the failure that
	/// prevented it.
	pub(crate) fn spawn(
		generation: WorkerGeneration,
		grammars: Arc<GrammarSet>,
		engines: Arc<dyn EngineProvider>,
		files: Arc<dyn FileService>,
		thread_name: &str,
	) -> Result<(Self, impl Future<Output = Result<WorkerProxy>> + Send + 'static)> {
		let (host_tx, host_rx) = mpsc::unbounded_channel();
		let bridge = mirrorsync_worker::spawn(TaskClass::Io, RemoteReadBridge::new(files).serve(host_rx));
		let host = HostChannel::new(host_tx);

		let started = EngineThread::start(
			format!("{thread_name}-{generation}"),
			move || -> Result<Box<dyn Engine>> {
				engines.load_matcher()?;
				engines.create(&grammars, host)
			},
			|engine: &mut Box<dyn Engine>, message: WorkerMessage| {
				engine.handle(message);
				ControlFlow::Continue(())
			},
		);
		let (thread, ready) = match started {
			Ok(started) => started,
			Err(err) => {
				bridge.abort();
				return Err(SyncError::Spawn(err));
			}
		};

		let port = thread.port();
		let resolved = async move {
			match ready.await {
				Ok(Ok(())) => Ok(WorkerProxy::new(generation, port)),
				Ok(Err(err)) => Err(err),
				Err(_) => Err(SyncError::WorkerGone),
			}
		};

		let instance = Self {
			generation,
			thread,
			bridge,
		};
		Ok((instance, resolved))
	}

	pub(crate) fn generation(&self) -> WorkerGeneration {
		self.generation
	}
}

impl Drop for WorkerInstance {
	fn drop(&mut self) {
		self.thread.stop();
		self.bridge.abort();
	}
}
