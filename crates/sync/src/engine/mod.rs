//! The off-thread processing engine seam.
//!
//! An [`EngineProvider`] is chosen once at startup. For every worker
//! generation it optionally loads its matcher library and then builds one
//! [`Engine`] on the engine thread. The engine only ever sees
//! [`WorkerMessage`]s and can reach back to the host through
//! [`HostChannel`].

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::error::{Result, SyncError};
use crate::grammar::GrammarSet;
use crate::protocol::{HostRequest, WorkerMessage};

mod mirror;
mod worker;

pub use mirror::{MirrorDocument, MirrorEngine, MirrorEngineProvider, MirrorStore};
pub(crate) use worker::WorkerInstance;

/// Worker-side message consumer. Lives on the engine thread.
pub trait Engine {
	/// Handles one message. Messages for one URI arrive in causal order.
	fn handle(&mut self, message: WorkerMessage);
}

/// Builds engines for new worker generations.
pub trait EngineProvider: Send + Sync + 'static {
	/// Loads the native matcher library engines depend on.
	///
	/// Runs on the engine thread before [`Self::create`]. Implementations
	/// that load something expensive should cache it across calls.
	fn load_matcher(&self) -> Result<()> {
		Ok(())
	}

	/// Builds the engine for one worker generation.
	fn create(&self, grammars: &GrammarSet, host: HostChannel) -> Result<Box<dyn Engine>>;
}

/// Engine-side handle for requests to the host.
#[derive(Debug, Clone)]
pub struct HostChannel {
	tx: mpsc::UnboundedSender<HostRequest>,
}

impl HostChannel {
	pub(crate) fn new(tx: mpsc::UnboundedSender<HostRequest>) -> Self {
		Self { tx }
	}

	/// Starts a read and returns the pending reply.
	pub fn request_read_file(&self, resource: Url) -> Result<oneshot::Receiver<Result<String>>> {
		let (reply, answer) = oneshot::channel();
		self.tx
			.send(HostRequest::ReadFile { resource, reply })
			.map_err(|_| SyncError::HostGone)?;
		Ok(answer)
	}

	/// Reads a resource through the host, blocking the calling thread.
	///
	/// Must not be called from inside an async runtime.
	pub fn read_file(&self, resource: Url) -> Result<String> {
		self.request_read_file(resource)?
			.blocking_recv()
			.map_err(|_| SyncError::HostGone)?
	}
}
