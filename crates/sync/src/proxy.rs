//! Fire-and-forget handle to a resolved worker.

use std::sync::Arc;

use mirrorsync_worker::{ThreadPort, WorkerGeneration};
use tokio::sync::mpsc;

use crate::protocol::WorkerMessage;

/// Destination for worker messages.
pub trait MessageSink: Send + Sync {
	/// Delivers one message without waiting. Returns it back if the
	/// receiver is gone.
	fn deliver(&self, message: WorkerMessage) -> Result<(), WorkerMessage>;
}

impl MessageSink for ThreadPort<WorkerMessage> {
	fn deliver(&self, message: WorkerMessage) -> Result<(), WorkerMessage> {
		self.send(message)
	}
}

impl MessageSink for mpsc::UnboundedSender<WorkerMessage> {
	fn deliver(&self, message: WorkerMessage) -> Result<(), WorkerMessage> {
		self.send(message).map_err(|err| err.0)
	}
}

/// Cloneable send handle bound to one worker generation.
///
/// Sends never block and are never acknowledged. A message sent after the
/// worker exited is dropped with a trace.
#[derive(Clone)]
pub struct WorkerProxy {
	generation: WorkerGeneration,
	sink: Arc<dyn MessageSink>,
}

impl std::fmt::Debug for WorkerProxy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WorkerProxy").field("generation", &self.generation).finish()
	}
}

impl WorkerProxy {
	/// Binds a sink to a worker generation.
	pub fn new(generation: WorkerGeneration, sink: impl MessageSink + 'static) -> Self {
		Self {
			generation,
			sink: Arc::new(sink),
		}
	}

	/// The worker generation this proxy talks to.
	pub fn generation(&self) -> WorkerGeneration {
		self.generation
	}

	/// Sends one message.
	pub fn send(&self, message: WorkerMessage) {
		if let Err(message) = self.sink.deliver(message) {
			tracing::debug!(
				generation = self.generation.get(),
				uri = %message.uri(),
				kind = message.kind(),
				"worker.send_dropped"
			);
		}
	}
}

#[cfg(test)]
mod tests {
	use mirrorsync_primitives::BufferUri;
	use mirrorsync_worker::GenerationClock;

	use super::*;

	#[test]
	fn send_after_receiver_dropped_is_silent() {
		let (tx, rx) = mpsc::unbounded_channel();
		let proxy = WorkerProxy::new(GenerationClock::new().next(), tx);
		drop(rx);
		proxy.send(WorkerMessage::Removed {
			uri: BufferUri::new("file:///a"),
		});
	}

	#[test]
	fn clones_share_the_sink() {
		let (tx, mut rx) = mpsc::unbounded_channel();
		let proxy = WorkerProxy::new(GenerationClock::new().next(), tx);
		let other = proxy.clone();
		proxy.send(WorkerMessage::Removed {
			uri: BufferUri::new("file:///a"),
		});
		other.send(WorkerMessage::Removed {
			uri: BufferUri::new("file:///b"),
		});
		assert_eq!(rx.try_recv().unwrap().uri().as_str(), "file:///a");
		assert_eq!(rx.try_recv().unwrap().uri().as_str(), "file:///b");
		assert_eq!(other.generation(), proxy.generation());
	}
}
