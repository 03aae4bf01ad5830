use std::any::Any;
use std::ops::ControlFlow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use crate::{TaskClass, spawn_named_thread};

enum Envelope<M> {
	Message(M),
	Stop,
}

/// Resolves once the engine thread finished its init step.
///
/// Yields `Ok(Ok(()))` when the engine is ready, `Ok(Err(e))` when init
/// returned an error, and `Err(_)` when init panicked.
pub type ReadySignal<E> = oneshot::Receiver<Result<(), E>>;

/// Cloneable fire-and-forget send port into an [`EngineThread`].
pub struct ThreadPort<M> {
	tx: mpsc::UnboundedSender<Envelope<M>>,
}

impl<M> Clone for ThreadPort<M> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<M> std::fmt::Debug for ThreadPort<M> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ThreadPort").field("closed", &self.tx.is_closed()).finish()
	}
}

impl<M> ThreadPort<M> {
	/// Enqueues one message without waiting.
	///
	/// Returns the message back if the thread has already exited.
	pub fn send(&self, msg: M) -> Result<(), M> {
		self.tx.send(Envelope::Message(msg)).map_err(|err| match err.0 {
			Envelope::Message(msg) => msg,
			Envelope::Stop => unreachable!("send only wraps messages"),
		})
	}

	/// Returns true once the receiving thread has exited.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

/// A dedicated OS thread running one message loop over an owned state.
///
/// The thread builds its state with `init`, reports readiness, then handles
/// messages in send order until stopped, until the handler breaks, or until a
/// handler panics. Dropping the handle stops the thread after it drains the
/// messages queued ahead of the stop request. It never joins implicitly.
pub struct EngineThread<M> {
	name: String,
	port: ThreadPort<M>,
	join: Option<JoinHandle<()>>,
}

impl<M> EngineThread<M>
where
	M: Send + 'static,
{
	/// Starts the thread and returns its handle plus a readiness signal.
	pub fn start<S, E, I, H>(name: impl Into<String>, init: I, mut handle: H) -> std::io::Result<(Self, ReadySignal<E>)>
	where
		S: 'static,
		E: Send + 'static,
		I: FnOnce() -> Result<S, E> + Send + 'static,
		H: FnMut(&mut S, M) -> ControlFlow<()> + Send + 'static,
	{
		let name = name.into();
		let (tx, mut rx) = mpsc::unbounded_channel::<Envelope<M>>();
		let (ready_tx, ready_rx) = oneshot::channel();
		let thread_name = name.clone();

		let join = spawn_named_thread(TaskClass::Engine, name.clone(), move || {
			let mut state = match catch_unwind(AssertUnwindSafe(init)) {
				Ok(Ok(state)) => {
					let _ = ready_tx.send(Ok(()));
					state
				}
				Ok(Err(err)) => {
					let _ = ready_tx.send(Err(err));
					tracing::debug!(thread = %thread_name, "worker.engine.init_failed");
					return;
				}
				Err(payload) => {
					tracing::error!(
						thread = %thread_name,
						panic = panic_message(payload.as_ref()).unwrap_or("<opaque>"),
						"worker.engine.init_panicked"
					);
					return;
				}
			};

			while let Some(envelope) = rx.blocking_recv() {
				let Envelope::Message(msg) = envelope else {
					break;
				};
				match catch_unwind(AssertUnwindSafe(|| handle(&mut state, msg))) {
					Ok(ControlFlow::Continue(())) => {}
					Ok(ControlFlow::Break(())) => break,
					Err(payload) => {
						tracing::error!(
							thread = %thread_name,
							panic = panic_message(payload.as_ref()).unwrap_or("<opaque>"),
							"worker.engine.handler_panicked"
						);
						break;
					}
				}
			}
			tracing::debug!(thread = %thread_name, "worker.engine.exit");
		})?;

		let thread = Self {
			name,
			port: ThreadPort { tx },
			join: Some(join),
		};
		Ok((thread, ready_rx))
	}

	/// Returns a send port into the thread.
	pub fn port(&self) -> ThreadPort<M> {
		self.port.clone()
	}

	/// Returns the thread name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Asks the thread to exit after the messages already queued.
	pub fn stop(&self) {
		let _ = self.port.tx.send(Envelope::Stop);
	}

	/// Stops the thread and blocks until it exits.
	///
	/// Returns false if the thread panicked outside the handler guard.
	pub fn join(mut self) -> bool {
		self.stop();
		match self.join.take() {
			Some(join) => join.join().is_ok(),
			None => true,
		}
	}
}

impl<M> Drop for EngineThread<M> {
	fn drop(&mut self) {
		let _ = self.port.tx.send(Envelope::Stop);
	}
}

/// Extracts a panic payload's message if it is a string.
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return Some(msg);
	}
	payload.downcast_ref::<String>().map(String::as_str)
}

#[cfg(test)]
mod tests {
	use std::sync::mpsc as std_mpsc;

	use super::*;

	#[tokio::test]
	async fn handles_messages_in_send_order() {
		let (seen_tx, seen_rx) = std_mpsc::channel();
		let (thread, ready) = EngineThread::start(
			"engine-order",
			|| Ok::<_, String>(Vec::new()),
			move |seen: &mut Vec<u32>, msg: u32| {
				seen.push(msg);
				let _ = seen_tx.send(seen.clone());
				ControlFlow::Continue(())
			},
		)
		.unwrap();

		assert_eq!(ready.await.unwrap(), Ok(()));
		let port = thread.port();
		for i in 0..5 {
			port.send(i).unwrap();
		}
		assert!(thread.join());
		let last = seen_rx.try_iter().last().unwrap();
		assert_eq!(last, vec![0, 1, 2, 3, 4]);
		assert!(port.is_closed());
		assert_eq!(port.send(9), Err(9));
	}

	#[tokio::test]
	async fn init_error_is_reported_and_thread_exits() {
		let (thread, ready) = EngineThread::start(
			"engine-init-error",
			|| Err::<(), _>("no grammar".to_string()),
			|_: &mut (), _: u32| ControlFlow::Continue(()),
		)
		.unwrap();

		assert_eq!(ready.await.unwrap(), Err("no grammar".to_string()));
		let port = thread.port();
		assert!(thread.join());
		assert!(port.is_closed());
	}

	#[tokio::test]
	async fn init_panic_drops_ready_signal() {
		let (thread, ready) = EngineThread::start(
			"engine-init-panic",
			|| -> Result<(), String> { panic!("init boom") },
			|_: &mut (), _: u32| ControlFlow::Continue(()),
		)
		.unwrap();

		assert!(ready.await.is_err());
		assert!(thread.join());
	}

	#[tokio::test]
	async fn handler_panic_closes_port() {
		let (thread, ready) = EngineThread::start(
			"engine-handler-panic",
			|| Ok::<_, String>(()),
			|_: &mut (), msg: u32| {
				if msg == 1 {
					panic!("handler boom");
				}
				ControlFlow::Continue(())
			},
		)
		.unwrap();

		ready.await.unwrap().unwrap();
		let port = thread.port();
		port.send(1).unwrap();
		assert!(thread.join());
		assert!(port.is_closed());
	}

	#[test]
	fn extracts_panic_payloads() {
		let payload: Box<dyn Any + Send> = Box::new("boom-str");
		assert_eq!(panic_message(payload.as_ref()), Some("boom-str"));
		let payload: Box<dyn Any + Send> = Box::new(String::from("boom-string"));
		assert_eq!(panic_message(payload.as_ref()), Some("boom-string"));
		let payload: Box<dyn Any + Send> = Box::new(7u32);
		assert_eq!(panic_message(payload.as_ref()), None);
	}
}
