//! Listener registration with scoped unsubscription.
//!
//! [`Emitter::subscribe`] returns a [`Subscription`]; releasing it (or
//! dropping it) removes the listener exactly once. Listeners are invoked
//! without the emitter's lock held, so a listener may subscribe, unsubscribe
//! or read the emitting object without deadlocking.

use std::sync::Arc;

use parking_lot::Mutex;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
	next_id: u64,
	entries: Vec<(u64, Listener<T>)>,
}

/// Multi-listener event source.
pub struct Emitter<T> {
	inner: Arc<Mutex<Listeners<T>>>,
}

impl<T> Default for Emitter<T> {
	fn default() -> Self {
		Self {
			inner: Arc::new(Mutex::new(Listeners {
				next_id: 0,
				entries: Vec::new(),
			})),
		}
	}
}

impl<T: 'static> std::fmt::Debug for Emitter<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Emitter").field("listeners", &self.listener_count()).finish()
	}
}

impl<T: 'static> Emitter<T> {
	/// Creates an emitter with no listeners.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a listener until the returned handle is released.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		let id = {
			let mut listeners = self.inner.lock();
			let id = listeners.next_id;
			listeners.next_id += 1;
			listeners.entries.push((id, Arc::new(listener)));
			id
		};
		let weak = Arc::downgrade(&self.inner);
		Subscription::new(move || {
			if let Some(inner) = weak.upgrade() {
				inner.lock().entries.retain(|(entry_id, _)| *entry_id != id);
			}
		})
	}

	/// Invokes every listener registered at the time of the call, in
	/// registration order.
	pub fn emit(&self, event: &T) {
		let listeners: Vec<Listener<T>> = self.inner.lock().entries.iter().map(|(_, l)| Arc::clone(l)).collect();
		for listener in listeners {
			listener(event);
		}
	}

	/// Returns the number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.inner.lock().entries.len()
	}
}

/// Handle to one registered listener.
///
/// Release is idempotent and also happens on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
	release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
	/// Wraps an unsubscribe action.
	pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
		Self {
			release: Some(Box::new(release)),
		}
	}

	/// A handle with nothing to release.
	pub fn empty() -> Self {
		Self { release: None }
	}

	/// Unsubscribes. Later calls do nothing.
	pub fn release(&mut self) {
		if let Some(release) = self.release.take() {
			release();
		}
	}

	/// Returns true once the listener has been removed.
	pub fn is_released(&self) -> bool {
		self.release.is_none()
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.release();
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription").field("released", &self.is_released()).finish()
	}
}

/// A group of subscriptions released together.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
	items: Vec<Subscription>,
}

impl SubscriptionSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds one subscription.
	pub fn push(&mut self, subscription: Subscription) {
		self.items.push(subscription);
	}

	/// Releases every subscription in the set and empties it.
	pub fn release_all(&mut self) {
		for mut subscription in self.items.drain(..) {
			subscription.release();
		}
	}

	/// Returns the number of held subscriptions.
	pub fn len(&self) -> usize {
		self.items.len()
	}

	/// Returns true if the set holds nothing.
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
