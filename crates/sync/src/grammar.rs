//! Grammar set collaborator.
//!
//! The core never interprets grammar definitions; it forwards the whole set
//! to a freshly spawned worker whenever a new set is created.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use url::Url;

use crate::event::{Emitter, Subscription};

/// One grammar the engine may load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarDefinition {
	/// Root scope name, e.g. `source.rust`.
	pub scope_name: String,
	/// Language the grammar is registered for, if any.
	pub language_id: Option<String>,
	/// Where the engine reads the grammar source from.
	pub location: Url,
}

impl GrammarDefinition {
	/// Creates a definition.
	pub fn new(scope_name: impl Into<String>, language_id: Option<&str>, location: Url) -> Self {
		Self {
			scope_name: scope_name.into(),
			language_id: language_id.map(str::to_owned),
			location,
		}
	}
}

/// Versioned bundle of grammar definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarSet {
	pub version: u64,
	pub definitions: Vec<GrammarDefinition>,
}

/// Grammar set lifecycle event.
#[derive(Debug, Clone)]
pub enum GrammarSetEvent {
	/// A new set replaced whatever came before.
	Created(Arc<GrammarSet>),
	/// The current set was dropped without a replacement.
	Disposed,
}

/// Grammar-set change listener.
pub type GrammarListener = Box<dyn Fn(&GrammarSetEvent) + Send + Sync>;

/// Source of grammar set lifecycle events.
pub trait GrammarSource: Send + Sync {
	/// The live grammar set, if one exists.
	fn current(&self) -> Option<Arc<GrammarSet>>;

	/// Notifies on grammar set creation and disposal.
	fn on_did_change(&self, listener: GrammarListener) -> Subscription;
}

/// In-memory [`GrammarSource`].
#[derive(Debug, Default)]
pub struct GrammarFactory {
	next_version: AtomicU64,
	current: Mutex<Option<Arc<GrammarSet>>>,
	events: Emitter<GrammarSetEvent>,
}

impl GrammarFactory {
	/// Creates a factory with no grammar set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Publishes a new grammar set.
	pub fn create(&self, definitions: Vec<GrammarDefinition>) -> Arc<GrammarSet> {
		let set = Arc::new(GrammarSet {
			version: self.next_version.fetch_add(1, Ordering::AcqRel) + 1,
			definitions,
		});
		*self.current.lock() = Some(Arc::clone(&set));
		tracing::debug!(version = set.version, grammars = set.definitions.len(), "grammar.created");
		self.events.emit(&GrammarSetEvent::Created(Arc::clone(&set)));
		set
	}

	/// Drops the current grammar set. Does nothing if there is none.
	pub fn dispose(&self) {
		let Some(set) = self.current.lock().take() else {
			return;
		};
		tracing::debug!(version = set.version, "grammar.disposed");
		self.events.emit(&GrammarSetEvent::Disposed);
	}
}

impl GrammarSource for GrammarFactory {
	fn current(&self) -> Option<Arc<GrammarSet>> {
		self.current.lock().clone()
	}

	fn on_did_change(&self, listener: GrammarListener) -> Subscription {
		self.events.subscribe(listener)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rust_grammar() -> GrammarDefinition {
		GrammarDefinition::new("source.rust", Some("rust"), Url::parse("file:///grammars/rust.json").unwrap())
	}

	#[test]
	fn create_bumps_version_and_notifies() {
		let factory = GrammarFactory::new();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let _sub = {
			let seen = Arc::clone(&seen);
			factory.on_did_change(Box::new(move |event: &GrammarSetEvent| {
				let label = match event {
					GrammarSetEvent::Created(set) => format!("created {}", set.version),
					GrammarSetEvent::Disposed => "disposed".to_string(),
				};
				seen.lock().push(label);
			}))
		};

		factory.create(vec![rust_grammar()]);
		let second = factory.create(vec![rust_grammar()]);
		factory.dispose();
		factory.dispose();

		assert_eq!(second.version, 2);
		assert!(factory.current().is_none());
		assert_eq!(*seen.lock(), vec!["created 1", "created 2", "disposed"]);
	}
}
