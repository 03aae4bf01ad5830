//! Reference engine keeping one text mirror per synced buffer.
//!
//! Mirrors live in a [`MirrorStore`] shared with the host so that the mirrored
//! state can be inspected from outside the engine thread.

use std::collections::HashMap;
use std::sync::Arc;

use mirrorsync_primitives::{BufferUri, LineEnding, Rope, apply_change};
use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{Engine, EngineProvider, HostChannel};
use crate::error::Result;
use crate::grammar::GrammarSet;
use crate::protocol::{BufferSnapshot, WorkerMessage};

/// Worker-side copy of one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorDocument {
	pub text: Rope,
	pub version: u64,
	pub eol: LineEnding,
	pub language_id: String,
}

impl MirrorDocument {
	fn from_snapshot(snapshot: &BufferSnapshot) -> Self {
		Self {
			text: Rope::from_str(&snapshot.text()),
			version: snapshot.version,
			eol: snapshot.eol,
			language_id: snapshot.language_id.clone(),
		}
	}
}

#[derive(Debug, Default)]
struct StoreInner {
	documents: HashMap<BufferUri, MirrorDocument>,
	received: Vec<WorkerMessage>,
	grammars: Vec<(String, usize)>,
	engines_created: usize,
	version_gaps: usize,
}

/// Shared view of everything the mirror engines have received.
#[derive(Debug, Clone, Default)]
pub struct MirrorStore {
	inner: Arc<Mutex<StoreInner>>,
}

impl MirrorStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a copy of the mirror for `uri`.
	pub fn document(&self, uri: &BufferUri) -> Option<MirrorDocument> {
		self.inner.lock().documents.get(uri).cloned()
	}

	/// Returns the mirrored text for `uri`.
	pub fn text(&self, uri: &BufferUri) -> Option<String> {
		self.inner.lock().documents.get(uri).map(|doc| doc.text.to_string())
	}

	/// URIs that currently have a mirror, sorted.
	pub fn uris(&self) -> Vec<BufferUri> {
		let mut uris: Vec<_> = self.inner.lock().documents.keys().cloned().collect();
		uris.sort();
		uris
	}

	/// Every message received so far, in arrival order.
	pub fn received(&self) -> Vec<WorkerMessage> {
		self.inner.lock().received.clone()
	}

	/// Messages received for one URI, in arrival order.
	pub fn received_for(&self, uri: &BufferUri) -> Vec<WorkerMessage> {
		self.inner.lock().received.iter().filter(|m| m.uri() == uri).cloned().collect()
	}

	/// Counts received messages of one kind for one URI.
	pub fn count(&self, uri: &BufferUri, kind: &str) -> usize {
		self.inner
			.lock()
			.received
			.iter()
			.filter(|m| m.uri() == uri && m.kind() == kind)
			.count()
	}

	/// Grammar scopes loaded by engines, with their source lengths.
	pub fn loaded_grammars(&self) -> Vec<(String, usize)> {
		self.inner.lock().grammars.clone()
	}

	/// Number of engines built against this store.
	pub fn engines_created(&self) -> usize {
		self.inner.lock().engines_created
	}

	/// Number of edits whose version did not follow the mirror's version.
	pub fn version_gaps(&self) -> usize {
		self.inner.lock().version_gaps
	}
}

/// [`Engine`] that applies snapshots, edits, language changes and removals
/// to text mirrors.
///
/// Removal of an unknown URI is a no-op, so repeated removals are harmless.
#[derive(Debug)]
pub struct MirrorEngine {
	store: MirrorStore,
}

impl MirrorEngine {
	/// Creates an engine writing into `store`.
	pub fn new(store: MirrorStore) -> Self {
		Self { store }
	}
}

impl Engine for MirrorEngine {
	fn handle(&mut self, message: WorkerMessage) {
		let mut inner = self.store.inner.lock();
		inner.apply(&message);
		inner.received.push(message);
	}
}

impl StoreInner {
	fn apply(&mut self, message: &WorkerMessage) {
		match message {
			WorkerMessage::Snapshot(snapshot) => {
				trace!(uri = %snapshot.uri, version = snapshot.version, lines = snapshot.lines.len(), "mirror.snapshot");
				self.documents
					.insert(snapshot.uri.clone(), MirrorDocument::from_snapshot(snapshot));
			}
			WorkerMessage::Edits { uri, event } => {
				let Some(doc) = self.documents.get_mut(uri) else {
					warn!(uri = %uri, "mirror.edits_without_snapshot");
					return;
				};
				for change in &event.changes {
					if change.version != doc.version + 1 {
						warn!(uri = %uri, expected = doc.version + 1, got = change.version, "mirror.version_gap");
						self.version_gaps += 1;
					}
					apply_change(&mut doc.text, change);
					doc.version = change.version;
				}
				trace!(uri = %uri, version = doc.version, "mirror.edits");
			}
			WorkerMessage::LanguageChanged { uri, language_id } => match self.documents.get_mut(uri) {
				Some(doc) => doc.language_id.clone_from(language_id),
				None => warn!(uri = %uri, "mirror.language_without_snapshot"),
			},
			WorkerMessage::Removed { uri } => {
				if self.documents.remove(uri).is_none() {
					trace!(uri = %uri, "mirror.remove_unknown");
				}
			}
		}
	}
}

/// [`EngineProvider`] building [`MirrorEngine`]s over one shared store.
///
/// With grammar loading enabled, every definition's source is fetched through
/// the host before the engine is built; a failed read fails the worker
/// generation.
#[derive(Debug, Clone, Default)]
pub struct MirrorEngineProvider {
	store: MirrorStore,
	load_grammars: bool,
}

impl MirrorEngineProvider {
	/// Creates a provider writing into `store`.
	pub fn new(store: MirrorStore) -> Self {
		Self {
			store,
			load_grammars: false,
		}
	}

	/// Enables reading grammar sources through the host at engine creation.
	#[must_use]
	pub fn with_grammar_loading(mut self) -> Self {
		self.load_grammars = true;
		self
	}

	/// The store engines write into.
	pub fn store(&self) -> &MirrorStore {
		&self.store
	}
}

impl EngineProvider for MirrorEngineProvider {
	fn create(&self, grammars: &GrammarSet, host: HostChannel) -> Result<Box<dyn Engine>> {
		if self.load_grammars {
			for definition in &grammars.definitions {
				let source = host.read_file(definition.location.clone())?;
				self.store
					.inner
					.lock()
					.grammars
					.push((definition.scope_name.clone(), source.len()));
			}
		}
		self.store.inner.lock().engines_created += 1;
		Ok(Box::new(MirrorEngine::new(self.store.clone())))
	}
}
