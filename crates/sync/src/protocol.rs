//! Messages exchanged with the engine thread.
//!
//! Host → worker messages are fire-and-forget. For one buffer URI they are
//! sent in causal order: [`WorkerMessage::Snapshot`] before any
//! [`WorkerMessage::Edits`] before [`WorkerMessage::Removed`]. Nothing is
//! ordered across different URIs.

use mirrorsync_primitives::{BufferUri, ChangeEvent, LineEnding};
use tokio::sync::oneshot;
use url::Url;

use crate::error::Result;

/// Full buffer content establishing a worker-side mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
	pub uri: BufferUri,
	pub version: u64,
	/// Lines without terminators.
	pub lines: Vec<String>,
	pub eol: LineEnding,
	pub language_id: String,
}

impl BufferSnapshot {
	/// Joins the lines back into one string using the snapshot's EOL.
	pub fn text(&self) -> String {
		self.lines.join(self.eol.as_str())
	}
}

/// Host → worker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
	/// Creates or replaces the mirror for a buffer.
	Snapshot(BufferSnapshot),
	/// Ordered edits to apply to an existing mirror.
	Edits { uri: BufferUri, event: ChangeEvent },
	/// New language for an existing mirror.
	LanguageChanged { uri: BufferUri, language_id: String },
	/// Drops the mirror for a buffer. Receivers treat repeats as no-ops.
	Removed { uri: BufferUri },
}

impl WorkerMessage {
	/// The buffer this message concerns.
	pub fn uri(&self) -> &BufferUri {
		match self {
			Self::Snapshot(snapshot) => &snapshot.uri,
			Self::Edits { uri, .. } | Self::LanguageChanged { uri, .. } | Self::Removed { uri } => uri,
		}
	}

	/// Short name used in trace output.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Snapshot(_) => "snapshot",
			Self::Edits { .. } => "edits",
			Self::LanguageChanged { .. } => "language",
			Self::Removed { .. } => "removed",
		}
	}
}

/// Worker → host request.
#[derive(Debug)]
pub enum HostRequest {
	/// Reads a resource as UTF-8 text.
	ReadFile {
		resource: Url,
		reply: oneshot::Sender<Result<String>>,
	},
}
