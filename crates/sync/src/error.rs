//! Error types for buffer synchronization.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the synchronization core and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
	/// Reading a resource from disk failed.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path of the resource that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		#[source]
		error: std::io::Error,
	},

	/// A resource was read but is not valid UTF-8.
	#[error("{resource} is not valid UTF-8: {error}")]
	InvalidUtf8 {
		/// The resource identifier.
		resource: String,
		/// The decoding error.
		#[source]
		error: std::str::Utf8Error,
	},

	/// The file service cannot handle this resource scheme.
	#[error("unsupported resource: {0}")]
	UnsupportedResource(String),

	/// The engine provider failed to build an engine.
	#[error("engine initialization failed: {0}")]
	EngineInit(String),

	/// The engine thread could not be started.
	#[error("failed to start engine thread: {0}")]
	Spawn(#[source] std::io::Error),

	/// The worker exited before it became ready.
	#[error("worker exited before it became ready")]
	WorkerGone,

	/// The host side of the worker channel is gone.
	#[error("host channel closed")]
	HostGone,

	/// Reading the configuration file failed.
	#[error("failed to read config {path}: {error}")]
	ConfigRead {
		/// Path to the configuration file.
		path: PathBuf,
		/// The underlying I/O error.
		#[source]
		error: std::io::Error,
	},

	/// The configuration file is not valid TOML for [`crate::SyncConfig`].
	#[error("failed to parse config: {0}")]
	ConfigParse(#[from] toml::de::Error),
}

/// Result type for synchronization operations.
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
