//! Synchronization settings.
//!
//! Settings are read once when a [`crate::WorkerLifecycleManager`] is built
//! and passed through [`crate::ManagerContext`]; changing the file afterwards
//! has no effect on a running manager.
//!
//! ```toml
//! worker-offload = true
//! sync-size-limit = 52428800
//! engine-thread-name = "mirrorsync-engine"
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SyncError};

/// Buffers larger than this many bytes are never mirrored.
pub const DEFAULT_SYNC_SIZE_LIMIT: u64 = 50 * 1024 * 1024;

/// Default name of the engine thread.
pub const DEFAULT_ENGINE_THREAD_NAME: &str = "mirrorsync-engine";

/// Settings for buffer synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SyncConfig {
	/// Whether buffers are processed by an off-thread engine at all.
	///
	/// When false, grammar set changes never spawn a worker.
	pub worker_offload: bool,
	/// Byte size above which a buffer is too large to sync.
	pub sync_size_limit: u64,
	/// Name given to the engine thread.
	pub engine_thread_name: String,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			worker_offload: true,
			sync_size_limit: DEFAULT_SYNC_SIZE_LIMIT,
			engine_thread_name: DEFAULT_ENGINE_THREAD_NAME.to_string(),
		}
	}
}

impl SyncConfig {
	/// Parses settings from a TOML document. Missing keys take defaults.
	pub fn from_toml_str(source: &str) -> Result<Self> {
		Ok(toml::from_str(source)?)
	}

	/// Reads and parses a TOML settings file.
	pub fn load(path: &Path) -> Result<Self> {
		let source = std::fs::read_to_string(path).map_err(|error| SyncError::ConfigRead {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}
}
