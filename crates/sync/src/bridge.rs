//! Host-side file reads requested by the engine.
//!
//! The engine runs without file access of its own. It asks the host through
//! [`crate::engine::HostChannel::read_file`]; the host answers from a
//! [`RemoteReadBridge`] task that delegates to a [`FileService`]. Failures are
//! returned to the engine as-is; retrying is the engine's call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

use crate::error::{Result, SyncError};
use crate::protocol::HostRequest;

/// Raw file I/O collaborator.
#[async_trait]
pub trait FileService: Send + Sync {
	/// Reads the full contents of a resource.
	async fn read_file(&self, resource: &Url) -> Result<Vec<u8>>;
}

/// [`FileService`] over the local filesystem, accepting `file://` URLs only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileService;

#[async_trait]
impl FileService for LocalFileService {
	async fn read_file(&self, resource: &Url) -> Result<Vec<u8>> {
		let path = resource
			.to_file_path()
			.map_err(|_| SyncError::UnsupportedResource(resource.to_string()))?;
		tokio::fs::read(&path).await.map_err(|error| SyncError::Io { path, error })
	}
}

/// Serves engine read requests by delegating to a [`FileService`].
#[derive(Clone)]
pub struct RemoteReadBridge {
	files: Arc<dyn FileService>,
}

impl std::fmt::Debug for RemoteReadBridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RemoteReadBridge").finish_non_exhaustive()
	}
}

impl RemoteReadBridge {
	/// Creates a bridge over `files`.
	pub fn new(files: Arc<dyn FileService>) -> Self {
		Self { files }
	}

	/// Reads a resource and decodes it as UTF-8. No retries.
	pub async fn read_file(&self, resource: &Url) -> Result<String> {
		let bytes = self.files.read_file(resource).await?;
		String::from_utf8(bytes).map_err(|err| SyncError::InvalidUtf8 {
			resource: resource.to_string(),
			error: err.utf8_error(),
		})
	}

	/// Answers requests until every sender is dropped.
	pub(crate) async fn serve(self, mut requests: mpsc::UnboundedReceiver<HostRequest>) {
		while let Some(request) = requests.recv().await {
			match request {
				HostRequest::ReadFile { resource, reply } => {
					let result = self.read_file(&resource).await;
					match &result {
						Ok(text) => debug!(resource = %resource, bytes = text.len(), "bridge.read_file"),
						Err(err) => debug!(resource = %resource, error = %err, "bridge.read_file_failed"),
					}
					let _ = reply.send(result);
				}
			}
		}
		debug!("bridge.closed");
	}
}
