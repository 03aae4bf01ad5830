use std::fmt;
use std::sync::Arc;

/// Unique identifier of a buffer.
///
/// Cheap to clone; compared and hashed by its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferUri(Arc<str>);

impl BufferUri {
	/// Creates an identifier from any string.
	pub fn new(uri: impl AsRef<str>) -> Self {
		Self(Arc::from(uri.as_ref()))
	}

	/// Returns the identifier as a string slice.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for BufferUri {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for BufferUri {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<String> for BufferUri {
	fn from(value: String) -> Self {
		Self(Arc::from(value))
	}
}
