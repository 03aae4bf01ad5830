/// Execution classes used for spawn tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Host-side bookkeeping such as worker readiness and catch-up.
	Host,
	/// The long-lived engine thread.
	Engine,
	/// File reads serviced on behalf of the engine.
	Io,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Host => "host",
			Self::Engine => "engine",
			Self::Io => "io",
		}
	}
}
