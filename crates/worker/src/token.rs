use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one worker instance.
///
/// Two instances never share a generation, so a stale completion can be
/// detected by comparing against the generation that is currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerGeneration(u64);

impl WorkerGeneration {
	/// Returns the raw generation number.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for WorkerGeneration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Monotonic generation clock for successive worker instances.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	next: Arc<AtomicU64>,
}

impl GenerationClock {
	/// Creates a new generation clock starting at generation 1.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the next generation.
	pub fn next(&self) -> WorkerGeneration {
		WorkerGeneration(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generations_are_strictly_increasing() {
		let clock = GenerationClock::new();
		let first = clock.next();
		let second = clock.clone().next();
		assert_eq!(first.get(), 1);
		assert!(second > first);
	}
}
