//! Worker runtime primitives for hosting an engine off the host thread.
//!
//! * [`spawn`] / [`spawn_named_thread`]: classified task and thread spawning
//! * [`EngineThread`]: dedicated OS thread driving one message loop
//! * [`GenerationClock`]: monotonic identity for successive worker instances

mod class;
mod spawn;
mod thread;
mod token;

pub use class::TaskClass;
pub use spawn::{spawn, spawn_named_thread};
pub use thread::{EngineThread, ReadySignal, ThreadPort, panic_message};
pub use token::{GenerationClock, WorkerGeneration};
