//! Keeps an off-thread engine's buffer mirrors consistent with live host
//! buffers.
//!
//! * [`WorkerLifecycleManager`]: owns the worker and the per-URI synchronizers,
//!   spawning and killing workers as grammar sets come and go
//! * [`BufferSynchronizer`]: turns one buffer's attach, content and language
//!   events into [`WorkerMessage`]s
//! * [`RemoteReadBridge`]: answers the engine's file reads on the host
//!
//! Collaborators are reached through traits: [`BufferSource`] and
//! [`BufferModel`] for buffers, [`GrammarSource`] for grammar sets,
//! [`EngineProvider`] for the engine itself and [`FileService`] for I/O.
//! [`BufferRegistry`], [`GrammarFactory`], [`MirrorEngineProvider`] and
//! [`LocalFileService`] are in-process implementations of each.

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod grammar;
pub mod manager;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod synchronizer;

pub use bridge::{FileService, LocalFileService, RemoteReadBridge};
pub use buffer::{BufferModel, TextBuffer};
pub use config::SyncConfig;
pub use engine::{Engine, EngineProvider, HostChannel, MirrorDocument, MirrorEngine, MirrorEngineProvider, MirrorStore};
pub use error::{Result, SyncError};
pub use event::{Emitter, Subscription, SubscriptionSet};
pub use grammar::{GrammarDefinition, GrammarFactory, GrammarSet, GrammarSetEvent, GrammarSource};
pub use manager::{ManagerContext, WorkerLifecycleManager};
pub use mirrorsync_primitives::{BufferUri, ChangeEvent, ContentChange, LineEnding, TextPosition, TextRange};
pub use mirrorsync_worker::WorkerGeneration;
pub use protocol::{BufferSnapshot, HostRequest, WorkerMessage};
pub use proxy::{MessageSink, WorkerProxy};
pub use registry::{BufferRegistry, BufferSource};
pub use synchronizer::BufferSynchronizer;
