//! Live games keyed by arena, plus their outbound channels.

pub mod notify;
pub mod registry;
pub mod stats;

pub use notify::Notification;
pub use registry::{ArenaRegistry, GameHandle, RegistryOptions, StartRequest};
pub use stats::{JsonlSink, MemorySink, NullSink, StatsSink};
